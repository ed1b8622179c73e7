//! Keyframe interpolation over a time-ordered sequence.
//!
//! All functions here are pure; they assume the sequence is sorted by time, which
//! [`crate::data::KeyframeSet`] guarantees.

pub mod functions;

use serde::{Deserialize, Serialize};

use crate::data::Keyframe;
use crate::value::Value;

pub use functions::{bezier_ease_t, handle_ease, lerp_f64, lerp_value};

/// Progress refinement between two keyframes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    /// Plain linear progress.
    Linear,
    /// Cubic-bezier progress shaped by the keyframe handles.
    #[default]
    Handles,
}

/// Random access to time-sorted keyframes.
pub trait KeyframeSeq {
    fn len(&self) -> usize;
    fn at(&self, index: usize) -> &Keyframe;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyframeSeq for [Keyframe] {
    #[inline]
    fn len(&self) -> usize {
        <[Keyframe]>::len(self)
    }

    #[inline]
    fn at(&self, index: usize) -> &Keyframe {
        &self[index]
    }
}

impl KeyframeSeq for Vec<Keyframe> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn at(&self, index: usize) -> &Keyframe {
        &self[index]
    }
}

/// Where a query time falls relative to the keyframes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    /// At or before the first keyframe (or the sequence has a single keyframe).
    Before,
    /// At or after the last keyframe.
    After,
    /// Strictly inside `[left, right]`.
    Between {
        left: usize,
        right: usize,
        progress: f64,
    },
}

/// Locate the bracketing pair for `t` with a binary search. Requires a non-empty sequence.
pub fn find_segment<S: KeyframeSeq + ?Sized>(seq: &S, t: f64) -> Segment {
    let n = seq.len();
    if n <= 1 || t <= seq.at(0).time {
        return Segment::Before;
    }
    if t >= seq.at(n - 1).time {
        return Segment::After;
    }
    // First index whose time is > t.
    let (mut lo, mut hi) = (0usize, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if seq.at(mid).time <= t {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    let right = lo.min(n - 1);
    let left = right.saturating_sub(1);
    let (t0, t1) = (seq.at(left).time, seq.at(right).time);
    let duration = t1 - t0;
    let progress = if duration == 0.0 {
        0.0
    } else {
        (t - t0) / duration
    };
    Segment::Between {
        left,
        right,
        progress,
    }
}

/// Linear evaluation; `None` for an empty sequence.
#[inline]
pub fn evaluate<S: KeyframeSeq + ?Sized>(seq: &S, t: f64) -> Option<Value> {
    evaluate_with(seq, t, Easing::Linear)
}

/// Evaluate at `t`, clamping to the boundary values outside the keyframe range.
pub fn evaluate_with<S: KeyframeSeq + ?Sized>(seq: &S, t: f64, easing: Easing) -> Option<Value> {
    if seq.is_empty() {
        return None;
    }
    let value = match find_segment(seq, t) {
        Segment::Before => seq.at(0).value,
        Segment::After => seq.at(seq.len() - 1).value,
        Segment::Between {
            left,
            right,
            progress,
        } => {
            let (a, b) = (seq.at(left), seq.at(right));
            let progress = match easing {
                Easing::Linear => progress,
                Easing::Handles => handle_ease(progress, &a.handles, &b.handles),
            };
            lerp_value(&a.value, &b.value, progress)
        }
    };
    Some(value)
}

/// Index of a keyframe lying within `epsilon` of `t`, if any.
pub fn keyframe_index_at<S: KeyframeSeq + ?Sized>(seq: &S, t: f64, epsilon: f64) -> Option<usize> {
    let n = seq.len();
    if n == 0 {
        return None;
    }
    // First index with time >= t - epsilon.
    let target = t - epsilon;
    let (mut lo, mut hi) = (0usize, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if seq.at(mid).time < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    (lo < n && (seq.at(lo).time - t).abs() <= epsilon).then_some(lo)
}

/// Time of the last keyframe strictly before `t`.
pub fn previous_keyframe_time<S: KeyframeSeq + ?Sized>(seq: &S, t: f64) -> Option<f64> {
    (0..seq.len())
        .rev()
        .map(|i| seq.at(i).time)
        .find(|time| *time < t)
}

/// Time of the first keyframe strictly after `t`.
pub fn next_keyframe_time<S: KeyframeSeq + ?Sized>(seq: &S, t: f64) -> Option<f64> {
    (0..seq.len()).map(|i| seq.at(i).time).find(|time| *time > t)
}
