//! Playback clock: play/pause state, play rate and the per-frame time step.
//!
//! The clock never touches the scene. [`Clock::advance`] is a pure step; the engine commits
//! the resulting time and runs the evaluation pass.

use serde::{Deserialize, Serialize};

/// Playback state of the timeline clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Not advancing. The initial state, and the state after pause or reaching the end.
    Stopped,
    /// Advancing once per host frame.
    Playing,
}

impl PlaybackState {
    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayOptions {
    /// Stop when this time is reached.
    pub to_time: Option<f64>,
    /// Without `to_time`, stop at the end of the timeline.
    pub auto_end: bool,
}

impl PlayOptions {
    pub fn until(to_time: f64) -> Self {
        Self {
            to_time: Some(to_time),
            auto_end: false,
        }
    }

    pub fn to_end() -> Self {
        Self {
            to_time: None,
            auto_end: true,
        }
    }
}

/// Result of one clock step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub time: f64,
    /// The end time was reached; `time` is clamped to it.
    pub ended: bool,
}

#[derive(Debug, Clone)]
pub struct Clock {
    state: PlaybackState,
    current_time: f64,
    play_rate: f64,
    end_time: Option<f64>,
    last_frame_ms: Option<f64>,
    max_frame_delta_ms: f64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl Clock {
    pub fn new(max_frame_delta_ms: f64) -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_time: 0.0,
            play_rate: 1.0,
            end_time: None,
            last_frame_ms: None,
            max_frame_delta_ms,
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[inline]
    pub fn play_rate(&self) -> f64 {
        self.play_rate
    }

    /// Time at which the current playback stops, if any.
    #[inline]
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn set_play_rate(&mut self, rate: f64) {
        self.play_rate = rate;
    }

    pub fn set_time(&mut self, time: f64) {
        self.current_time = time;
    }

    /// Start playing. Refused when already playing or when `to_time` is not ahead of the
    /// current time.
    pub fn play(&mut self, opts: PlayOptions, timeline_length: f64) -> bool {
        if self.state.is_playing() {
            return false;
        }
        if let Some(to) = opts.to_time {
            if to <= self.current_time {
                return false;
            }
        }
        self.end_time = opts
            .to_time
            .or_else(|| opts.auto_end.then_some(timeline_length));
        self.last_frame_ms = None;
        self.state = PlaybackState::Playing;
        true
    }

    /// Stop playing. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        self.last_frame_ms = None;
        if self.state.is_playing() {
            self.state = PlaybackState::Stopped;
            self.end_time = None;
            true
        } else {
            false
        }
    }

    /// Seconds elapsed since the previous frame, capped at `max_frame_delta_ms`. The first
    /// frame after `play` yields 0.
    pub fn frame_delta(&mut self, now_ms: f64) -> f64 {
        let delta_ms = match self.last_frame_ms {
            Some(last) => (now_ms - last).clamp(0.0, self.max_frame_delta_ms),
            None => 0.0,
        };
        self.last_frame_ms = Some(now_ms);
        delta_ms / 1000.0
    }

    /// Time after `delta_seconds` of playback at the current rate. Does not mutate the clock.
    pub fn advance(&self, delta_seconds: f64) -> Step {
        let time = self.current_time + delta_seconds * self.play_rate;
        match self.end_time {
            Some(end) if time >= end => Step { time: end, ended: true },
            _ => Step { time, ended: false },
        }
    }
}
