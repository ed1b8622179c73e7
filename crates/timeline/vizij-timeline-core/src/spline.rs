//! Spline paths: the provider/curve seam, a default cardinal curve, and the runtime cache.
//!
//! Raw spline data (nodes, tension) lives in [`crate::data::Spline`]. Curves built from it are
//! cached per [`SplineKey`] and rebuilt from scratch whenever the raw nodes change.

use std::fmt;

use hashbrown::HashMap;

use crate::data::Spline;
use crate::ids::SplineKey;
use crate::value::Vec3;

/// A runtime curve evaluated by normalized progress.
pub trait SplineCurve {
    /// Point at `progress` in `[0, 1]` (values outside are clamped).
    fn evaluate(&self, progress: f64) -> Vec3;
    fn set_tension(&mut self, tension: f64);
    fn tension(&self) -> f64;
}

/// Builds curves from raw nodes. Hosts can plug in their own math library here.
pub trait SplineProvider {
    fn create(&self, nodes: &[Vec3], closed: bool, tension: f64) -> Box<dyn SplineCurve>;
}

fn hermite_basis_h00(t: f64) -> f64 {
    2.0 * t.powi(3) - 3.0 * t.powi(2) + 1.0
}
fn hermite_basis_h10(t: f64) -> f64 {
    t.powi(3) - 2.0 * t.powi(2) + t
}
fn hermite_basis_h01(t: f64) -> f64 {
    -2.0 * t.powi(3) + 3.0 * t.powi(2)
}
fn hermite_basis_h11(t: f64) -> f64 {
    t.powi(3) - t.powi(2)
}

/// Cardinal spline through every node. Tangents are `tension * (next - previous)`, so a
/// tension of 0.5 gives a Catmull-Rom curve and 0 gives straight segments.
#[derive(Clone, Debug, PartialEq)]
pub struct CardinalSpline {
    nodes: Vec<Vec3>,
    closed: bool,
    tension: f64,
}

impl CardinalSpline {
    pub fn new(nodes: Vec<Vec3>, closed: bool, tension: f64) -> Self {
        Self {
            nodes,
            closed,
            tension,
        }
    }

    fn node(&self, index: isize) -> Vec3 {
        let n = self.nodes.len() as isize;
        let i = if self.closed {
            index.rem_euclid(n)
        } else {
            index.clamp(0, n - 1)
        };
        self.nodes[i as usize]
    }

    fn segment_count(&self) -> usize {
        match self.nodes.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }
}

impl SplineCurve for CardinalSpline {
    fn evaluate(&self, progress: f64) -> Vec3 {
        let segments = self.segment_count();
        if segments == 0 {
            return self.nodes.first().copied().unwrap_or(Vec3::ZERO);
        }
        let p = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let scaled = p * segments as f64;
        let index = (scaled.floor() as usize).min(segments - 1);
        let t = scaled - index as f64;

        let i = index as isize;
        let (p0, p1, p2, p3) = (self.node(i - 1), self.node(i), self.node(i + 1), self.node(i + 2));
        let m1 = (p2 - p0) * self.tension;
        let m2 = (p3 - p1) * self.tension;
        p1 * hermite_basis_h00(t)
            + m1 * hermite_basis_h10(t)
            + p2 * hermite_basis_h01(t)
            + m2 * hermite_basis_h11(t)
    }

    fn set_tension(&mut self, tension: f64) {
        self.tension = tension;
    }

    fn tension(&self) -> f64 {
        self.tension
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CardinalSplineProvider;

impl SplineProvider for CardinalSplineProvider {
    fn create(&self, nodes: &[Vec3], closed: bool, tension: f64) -> Box<dyn SplineCurve> {
        Box::new(CardinalSpline::new(nodes.to_vec(), closed, tension))
    }
}

/// Runtime curves keyed by spline key.
#[derive(Default)]
pub struct SplineCache {
    curves: HashMap<SplineKey, Box<dyn SplineCurve>>,
}

impl fmt::Debug for SplineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplineCache")
            .field("keys", &self.curves.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SplineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &SplineKey) -> bool {
        self.curves.contains_key(key)
    }

    pub fn get(&self, key: &SplineKey) -> Option<&dyn SplineCurve> {
        self.curves.get(key).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, key: &SplineKey) -> Option<&mut (dyn SplineCurve + 'static)> {
        self.curves.get_mut(key).map(|c| c.as_mut())
    }

    /// Build and cache a curve for `spline`, replacing any previous one.
    pub fn insert(&mut self, provider: &dyn SplineProvider, spline: &Spline) {
        let curve = provider.create(&spline.nodes, spline.closed, spline.tension);
        self.curves.insert(spline.spline_key.clone(), curve);
    }

    /// Discard the cached curve for `spline` and build a new one from its current nodes.
    pub fn rebuild(&mut self, provider: &dyn SplineProvider, spline: &Spline) {
        self.curves.remove(&spline.spline_key);
        self.insert(provider, spline);
    }

    pub fn remove(&mut self, key: &SplineKey) -> bool {
        self.curves.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn clear(&mut self) {
        self.curves.clear();
    }
}
