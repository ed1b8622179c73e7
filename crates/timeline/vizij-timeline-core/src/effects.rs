//! Side effects triggered by property writes.
//!
//! Lookup is two-tier: an explicit registration for the exact track key wins; otherwise the
//! last segment of the property path selects a default. At most one effect runs per write.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::binding;
use crate::diagnostics::Diagnostics;
use crate::ids::{SplineKey, TrackKey};
use crate::scene::TargetHandle;
use crate::spline::SplineCache;
use crate::value::Value;

/// Property-path suffix that drives an object along its spline (0..100).
pub const SPLINE_PROGRESS: &str = "splineProgress";
/// Property-path suffix that sets the tension of an object's spline.
pub const SPLINE_TENSION: &str = "splineTension";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideEffect {
    /// Progress 0..100 -> point on the object's spline, written to its `position`.
    SplinePosition,
    /// Value -> tension of the object's cached spline curve.
    SplineTension,
}

/// What an effect may touch while it runs.
pub struct EffectContext<'a> {
    pub splines: &'a mut SplineCache,
    pub diagnostics: &'a mut Diagnostics,
}

impl SideEffect {
    pub fn run(
        self,
        ctx: &mut EffectContext<'_>,
        key: &TrackKey,
        target: &TargetHandle,
        value: &Value,
    ) {
        let spline_key = SplineKey::for_object(key.vxkey());
        let Some(n) = value.as_number() else {
            ctx.diagnostics
                .warn("effects", format!("{self:?} on '{key}' expects a number"));
            return;
        };
        match self {
            SideEffect::SplinePosition => {
                let Some(curve) = ctx.splines.get(&spline_key) else {
                    log::debug!(target: "vizij_timeline", "no spline '{spline_key}' for '{key}'");
                    return;
                };
                let point = curve.evaluate(n / 100.0);
                // Written through a plain setter: effects never re-enter dispatch.
                match binding::bind(target, "position") {
                    Ok(setter) => {
                        setter.apply(&Value::Vector3(point));
                    }
                    Err(err) => ctx
                        .diagnostics
                        .warn("effects", format!("cannot move '{}': {err}", key.vxkey())),
                }
            }
            SideEffect::SplineTension => match ctx.splines.get_mut(&spline_key) {
                Some(curve) => curve.set_tension(n),
                None => {
                    log::debug!(target: "vizij_timeline", "no spline '{spline_key}' for '{key}'")
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SideEffectRegistry {
    explicit: HashMap<TrackKey, SideEffect>,
    fallback: HashMap<String, SideEffect>,
}

impl Default for SideEffectRegistry {
    fn default() -> Self {
        let mut fallback = HashMap::new();
        fallback.insert(SPLINE_PROGRESS.to_string(), SideEffect::SplinePosition);
        fallback.insert(SPLINE_TENSION.to_string(), SideEffect::SplineTension);
        Self {
            explicit: HashMap::new(),
            fallback,
        }
    }
}

impl SideEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an effect for one exact track key. Replaces a previous registration.
    pub fn register(&mut self, key: TrackKey, effect: SideEffect) -> Option<SideEffect> {
        self.explicit.insert(key, effect)
    }

    pub fn unregister(&mut self, key: &TrackKey) -> Option<SideEffect> {
        self.explicit.remove(key)
    }

    /// Register a default effect for every property path ending in `suffix`.
    pub fn register_fallback(&mut self, suffix: impl Into<String>, effect: SideEffect) {
        self.fallback.insert(suffix.into(), effect);
    }

    pub fn resolve(&self, key: &TrackKey) -> Option<SideEffect> {
        self.explicit
            .get(key)
            .or_else(|| self.fallback.get(key.suffix()))
            .copied()
    }

    #[inline]
    pub fn has_side_effect(&self, key: &TrackKey) -> bool {
        self.resolve(key).is_some()
    }

    /// Run the effect registered for `key`, if any. Returns whether one ran.
    pub fn dispatch(
        &self,
        ctx: &mut EffectContext<'_>,
        key: &TrackKey,
        target: &TargetHandle,
        value: &Value,
    ) -> bool {
        match self.resolve(key) {
            Some(effect) => {
                effect.run(ctx, key, target, value);
                true
            }
            None => false,
        }
    }
}
