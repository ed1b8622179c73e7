//! Vizij Timeline Core (engine-agnostic)
//!
//! Keyframe timeline runtime: a playback clock, per-track interpolation, a cached property
//! binder that writes values into host targets, side effects triggered by those writes,
//! authoring-time mutation of the raw model ("hydration") and an update batcher for drag
//! editing.
//!
//! The host owns an [`Engine`], supplies targets through a [`scene::SceneStore`] and drives it
//! with [`Engine::tick`] once per frame.

pub mod batcher;
pub mod binding;
pub mod clock;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod hydration;
pub mod ids;
pub mod interp;
pub mod scene;
pub mod spline;
pub mod stored_timeline;
pub mod value;

// Re-exports for consumers (adapters)
pub use batcher::{DisplayUpdate, ModelUpdate, UpdateBatcher};
pub use binding::{bind, BindingDescriptor, PropertyBinder, Setter};
pub use clock::{Clock, PlayOptions, PlaybackState};
pub use config::{Config, Mode};
pub use data::{Handles, Keyframe, KeyframeSet, RawObject, Spline, StaticProp, Timeline, Track};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use effects::{SideEffect, SideEffectRegistry};
pub use engine::{Engine, ReRender};
pub use error::{BindError, ConfigError, EntityKind, TimelineError};
pub use events::{EngineEvent, EngineObserver};
pub use host::{FramePump, Host, Persistence, RenderNotifier, UpdateSink};
pub use hydration::{
    HydrationCommand, KeyframeAction, KeyframeParams, SettingAction, SettingParams, SplineAction,
    SplineParams, StaticPropAction, StaticPropParams, TrackAction, TrackParams,
};
pub use ids::{KeyframeId, SplineKey, TrackKey};
pub use interp::Easing;
pub use scene::{PropertyNode, SceneGraph, SceneObject, SceneStore, TargetHandle};
pub use spline::{CardinalSplineProvider, SplineCache, SplineCurve, SplineProvider};
pub use stored_timeline::{parse_timeline_json, parse_timelines_json};
pub use value::{Value, ValueKind, Vec2, Vec3};
