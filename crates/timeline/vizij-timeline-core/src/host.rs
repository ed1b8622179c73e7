//! Host collaborators consumed by the engine.
//!
//! Only the scene store is mandatory; every other seam defaults to a no-op so the engine can
//! run headless.

use crate::batcher::{DisplayUpdate, ModelUpdate};
use crate::data::Timeline;
use crate::scene::SceneStore;
use crate::spline::{CardinalSplineProvider, SplineProvider};

/// Persists the raw model after each successful authoring mutation.
pub trait Persistence {
    fn save(&mut self, timeline: &Timeline) -> anyhow::Result<()>;
}

/// Told whenever the scene needs to be redrawn.
pub trait RenderNotifier {
    fn invalidate(&mut self);
}

/// Host frame scheduling (e.g. requestAnimationFrame or a game loop).
pub trait FramePump {
    fn request_frame(&mut self);
    fn cancel_frame(&mut self);
}

/// Receives flushed batches from the update batcher.
pub trait UpdateSink {
    fn apply_display_updates(&mut self, updates: &[DisplayUpdate]);
    fn apply_model_updates(&mut self, updates: &[ModelUpdate]);
}

#[derive(Debug, Default, Clone, Copy)]
struct Noop;

impl Persistence for Noop {
    fn save(&mut self, _timeline: &Timeline) -> anyhow::Result<()> {
        Ok(())
    }
}

impl RenderNotifier for Noop {
    fn invalidate(&mut self) {}
}

impl FramePump for Noop {
    fn request_frame(&mut self) {}
    fn cancel_frame(&mut self) {}
}

impl UpdateSink for Noop {
    fn apply_display_updates(&mut self, _updates: &[DisplayUpdate]) {}
    fn apply_model_updates(&mut self, _updates: &[ModelUpdate]) {}
}

pub struct Host {
    pub scene: Box<dyn SceneStore>,
    pub splines: Box<dyn SplineProvider>,
    pub persistence: Box<dyn Persistence>,
    pub render: Box<dyn RenderNotifier>,
    pub frames: Box<dyn FramePump>,
    pub sink: Box<dyn UpdateSink>,
}

impl Host {
    pub fn new(scene: impl SceneStore + 'static) -> Self {
        Self {
            scene: Box::new(scene),
            splines: Box::new(CardinalSplineProvider),
            persistence: Box::new(Noop),
            render: Box::new(Noop),
            frames: Box::new(Noop),
            sink: Box::new(Noop),
        }
    }

    pub fn with_spline_provider(mut self, provider: impl SplineProvider + 'static) -> Self {
        self.splines = Box::new(provider);
        self
    }

    pub fn with_persistence(mut self, persistence: impl Persistence + 'static) -> Self {
        self.persistence = Box::new(persistence);
        self
    }

    pub fn with_render_notifier(mut self, render: impl RenderNotifier + 'static) -> Self {
        self.render = Box::new(render);
        self
    }

    pub fn with_frame_pump(mut self, frames: impl FramePump + 'static) -> Self {
        self.frames = Box::new(frames);
        self
    }

    pub fn with_update_sink(mut self, sink: impl UpdateSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }
}
