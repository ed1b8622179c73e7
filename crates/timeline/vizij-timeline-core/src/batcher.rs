//! Update batcher: coalesces high-frequency authoring writes.
//!
//! Two queues, both last-write-wins:
//! - display: values shown by observers (inspectors, property panels), flushed once per frame;
//! - model: keyframe / static-prop values, flushed at drag end or other checkpoints.
//!
//! Draining is idempotent: an empty queue drains to an empty batch.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{KeyframeId, TrackKey};
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    pub key: TrackKey,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModelUpdate {
    #[serde(rename_all = "camelCase")]
    Keyframe {
        key: TrackKey,
        keyframe_id: KeyframeId,
        value: Value,
    },
    StaticProp {
        key: TrackKey,
        value: Value,
    },
}

impl ModelUpdate {
    pub fn value(&self) -> &Value {
        match self {
            ModelUpdate::Keyframe { value, .. } | ModelUpdate::StaticProp { value, .. } => value,
        }
    }
}

/// A queued model update. Uncommitted entries still have to be written to the raw model when
/// the queue is flushed.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingModelUpdate {
    pub update: ModelUpdate,
    pub committed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ModelSlot {
    Keyframe(TrackKey, KeyframeId),
    StaticProp(TrackKey),
}

impl ModelSlot {
    fn key(&self) -> &TrackKey {
        match self {
            ModelSlot::Keyframe(key, _) | ModelSlot::StaticProp(key) => key,
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateBatcher {
    display: IndexMap<TrackKey, Value>,
    model: IndexMap<ModelSlot, PendingModelUpdate>,
}

impl UpdateBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_display(&mut self, key: TrackKey, value: Value) {
        self.display.insert(key, value);
    }

    pub fn queue_keyframe(
        &mut self,
        key: TrackKey,
        keyframe_id: KeyframeId,
        value: Value,
        committed: bool,
    ) {
        let slot = ModelSlot::Keyframe(key.clone(), keyframe_id.clone());
        let update = ModelUpdate::Keyframe {
            key,
            keyframe_id,
            value,
        };
        self.model
            .insert(slot, PendingModelUpdate { update, committed });
    }

    pub fn queue_static_prop(&mut self, key: TrackKey, value: Value, committed: bool) {
        let slot = ModelSlot::StaticProp(key.clone());
        let update = ModelUpdate::StaticProp { key, value };
        self.model
            .insert(slot, PendingModelUpdate { update, committed });
    }

    pub fn take_display(&mut self) -> Vec<DisplayUpdate> {
        self.display
            .drain(..)
            .map(|(key, value)| DisplayUpdate { key, value })
            .collect()
    }

    pub fn take_model(&mut self) -> Vec<PendingModelUpdate> {
        self.model.drain(..).map(|(_, pending)| pending).collect()
    }

    pub fn pending_display(&self) -> usize {
        self.display.len()
    }

    pub fn pending_model(&self) -> usize {
        self.model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty() && self.model.is_empty()
    }

    /// Drop queued updates of an unmounted object.
    pub fn clear_object(&mut self, vxkey: &str) {
        self.display.retain(|key, _| !key.belongs_to(vxkey));
        self.model.retain(|slot, _| !slot.key().belongs_to(vxkey));
    }

    pub fn clear(&mut self) {
        self.display.clear();
        self.model.clear();
    }
}
