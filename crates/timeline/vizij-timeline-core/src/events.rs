//! Engine events and observers.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    TimeSetManually { time: f64 },
    TimeUpdatedAutomatically { time: f64 },
    PlayRateChanged { rate: f64 },
    Played { to_time: Option<f64> },
    Paused { time: f64 },
    Ended { time: f64 },
    TimelineChanged { id: String },
}

/// Hooks into engine state changes. The `before_*` hooks can veto the change by returning
/// `false`.
pub trait EngineObserver {
    fn before_set_time(&mut self, _time: f64) -> bool {
        true
    }

    fn before_set_play_rate(&mut self, _rate: f64) -> bool {
        true
    }

    fn on_event(&mut self, _event: &EngineEvent) {}
}
