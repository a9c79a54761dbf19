//! Per-tick report returned by [`Engine::tick`](crate::Engine::tick).
//!
//! The evaluated pose itself stays on the session; the report only carries
//! timing and the discrete events raised while stepping.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::session::EngineState;

/// Discrete signals emitted during a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineEvent {
    /// A cross-fade reached full weight; `source` is now the session root.
    TransitionCompleted { session: SessionId, source: String },
    /// A looping source wrapped past its end (or start, when playing backwards).
    Looped {
        session: SessionId,
        source: String,
        cycles: i32,
    },
    /// A non-looping source hit its end (or start, when playing backwards).
    ReachedEnd {
        session: SessionId,
        source: String,
        time: f32,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub session: Option<SessionId>,
    pub state: EngineState,
    /// Time advanced this tick: `dt * playback_rate`.
    pub delta: f32,
    /// Resolved local time of the root source, or of the incoming source while transitioning.
    pub source_time: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_weight: Option<f32>,
    #[serde(default)]
    pub events: Vec<EngineEvent>,
}

impl TickReport {
    #[inline]
    pub fn clear(&mut self) {
        self.session = None;
        self.state = EngineState::Idle;
        self.delta = 0.0;
        self.source_time = 0.0;
        self.transition_weight = None;
        self.events.clear();
    }

    #[inline]
    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn has_event(&self, pred: impl Fn(&EngineEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}
