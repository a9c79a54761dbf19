//! Evaluation session: one animated skeleton and its current playback state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AnimError, Result};
use crate::ids::SessionId;
use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;
use crate::source::{resolve_time, AnimationSource, SharedSource};
use crate::transform::Transform;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Playing,
    Transitioning,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Playing => "playing",
            EngineState::Transitioning => "transitioning",
        }
    }
}

/// In-flight cross-fade between two sources running on their own clocks.
#[derive(Debug)]
pub(crate) struct Transition {
    pub outgoing: SharedSource,
    pub incoming: SharedSource,
    pub from_time: f32,
    pub to_time: f32,
    pub elapsed: f32,
    pub duration: f32,
}

impl Transition {
    /// Incoming weight after `elapsed` seconds.
    pub fn weight_at(&self, elapsed: f32) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.duration).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) enum Activity {
    #[default]
    Idle,
    Playing {
        root: SharedSource,
        time: f32,
    },
    Transitioning(Transition),
}

/// Keep a session clock inside `source`'s domain: wrapped when it loops,
/// clamped to `[0, duration]` otherwise. Sources without a usable duration
/// keep the raw clock.
pub(crate) fn settle_clock(source: &dyn AnimationSource, time: f32) -> f32 {
    let duration = source.duration();
    if !duration.is_finite() || duration <= 0.0 {
        return time;
    }
    resolve_time(time, duration, source.looping())
}

/// Host-owned evaluation state for one skeleton.
///
/// Created by [`Engine::create_session`](crate::Engine::create_session); the
/// engine mutates it only inside `attach`, `tick`, `cross_fade_to*` and `detach`.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) skeleton: Arc<Skeleton>,
    pub(crate) activity: Activity,
    pub(crate) playback_rate: f32,
    pub(crate) pose: PoseBuffer,
    pub(crate) world: Vec<Transform>,
}

impl Session {
    pub(crate) fn new(id: SessionId, skeleton: Arc<Skeleton>, playback_rate: f32) -> Self {
        let pose = skeleton.reference_pose();
        let world = skeleton.reference_world().to_vec();
        Self {
            id,
            skeleton,
            activity: Activity::Idle,
            playback_rate,
            pose,
            world,
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn state(&self) -> EngineState {
        match self.activity {
            Activity::Idle => EngineState::Idle,
            Activity::Playing { .. } => EngineState::Playing,
            Activity::Transitioning(_) => EngineState::Transitioning,
        }
    }

    /// Local transforms produced by the last successful tick.
    #[inline]
    pub fn pose(&self) -> &PoseBuffer {
        &self.pose
    }

    /// Model-space transforms produced by the last successful tick.
    #[inline]
    pub fn world(&self) -> &[Transform] {
        &self.world
    }

    #[inline]
    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    /// Negative rates play backwards.
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() {
            return Err(AnimError::InvalidParameter {
                name: "playback rate",
                value: rate,
            });
        }
        self.playback_rate = rate;
        Ok(())
    }

    /// Source currently driving the session: the root, or the incoming source of a cross-fade.
    pub fn current_source(&self) -> Option<&SharedSource> {
        match &self.activity {
            Activity::Idle => None,
            Activity::Playing { root, .. } => Some(root),
            Activity::Transitioning(tr) => Some(&tr.incoming),
        }
    }

    /// Clock of [`current_source`](Self::current_source), kept inside its duration.
    pub fn time(&self) -> Option<f32> {
        match &self.activity {
            Activity::Idle => None,
            Activity::Playing { time, .. } => Some(*time),
            Activity::Transitioning(tr) => Some(tr.to_time),
        }
    }

    /// Incoming weight of the running cross-fade.
    pub fn transition_weight(&self) -> Option<f32> {
        match &self.activity {
            Activity::Transitioning(tr) => Some(tr.weight_at(tr.elapsed)),
            _ => None,
        }
    }

    /// Duration of the current source, 0 when idle.
    pub fn active_duration(&self) -> f32 {
        self.current_source().map_or(0.0, |s| s.duration())
    }
}
