//! Baking API: record a playing session at a fixed frame rate.
//!
//! [`record_session`] drives the session through the engine and hands every
//! frame to a [`PoseRecorder`]. [`Baker`] is the stock recorder; its
//! [`BakedAnimation`] turns back into a [`ClipSource`] or JSON.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::session::Session;
use crate::skeleton::Skeleton;
use crate::source::{BoneTrack, ClipSource, TransformKey};
use crate::transform::Transform;

const DEFAULT_FRAME_RATE: f32 = 60.0;
/// Upper bound on frames in one recording.
const MAX_FRAMES: u32 = u32::MAX;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BakingConfig {
    /// Target frame rate (Hz) for recorded frames.
    pub frame_rate: f32,
    /// Seconds to advance before the first recorded frame.
    pub start_time: f32,
    /// Last recorded time; if None, uses the current source's duration.
    pub end_time: Option<f32>,
}

impl Default for BakingConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            start_time: 0.0,
            end_time: None,
        }
    }
}

impl BakingConfig {
    /// Frame rate with invalid values replaced by 60 Hz.
    pub fn effective_frame_rate(&self) -> f32 {
        let fr = if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        };
        fr.max(1.0)
    }
}

/// Receives one evaluated frame at a time.
pub trait PoseRecorder {
    fn record_frame(&mut self, time: f32, pose: &PoseBuffer, world: &[Transform]);
}

/// Tick `session` at `1 / frame_rate` steps over `[start_time, end_time]`, recording each frame.
///
/// The first frame is evaluated after advancing by `start_time` (0 by default),
/// so it shows the session's current clock. Times are in host seconds, before
/// the session's playback rate applies. Returns the number of recorded frames.
pub fn record_session<R: PoseRecorder + ?Sized>(
    engine: &mut Engine,
    session: &mut Session,
    cfg: &BakingConfig,
    recorder: &mut R,
) -> Result<usize> {
    let fr = cfg.effective_frame_rate();
    let start = if cfg.start_time.is_finite() {
        cfg.start_time.max(0.0)
    } else {
        0.0
    };
    let end = cfg
        .end_time
        .filter(|t| t.is_finite())
        .unwrap_or_else(|| session.active_duration())
        .max(start);
    let frames = ((f64::from(end) - f64::from(start)) * f64::from(fr)).ceil() + 1.0;
    if frames > f64::from(MAX_FRAMES) {
        return Err(AnimError::InvalidParameter {
            name: "end time",
            value: end,
        });
    }
    let frame_count = frames as usize;

    log::debug!(
        "session {}: recording {frame_count} frames at {fr} Hz over [{start}, {end}]",
        session.id()
    );

    let mut previous = 0.0;
    for frame in 0..frame_count {
        let time = (start + frame as f32 / fr).min(end);
        engine.tick(session, time - previous)?;
        recorder.record_frame(time, session.pose(), session.world());
        previous = time;
    }
    Ok(frame_count)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedTrack {
    pub bone: usize,
    /// Bone name, kept so baked data can be re-bound by name.
    pub name: String,
    pub keys: Vec<TransformKey>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedAnimation {
    pub name: String,
    pub frame_rate: f32,
    pub duration: f32,
    pub tracks: Vec<BakedTrack>,
}

impl BakedAnimation {
    /// Rebuild a playable clip from the recorded keys.
    pub fn to_clip(&self, looping: bool) -> Result<ClipSource> {
        let tracks = self
            .tracks
            .iter()
            .map(|t| BoneTrack::new(t.bone, t.keys.clone()))
            .collect();
        Ok(ClipSource::new(self.name.clone(), tracks)?
            .with_duration(self.duration)
            .with_looping(looping))
    }
}

/// Stock recorder: one key per frame for every contributed bone.
#[derive(Debug)]
pub struct Baker {
    name: String,
    frame_rate: f32,
    names: Vec<String>,
    keys: Vec<Vec<TransformKey>>,
    first_time: Option<f32>,
    last_time: f32,
}

impl Baker {
    pub fn new(name: impl Into<String>, skeleton: &Skeleton, cfg: &BakingConfig) -> Self {
        Self {
            name: name.into(),
            frame_rate: cfg.effective_frame_rate(),
            names: skeleton.bones().iter().map(|b| b.name.clone()).collect(),
            keys: vec![Vec::new(); skeleton.bone_count()],
            first_time: None,
            last_time: 0.0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.keys.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Collect recorded keys, re-based so the first frame sits at time 0.
    pub fn finish(self) -> BakedAnimation {
        let origin = self.first_time.unwrap_or(0.0);
        let tracks = self
            .keys
            .into_iter()
            .zip(self.names)
            .enumerate()
            .filter(|(_, (keys, _))| !keys.is_empty())
            .map(|(bone, (keys, name))| BakedTrack {
                bone,
                name,
                keys: keys
                    .into_iter()
                    .map(|k| TransformKey::new(k.time - origin, k.transform))
                    .collect(),
            })
            .collect();
        BakedAnimation {
            name: self.name,
            frame_rate: self.frame_rate,
            duration: (self.last_time - origin).max(0.0),
            tracks,
        }
    }
}

impl PoseRecorder for Baker {
    fn record_frame(&mut self, time: f32, pose: &PoseBuffer, _world: &[Transform]) {
        self.first_time.get_or_insert(time);
        self.last_time = time;
        for (bone, keys) in self.keys.iter_mut().enumerate() {
            if !pose.is_contributed(bone) {
                continue;
            }
            if let Some(local) = pose.local(bone) {
                keys.push(TransformKey::new(time, *local));
            }
        }
    }
}

/// Export baked data as serde_json::Value (stable schema for tooling).
pub fn export_baked_json(baked: &BakedAnimation) -> serde_json::Value {
    serde_json::to_value(baked).unwrap_or(serde_json::Value::Null)
}
