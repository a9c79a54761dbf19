//! Virtual animation sources.
//!
//! A source produces local bone transforms for a point in time. It writes only
//! the bones it actually drives (marking them contributed) and leaves every
//! other bone of the output buffer untouched. Variants compose: a blend of
//! retargeted clips is itself a source, so the engine never needs to know which
//! concrete variants sit under a session.
//!
//! All variants share one time policy, see [`resolve_time`].

mod blend;
mod clip;
mod mirror;
mod retarget;

use std::fmt;
use std::sync::Arc;

use crate::curve::Curve;
use crate::error::Result;
use crate::pose::PoseBuffer;

pub use blend::{BlendChild, BlendSource};
pub use clip::{BoneTrack, ClipSource, TransformKey};
pub use mirror::{MirrorAxis, MirrorEntry, MirrorSource, MirrorTable};
pub use retarget::{RetargetChannels, RetargetEntry, RetargetMap, RetargetSource};

/// Sources are shared read-only between the caller that built them and any session using them.
pub type SharedSource = Arc<dyn AnimationSource>;

/// Capability set every source variant implements.
pub trait AnimationSource: Send + Sync + fmt::Debug {
    /// Write the pose at `time` into `out`.
    ///
    /// On error `out` must be left exactly as it was.
    fn sample(&self, time: f32, out: &mut PoseBuffer) -> Result<()>;

    /// Length in seconds of one pass through the source.
    fn duration(&self) -> f32;

    fn looping(&self) -> bool;

    fn name(&self) -> &str {
        ""
    }

    /// Named scalar curve carried by the source, if any.
    fn curve(&self, _name: &str) -> Option<&Curve> {
        None
    }

    /// Map an arbitrary playback time into this source's sampling domain.
    fn local_time(&self, time: f32) -> f32 {
        resolve_time(time, self.duration(), self.looping())
    }
}

/// Uniform time policy: wrap into `[0, duration)` when looping, clamp to
/// `[0, duration]` otherwise. A zero, negative or non-finite duration, or a NaN
/// time, resolves to 0.
pub fn resolve_time(time: f32, duration: f32, looping: bool) -> f32 {
    if time.is_nan() || !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    if looping {
        if !time.is_finite() {
            return 0.0;
        }
        let wrapped = time.rem_euclid(duration);
        // rem_euclid can round up to `duration` for tiny negative inputs
        if wrapped >= duration {
            0.0
        } else {
            wrapped
        }
    } else {
        time.clamp(0.0, duration)
    }
}
