//! Scratch buffers reused across ticks.
//!
//! A tick samples and composes into these buffers and only swaps them into the
//! session once everything succeeded.

use crate::config::Config;
use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;
use crate::transform::Transform;

#[derive(Debug, Default)]
pub struct Scratch {
    pub pose: PoseBuffer,
    /// Incoming side of a cross-fade.
    pub incoming: PoseBuffer,
    pub world: Vec<Transform>,
}

impl Scratch {
    pub fn new(cfg: &Config) -> Self {
        Self {
            pose: PoseBuffer::with_capacity(cfg.scratch_bones),
            incoming: PoseBuffer::with_capacity(cfg.scratch_bones),
            world: Vec::with_capacity(cfg.scratch_bones),
        }
    }

    /// Reset the pose to `skeleton`'s reference so unsampled bones fall back to it.
    #[inline]
    pub fn begin_frame(&mut self, skeleton: &Skeleton) {
        self.pose.reset_to_reference(skeleton);
        self.world.clear();
    }
}
