//! Per-bone accumulation of weighted transform contributions.
//!
//! Translation and scale are weighted means. Rotations are summed as 4-vectors
//! after flipping each onto the hemisphere of the bone's first contribution, then
//! normalized. A bone with a single contributor is copied unchanged.

use glam::{Quat, Vec3, Vec4};

use crate::pose::PoseBuffer;
use crate::transform::Transform;

#[derive(Clone, Debug)]
struct AccumEntry {
    first: Transform,
    count: u32,
    t_sum: Vec3,
    r_sum: Vec4,
    s_sum: Vec3,
    w: f32,
}

impl AccumEntry {
    fn from_transform(t: &Transform, w: f32) -> Self {
        Self {
            first: *t,
            count: 1,
            t_sum: t.translation * w,
            r_sum: Vec4::from(t.rotation) * w,
            s_sum: t.scale * w,
            w,
        }
    }

    fn add(&mut self, t: &Transform, w: f32) {
        let rotation = if self.first.rotation.dot(t.rotation) < 0.0 {
            -t.rotation
        } else {
            t.rotation
        };
        self.t_sum += t.translation * w;
        self.r_sum += Vec4::from(rotation) * w;
        self.s_sum += t.scale * w;
        self.w += w;
        self.count += 1;
    }

    fn finalize(&self) -> Transform {
        if self.count == 1 {
            return self.first;
        }
        let r = self.r_sum / self.w;
        let rotation = if r.length_squared() > f32::EPSILON {
            Quat::from_vec4(r).normalize()
        } else {
            self.first.rotation
        };
        Transform {
            translation: self.t_sum / self.w,
            rotation,
            scale: self.s_sum / self.w,
        }
    }
}

/// Accumulates contributions for a fixed bone count.
#[derive(Debug, Default)]
pub struct Accumulator {
    entries: Vec<Option<AccumEntry>>,
}

impl Accumulator {
    pub fn new(bone_count: usize) -> Self {
        Self {
            entries: vec![None; bone_count],
        }
    }

    /// Add one weighted transform for `bone`. Non-positive weights and out-of-range bones are ignored.
    pub fn add(&mut self, bone: usize, transform: &Transform, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        let Some(slot) = self.entries.get_mut(bone) else {
            return;
        };
        match slot {
            Some(entry) => entry.add(transform, weight),
            None => *slot = Some(AccumEntry::from_transform(transform, weight)),
        }
    }

    /// Add every contributed bone of `pose` with the same weight.
    pub fn add_pose(&mut self, pose: &PoseBuffer, weight: f32) {
        for (bone, local) in pose.locals().iter().enumerate() {
            if pose.is_contributed(bone) {
                self.add(bone, local, weight);
            }
        }
    }

    /// Like [`add_pose`](Self::add_pose), skipping bones `mask` does not allow.
    pub fn add_pose_masked(&mut self, pose: &PoseBuffer, weight: f32, mask: &[bool]) {
        for (bone, local) in pose.locals().iter().enumerate() {
            if pose.is_contributed(bone) && mask.get(bone).copied().unwrap_or(false) {
                self.add(bone, local, weight);
            }
        }
    }

    /// Write blended transforms for every bone that received a contribution.
    pub fn finalize_into(&self, out: &mut PoseBuffer) {
        for (bone, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                if bone < out.len() {
                    out.set(bone, entry.finalize());
                }
            }
        }
    }
}
