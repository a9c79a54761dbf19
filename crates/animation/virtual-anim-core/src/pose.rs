//! Pose buffer: local bone transforms plus a per-bone "contributed" mask.
//!
//! Sources write through [`PoseBuffer::set`], which marks the bone as
//! contributed. Blending reads the mask to tell which bones a partial source
//! actually produced; bones it never touched keep whatever value was there.

use crate::error::{AnimError, Result};
use crate::skeleton::Skeleton;
use crate::transform::Transform;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseBuffer {
    locals: Vec<Transform>,
    contributed: Vec<bool>,
}

impl PoseBuffer {
    /// Buffer of `bone_count` identity transforms, nothing contributed.
    pub fn new(bone_count: usize) -> Self {
        Self {
            locals: vec![Transform::IDENTITY; bone_count],
            contributed: vec![false; bone_count],
        }
    }

    pub fn with_capacity(bone_capacity: usize) -> Self {
        Self {
            locals: Vec::with_capacity(bone_capacity),
            contributed: Vec::with_capacity(bone_capacity),
        }
    }

    /// Buffer holding the skeleton's reference pose, nothing contributed.
    pub fn from_reference(skeleton: &Skeleton) -> Self {
        let mut pose = Self::with_capacity(skeleton.bone_count());
        pose.reset_to_reference(skeleton);
        pose
    }

    /// Resize to `bone_count`; every transform becomes identity and every flag false.
    pub fn resize(&mut self, bone_count: usize) {
        self.locals.clear();
        self.locals.resize(bone_count, Transform::IDENTITY);
        self.contributed.clear();
        self.contributed.resize(bone_count, false);
    }

    /// Overwrite with the skeleton's reference pose and clear the mask.
    pub fn reset_to_reference(&mut self, skeleton: &Skeleton) {
        self.locals.clear();
        self.locals
            .extend(skeleton.bones().iter().map(|b| b.reference));
        self.contributed.clear();
        self.contributed.resize(skeleton.bone_count(), false);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    #[inline]
    pub fn locals(&self) -> &[Transform] {
        &self.locals
    }

    #[inline]
    pub fn local(&self, bone: usize) -> Option<&Transform> {
        self.locals.get(bone)
    }

    /// Write a bone's local transform and mark it contributed.
    ///
    /// # Panics
    /// Panics if `bone` is out of range; sources validate indices before writing.
    #[inline]
    pub fn set(&mut self, bone: usize, transform: Transform) {
        self.locals[bone] = transform;
        self.contributed[bone] = true;
    }

    #[inline]
    pub fn is_contributed(&self, bone: usize) -> bool {
        self.contributed.get(bone).copied().unwrap_or(false)
    }

    pub fn contributed_count(&self) -> usize {
        self.contributed.iter().filter(|c| **c).count()
    }

    pub fn clear_contributed(&mut self) {
        self.contributed.iter_mut().for_each(|c| *c = false);
    }

    /// Copy transforms and mask from a buffer of the same size.
    pub fn copy_from(&mut self, other: &PoseBuffer) -> Result<()> {
        if other.len() != self.len() {
            return Err(AnimError::BoneCountMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        self.locals.copy_from_slice(&other.locals);
        self.contributed.copy_from_slice(&other.contributed);
        Ok(())
    }

    /// Move every bone `weight` of the way towards `target`.
    ///
    /// Both buffers are expected to hold a full pose (reference values where
    /// nothing was sampled), so a bone only one side drove still moves
    /// continuously. Weight 0 keeps `self` and weight 1 copies `target` exactly.
    /// A bone stays unmarked only when neither side contributed it.
    pub fn fade_towards(&mut self, target: &PoseBuffer, weight: f32) -> Result<()> {
        if target.len() != self.len() {
            return Err(AnimError::BoneCountMismatch {
                expected: self.len(),
                actual: target.len(),
            });
        }
        for bone in 0..self.locals.len() {
            if !self.contributed[bone] && !target.contributed[bone] {
                continue;
            }
            if weight >= 1.0 {
                self.locals[bone] = target.locals[bone];
            } else if weight > 0.0 {
                self.locals[bone] = self.locals[bone].interpolate(&target.locals[bone], weight);
            }
            self.contributed[bone] = true;
        }
        Ok(())
    }

    /// Resolve model-space transforms in one forward pass over the bones.
    pub fn compose_world_transforms(&self, skeleton: &Skeleton) -> Result<Vec<Transform>> {
        let mut world = Vec::with_capacity(self.len());
        self.compose_world_into(skeleton, &mut world)?;
        Ok(world)
    }

    /// Same as [`compose_world_transforms`](Self::compose_world_transforms) into a reused vector.
    pub fn compose_world_into(&self, skeleton: &Skeleton, world: &mut Vec<Transform>) -> Result<()> {
        if skeleton.bone_count() != self.len() {
            return Err(AnimError::BoneCountMismatch {
                expected: skeleton.bone_count(),
                actual: self.len(),
            });
        }
        world.clear();
        for (local, bone) in self.locals.iter().zip(skeleton.bones()) {
            // parent < index, so the parent's world transform is already resolved
            let resolved = match bone.parent {
                Some(parent) => local.compose(&world[parent]),
                None => *local,
            };
            world.push(resolved);
        }
        Ok(())
    }
}
