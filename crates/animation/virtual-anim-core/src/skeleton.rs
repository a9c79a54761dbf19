//! Skeleton model: an immutable, topologically ordered bone hierarchy.
//!
//! Bones are stored so that every parent precedes its children. That single
//! invariant makes hierarchy walks a forward pass over the bone array and
//! rules out cycles without a separate graph check.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::transform::Transform;

/// One node of the hierarchy with its rest (reference) transform in parent space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub reference: Transform,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, reference: Transform) -> Self {
        Self {
            name: name.into(),
            parent,
            reference,
        }
    }

    pub fn root(name: impl Into<String>, reference: Transform) -> Self {
        Self::new(name, None, reference)
    }
}

/// Validated bone hierarchy. No mutation API; share it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    reference_world: Vec<Transform>,
}

impl Skeleton {
    /// Validate a bone list and build the skeleton.
    ///
    /// Fails with [`AnimError::InvalidHierarchy`] when a parent index is not strictly
    /// lower than the bone's own index, when names repeat, when the list is empty or
    /// when a reference transform is not finite. Reference rotations are normalized.
    pub fn build_from_bone_list(bones: Vec<Bone>) -> Result<Self> {
        if bones.is_empty() {
            return Err(AnimError::InvalidHierarchy {
                bone: 0,
                name: String::new(),
                reason: "skeleton has no bones".into(),
            });
        }

        let mut bones = bones;
        let mut name_to_index = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter_mut().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(AnimError::InvalidHierarchy {
                        bone: index,
                        name: bone.name.clone(),
                        reason: format!("parent index {parent} must be lower than {index}"),
                    });
                }
            }
            if !bone.reference.is_finite() {
                return Err(AnimError::InvalidHierarchy {
                    bone: index,
                    name: bone.name.clone(),
                    reason: "reference transform is not finite".into(),
                });
            }
            if bone.reference.rotation.length_squared() <= f32::EPSILON {
                return Err(AnimError::InvalidHierarchy {
                    bone: index,
                    name: bone.name.clone(),
                    reason: "reference rotation has zero length".into(),
                });
            }
            bone.reference.rotation = bone.reference.rotation.normalize();

            if name_to_index.insert(bone.name.clone(), index).is_some() {
                return Err(AnimError::InvalidHierarchy {
                    bone: index,
                    name: bone.name.clone(),
                    reason: "duplicate bone name".into(),
                });
            }
        }

        let mut reference_world: Vec<Transform> = Vec::with_capacity(bones.len());
        for bone in &bones {
            let world = match bone.parent {
                Some(parent) => bone.reference.compose(&reference_world[parent]),
                None => bone.reference,
            };
            reference_world.push(world);
        }

        Ok(Self {
            bones,
            name_to_index,
            reference_world,
        })
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    #[inline]
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    /// Look up a bone by name. A missing bone is a normal outcome, not an error.
    #[inline]
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Direct children of a bone, in index order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .skip(index + 1)
            .filter_map(move |(i, b)| (b.parent == Some(index)).then_some(i))
    }

    /// Per-bone mask covering `root` and its descendants.
    ///
    /// `depth` limits how many levels below `root` are included (`Some(0)` is
    /// `root` alone); `None` takes the whole branch.
    pub fn branch_mask(&self, root: usize, depth: Option<usize>) -> Result<Vec<bool>> {
        if root >= self.bones.len() {
            return Err(AnimError::BoneOutOfRange {
                bone: root,
                bone_count: self.bones.len(),
            });
        }
        let mut mask = vec![false; self.bones.len()];
        let mut pending = vec![(root, 0usize)];
        while let Some((bone, level)) = pending.pop() {
            mask[bone] = true;
            if depth.map_or(true, |max| level < max) {
                pending.extend(self.children(bone).map(|child| (child, level + 1)));
            }
        }
        Ok(mask)
    }

    /// Reference transform of a bone in parent space.
    #[inline]
    pub fn reference_local(&self, index: usize) -> Option<&Transform> {
        self.bones.get(index).map(|b| &b.reference)
    }

    /// Reference transforms resolved to model space, cached at construction.
    #[inline]
    pub fn reference_world(&self) -> &[Transform] {
        &self.reference_world
    }

    /// A fresh pose buffer holding the reference pose (nothing marked contributed).
    pub fn reference_pose(&self) -> PoseBuffer {
        PoseBuffer::from_reference(self)
    }
}
