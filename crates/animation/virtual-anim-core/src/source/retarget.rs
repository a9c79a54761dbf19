//! Retargeting: drive a target skeleton from a source authored on another one.

use std::sync::Arc;

use glam::Quat;
use serde::{Deserialize, Serialize};

use super::{AnimationSource, SharedSource};
use crate::curve::Curve;
use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// Channels copied from the source bone. Disabled channels take the target's reference value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetChannels {
    pub translation: bool,
    pub rotation: bool,
    pub scale: bool,
}

impl Default for RetargetChannels {
    fn default() -> Self {
        Self::ALL
    }
}

impl RetargetChannels {
    pub const ALL: Self = Self {
        translation: true,
        rotation: true,
        scale: true,
    };
    pub const ROTATION_ONLY: Self = Self {
        translation: false,
        rotation: true,
        scale: false,
    };
}

/// Source bone → target bone correspondence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetEntry {
    pub source: usize,
    pub target: usize,
    #[serde(default)]
    pub channels: RetargetChannels,
}

impl RetargetEntry {
    pub fn new(source: usize, target: usize) -> Self {
        Self {
            source,
            target,
            channels: RetargetChannels::ALL,
        }
    }
}

#[derive(Clone, Debug)]
struct ResolvedEntry {
    entry: RetargetEntry,
    /// `src_ref⁻¹ * tgt_ref`, applied on the right of the sampled rotation.
    correction: Quat,
    identity_correction: bool,
}

/// Validated correspondence between two skeletons with precomputed rest-pose deltas.
#[derive(Clone, Debug)]
pub struct RetargetMap {
    entries: Vec<ResolvedEntry>,
    source_bones: usize,
    target_bones: usize,
}

impl RetargetMap {
    /// Build from explicit pairs. Indices must be in range and each target bone may appear once.
    pub fn from_pairs(
        source: &Skeleton,
        target: &Skeleton,
        pairs: impl IntoIterator<Item = RetargetEntry>,
    ) -> Result<Self> {
        let mut seen = vec![false; target.bone_count()];
        let mut entries = Vec::new();
        for entry in pairs {
            let src_ref = source.reference_local(entry.source).ok_or_else(|| {
                AnimError::InvalidCorrespondence {
                    reason: format!(
                        "source bone {} out of range ({} bones)",
                        entry.source,
                        source.bone_count()
                    ),
                }
            })?;
            let tgt_ref = target.reference_local(entry.target).ok_or_else(|| {
                AnimError::InvalidCorrespondence {
                    reason: format!(
                        "target bone {} out of range ({} bones)",
                        entry.target,
                        target.bone_count()
                    ),
                }
            })?;
            if std::mem::replace(&mut seen[entry.target], true) {
                return Err(AnimError::InvalidCorrespondence {
                    reason: format!("target bone {} mapped more than once", entry.target),
                });
            }
            let correction = (src_ref.rotation.inverse() * tgt_ref.rotation).normalize();
            entries.push(ResolvedEntry {
                entry,
                correction,
                identity_correction: correction.abs_diff_eq(Quat::IDENTITY, 1e-6),
            });
        }
        Ok(Self {
            entries,
            source_bones: source.bone_count(),
            target_bones: target.bone_count(),
        })
    }

    /// Pair every target bone with the source bone of the same name.
    pub fn by_name(source: &Skeleton, target: &Skeleton) -> Self {
        let pairs: Vec<RetargetEntry> = target
            .bones()
            .iter()
            .enumerate()
            .filter_map(|(ti, bone)| {
                source
                    .find_bone_index(&bone.name)
                    .map(|si| RetargetEntry::new(si, ti))
            })
            .collect();
        if pairs.is_empty() {
            log::warn!(
                "name-based retarget map matched no bones ({} source, {} target)",
                source.bone_count(),
                target.bone_count()
            );
        }
        // Targets are unique and indices come from the skeletons themselves.
        Self::from_pairs(source, target, pairs).unwrap_or(Self {
            entries: Vec::new(),
            source_bones: source.bone_count(),
            target_bones: target.bone_count(),
        })
    }

    /// Map a skeleton onto itself bone-for-bone.
    pub fn identity(skeleton: &Skeleton) -> Self {
        Self::by_name(skeleton, skeleton)
    }

    /// Replace the channel flags of the entry writing `target`. Returns false if unmapped.
    pub fn set_channels(&mut self, target: usize, channels: RetargetChannels) -> bool {
        match self.entries.iter_mut().find(|e| e.entry.target == target) {
            Some(resolved) => {
                resolved.entry.channels = channels;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &RetargetEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plays a child authored on `source_skeleton` onto `target_skeleton`.
#[derive(Clone, Debug)]
pub struct RetargetSource {
    name: String,
    child: SharedSource,
    source_skeleton: Arc<Skeleton>,
    target_skeleton: Arc<Skeleton>,
    map: RetargetMap,
}

impl RetargetSource {
    pub fn new(
        child: SharedSource,
        source_skeleton: Arc<Skeleton>,
        target_skeleton: Arc<Skeleton>,
        map: RetargetMap,
    ) -> Result<Self> {
        if map.source_bones != source_skeleton.bone_count()
            || map.target_bones != target_skeleton.bone_count()
        {
            return Err(AnimError::InvalidCorrespondence {
                reason: format!(
                    "map built for {}→{} bones, skeletons have {}→{}",
                    map.source_bones,
                    map.target_bones,
                    source_skeleton.bone_count(),
                    target_skeleton.bone_count()
                ),
            });
        }
        let name = format!("retarget({})", child.name());
        Ok(Self {
            name,
            child,
            source_skeleton,
            target_skeleton,
            map,
        })
    }

    pub fn map(&self) -> &RetargetMap {
        &self.map
    }

    fn retarget_bone(&self, resolved: &ResolvedEntry, sampled: &Transform) -> Transform {
        let target_ref = self
            .target_skeleton
            .reference_local(resolved.entry.target)
            .copied()
            .unwrap_or(Transform::IDENTITY);
        let channels = resolved.entry.channels;
        let rotation = if !channels.rotation {
            target_ref.rotation
        } else if resolved.identity_correction {
            sampled.rotation
        } else {
            (sampled.rotation * resolved.correction).normalize()
        };
        Transform {
            translation: if channels.translation {
                sampled.translation
            } else {
                target_ref.translation
            },
            rotation,
            scale: if channels.scale {
                sampled.scale
            } else {
                target_ref.scale
            },
        }
    }
}

impl AnimationSource for RetargetSource {
    fn sample(&self, time: f32, out: &mut PoseBuffer) -> Result<()> {
        if out.len() != self.target_skeleton.bone_count() {
            return Err(AnimError::BoneCountMismatch {
                expected: self.target_skeleton.bone_count(),
                actual: out.len(),
            });
        }
        let mut scratch = self.source_skeleton.reference_pose();
        self.child.sample(self.local_time(time), &mut scratch)?;

        for resolved in &self.map.entries {
            let source = resolved.entry.source;
            if !scratch.is_contributed(source) {
                continue;
            }
            let transform = self.retarget_bone(resolved, &scratch.locals()[source]);
            out.set(resolved.entry.target, transform);
        }
        Ok(())
    }

    fn duration(&self) -> f32 {
        self.child.duration()
    }

    fn looping(&self) -> bool {
        self.child.looping()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn curve(&self, name: &str) -> Option<&Curve> {
        self.child.curve(name)
    }
}
