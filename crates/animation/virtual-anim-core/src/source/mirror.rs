//! Mirroring: reflect a pose across a skeleton-space plane, swapping twin bones.

use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{AnimationSource, SharedSource};
use crate::curve::Curve;
use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// Axis normal to the mirror plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MirrorAxis {
    X,
    Y,
    Z,
}

impl MirrorAxis {
    /// Negate the component along the axis.
    pub fn mirror_vector(self, v: Vec3) -> Vec3 {
        match self {
            MirrorAxis::X => Vec3::new(-v.x, v.y, v.z),
            MirrorAxis::Y => Vec3::new(v.x, -v.y, v.z),
            MirrorAxis::Z => Vec3::new(v.x, v.y, -v.z),
        }
    }

    /// Negate the two imaginary components orthogonal to the axis.
    pub fn mirror_quat(self, q: Quat) -> Quat {
        match self {
            MirrorAxis::X => Quat::from_xyzw(q.x, -q.y, -q.z, q.w),
            MirrorAxis::Y => Quat::from_xyzw(-q.x, q.y, -q.z, q.w),
            MirrorAxis::Z => Quat::from_xyzw(-q.x, -q.y, q.z, q.w),
        }
    }
}

/// A bone and the twin it swaps with, or `None` to mirror in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorEntry {
    pub bone: usize,
    #[serde(default)]
    pub twin: Option<usize>,
}

impl MirrorEntry {
    pub fn single(bone: usize) -> Self {
        Self { bone, twin: None }
    }

    pub fn pair(bone: usize, twin: usize) -> Self {
        Self {
            bone,
            twin: Some(twin),
        }
    }
}

/// Per-bone write plan: `dst` takes the mirrored value of `src`.
#[derive(Clone, Copy, Debug)]
struct MirrorWrite {
    src: usize,
    dst: usize,
    /// `mirror(ref_src)⁻¹ * ref_dst`
    correction: Quat,
}

#[derive(Clone, Debug)]
pub struct MirrorTable {
    axis: MirrorAxis,
    entries: Vec<MirrorEntry>,
    writes: Vec<MirrorWrite>,
    bone_count: usize,
}

impl MirrorTable {
    /// Validate entries against `skeleton`. Every bone may be written at most once.
    pub fn new(skeleton: &Skeleton, axis: MirrorAxis, entries: Vec<MirrorEntry>) -> Result<Self> {
        let bone_count = skeleton.bone_count();
        let mut written = vec![false; bone_count];
        let mut writes = Vec::with_capacity(entries.len() * 2);

        let mut claim = |bone: usize| -> Result<()> {
            match written.get_mut(bone) {
                None => Err(AnimError::BoneOutOfRange { bone, bone_count }),
                Some(flag) if *flag => Err(AnimError::InvalidCorrespondence {
                    reason: format!("bone {bone} appears more than once in mirror table"),
                }),
                Some(flag) => {
                    *flag = true;
                    Ok(())
                }
            }
        };

        for entry in &entries {
            claim(entry.bone)?;
            match entry.twin {
                Some(twin) => {
                    claim(twin)?;
                    writes.push(Self::plan(skeleton, axis, twin, entry.bone));
                    writes.push(Self::plan(skeleton, axis, entry.bone, twin));
                }
                None => writes.push(Self::plan(skeleton, axis, entry.bone, entry.bone)),
            }
        }

        Ok(Self {
            axis,
            entries,
            writes,
            bone_count,
        })
    }

    /// Pair bones whose names differ by one affix substitution, e.g. `("Left", "Right")`.
    ///
    /// Only the first occurrence of the affix is replaced. Bones without a twin mirror in place.
    pub fn by_affixes(skeleton: &Skeleton, axis: MirrorAxis, affixes: &[(&str, &str)]) -> Self {
        let bone_count = skeleton.bone_count();
        let mut visited = vec![false; bone_count];
        let mut entries = Vec::with_capacity(bone_count);

        for (index, bone) in skeleton.bones().iter().enumerate() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            let twin = affixes
                .iter()
                .filter_map(|&(left, right)| {
                    if !left.is_empty() && bone.name.contains(left) {
                        Some(bone.name.replacen(left, right, 1))
                    } else if !right.is_empty() && bone.name.contains(right) {
                        Some(bone.name.replacen(right, left, 1))
                    } else {
                        None
                    }
                })
                .filter_map(|candidate| skeleton.find_bone_index(&candidate))
                .find(|&twin| twin != index && !visited[twin]);

            match twin {
                Some(twin) => {
                    visited[twin] = true;
                    entries.push(MirrorEntry::pair(index, twin));
                }
                None => entries.push(MirrorEntry::single(index)),
            }
        }

        let writes = entries
            .iter()
            .flat_map(|e| match e.twin {
                Some(twin) => vec![
                    Self::plan(skeleton, axis, twin, e.bone),
                    Self::plan(skeleton, axis, e.bone, twin),
                ],
                None => vec![Self::plan(skeleton, axis, e.bone, e.bone)],
            })
            .collect();

        Self {
            axis,
            entries,
            writes,
            bone_count,
        }
    }

    fn plan(skeleton: &Skeleton, axis: MirrorAxis, src: usize, dst: usize) -> MirrorWrite {
        let reference = |i: usize| {
            skeleton
                .reference_local(i)
                .map(|t| t.rotation)
                .unwrap_or(Quat::IDENTITY)
        };
        let correction = (axis.mirror_quat(reference(src)).inverse() * reference(dst)).normalize();
        MirrorWrite {
            src,
            dst,
            correction,
        }
    }

    pub fn axis(&self) -> MirrorAxis {
        self.axis
    }

    pub fn entries(&self) -> &[MirrorEntry] {
        &self.entries
    }

    /// Twin of `bone`, if it swaps with one.
    pub fn twin_of(&self, bone: usize) -> Option<usize> {
        self.entries.iter().find_map(|e| match e.twin {
            Some(twin) if e.bone == bone => Some(twin),
            Some(twin) if twin == bone => Some(e.bone),
            _ => None,
        })
    }
}

/// Plays its child mirrored across the table's plane.
#[derive(Clone, Debug)]
pub struct MirrorSource {
    name: String,
    child: SharedSource,
    skeleton: Arc<Skeleton>,
    table: MirrorTable,
}

impl MirrorSource {
    pub fn new(child: SharedSource, skeleton: Arc<Skeleton>, table: MirrorTable) -> Result<Self> {
        if table.bone_count != skeleton.bone_count() {
            return Err(AnimError::BoneCountMismatch {
                expected: skeleton.bone_count(),
                actual: table.bone_count,
            });
        }
        let name = format!("mirror({})", child.name());
        Ok(Self {
            name,
            child,
            skeleton,
            table,
        })
    }

    pub fn table(&self) -> &MirrorTable {
        &self.table
    }
}

impl AnimationSource for MirrorSource {
    fn sample(&self, time: f32, out: &mut PoseBuffer) -> Result<()> {
        let bone_count = self.skeleton.bone_count();
        if out.len() != bone_count {
            return Err(AnimError::BoneCountMismatch {
                expected: bone_count,
                actual: out.len(),
            });
        }
        let mut scratch = self.skeleton.reference_pose();
        self.child.sample(self.local_time(time), &mut scratch)?;

        let axis = self.table.axis;
        let mut covered = vec![false; bone_count];
        for write in &self.table.writes {
            covered[write.dst] = true;
            if !scratch.is_contributed(write.src) {
                continue;
            }
            let src = &scratch.locals()[write.src];
            out.set(
                write.dst,
                Transform {
                    translation: axis.mirror_vector(src.translation),
                    rotation: (axis.mirror_quat(src.rotation) * write.correction).normalize(),
                    scale: src.scale.abs(),
                },
            );
        }

        // bones outside the table pass through unmirrored
        for (bone, local) in scratch.locals().iter().enumerate() {
            if !covered[bone] && scratch.is_contributed(bone) {
                out.set(bone, *local);
            }
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
