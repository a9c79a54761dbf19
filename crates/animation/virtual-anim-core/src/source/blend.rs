//! Weighted blend of child sources.

use super::{AnimationSource, SharedSource};
use crate::accumulate::Accumulator;
use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::skeleton::Skeleton;

/// One weighted input of a [`BlendSource`].
#[derive(Clone, Debug)]
pub struct BlendChild {
    pub source: SharedSource,
    pub weight: f32,
    /// Multiplier applied to the blend's time before sampling this child.
    pub time_scale: f32,
    /// Seconds added after scaling.
    pub start_offset: f32,
    /// Bones this child may contribute; `None` lets every bone through.
    /// Bones past the end of the mask are excluded.
    pub mask: Option<Vec<bool>>,
}

impl BlendChild {
    pub fn new(source: SharedSource, weight: f32) -> Self {
        Self {
            source,
            weight,
            time_scale: 1.0,
            start_offset: 0.0,
            mask: None,
        }
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_start_offset(mut self, start_offset: f32) -> Self {
        self.start_offset = start_offset;
        self
    }

    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Restrict the child to the branch under `bone`, see [`Skeleton::branch_mask`].
    pub fn with_branch(
        self,
        skeleton: &Skeleton,
        bone: usize,
        depth: Option<usize>,
    ) -> Result<Self> {
        let mask = skeleton.branch_mask(bone, depth)?;
        Ok(self.with_mask(mask))
    }

    #[inline]
    fn child_time(&self, time: f32) -> f32 {
        time * self.time_scale + self.start_offset
    }

    /// Seconds of blend time this child covers before running out.
    fn span(&self) -> f32 {
        let scale = self.time_scale.abs();
        if scale <= f32::EPSILON {
            return 0.0;
        }
        let duration = self.source.duration();
        if self.time_scale >= 0.0 {
            (duration - self.start_offset).max(0.0) / scale
        } else {
            self.start_offset.max(0.0) / scale
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(AnimError::InvalidParameter {
                name: "blend weight",
                value: self.weight,
            });
        }
        if !self.time_scale.is_finite() {
            return Err(AnimError::InvalidParameter {
                name: "time scale",
                value: self.time_scale,
            });
        }
        if !self.start_offset.is_finite() {
            return Err(AnimError::InvalidParameter {
                name: "start offset",
                value: self.start_offset,
            });
        }
        Ok(())
    }
}

/// Weighted mean of its children's poses, per bone.
///
/// Only children that contributed a bone take part in that bone's mean, so a
/// partial child (say, an upper-body clip) does not drag the other bones toward
/// the reference pose. A child's mask removes bones from its contribution, which
/// gives layered blends: one child restricted to a branch, another to the rest.
#[derive(Clone, Debug)]
pub struct BlendSource {
    name: String,
    children: Vec<BlendChild>,
    looping: Option<bool>,
}

impl BlendSource {
    pub fn new(name: impl Into<String>, children: Vec<BlendChild>) -> Result<Self> {
        for child in &children {
            child.validate()?;
        }
        Ok(Self {
            name: name.into(),
            children,
            looping: None,
        })
    }

    pub fn push(&mut self, child: BlendChild) -> Result<()> {
        child.validate()?;
        self.children.push(child);
        Ok(())
    }

    /// Force the looping flag instead of deriving it from the children.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    pub fn children(&self) -> &[BlendChild] {
        &self.children
    }

    pub fn set_weight(&mut self, index: usize, weight: f32) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AnimError::InvalidParameter {
                name: "blend weight",
                value: weight,
            });
        }
        let child = self
            .children
            .get_mut(index)
            .ok_or(AnimError::InvalidParameter {
                name: "blend child index",
                value: index as f32,
            })?;
        child.weight = weight;
        Ok(())
    }

    /// Weights scaled to sum to 1.
    pub fn normalized_weights(&self) -> Result<Vec<f32>> {
        let total: f32 = self.children.iter().map(|c| c.weight).sum();
        if total <= 0.0 {
            return Err(AnimError::DegenerateBlend {
                blend: self.name.clone(),
                children: self.children.len(),
            });
        }
        Ok(self.children.iter().map(|c| c.weight / total).collect())
    }

    /// Sample every child at its own clock, ignoring time scale and offset.
    ///
    /// `times` holds one time per child, in child order.
    pub fn sample_each(&self, times: &[f32], out: &mut PoseBuffer) -> Result<()> {
        if times.len() != self.children.len() {
            return Err(AnimError::InvalidParameter {
                name: "child time count",
                value: times.len() as f32,
            });
        }
        self.blend_into(out, |index, _| times[index])
    }

    fn blend_into(
        &self,
        out: &mut PoseBuffer,
        time_of: impl Fn(usize, &BlendChild) -> f32,
    ) -> Result<()> {
        let weights = self.normalized_weights()?;
        let bone_count = out.len();

        // Sample everything before touching `out` so a failing child leaves it intact.
        let mut sampled: Vec<(&BlendChild, f32, PoseBuffer)> =
            Vec::with_capacity(self.children.len());
        for (index, (child, weight)) in self.children.iter().zip(weights).enumerate() {
            if weight <= 0.0 {
                continue;
            }
            let mut pose = PoseBuffer::new(bone_count);
            child.source.sample(time_of(index, child), &mut pose)?;
            sampled.push((child, weight, pose));
        }

        let mut acc = Accumulator::new(bone_count);
        for (child, weight, pose) in &sampled {
            match child.mask.as_deref() {
                Some(mask) => acc.add_pose_masked(pose, *weight, mask),
                None => acc.add_pose(pose, *weight),
            }
        }
        acc.finalize_into(out);
        Ok(())
    }
}

impl AnimationSource for BlendSource {
    fn sample(&self, time: f32, out: &mut PoseBuffer) -> Result<()> {
        let t = self.local_time(time);
        self.blend_into(out, |_, child| child.child_time(t))
    }

    fn duration(&self) -> f32 {
        self.children
            .iter()
            .map(BlendChild::span)
            .fold(0.0f32, f32::max)
    }

    fn looping(&self) -> bool {
        self.looping.unwrap_or_else(|| {
            !self.children.is_empty() && self.children.iter().all(|c| c.source.looping())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
