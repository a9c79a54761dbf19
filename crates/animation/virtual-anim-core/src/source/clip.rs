//! Keyframe clip source: deterministic per-bone key lookup.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::AnimationSource;
use crate::curve::Curve;
use crate::error::{AnimError, Result};
use crate::pose::PoseBuffer;
use crate::transform::Transform;

/// One keyframe of a bone track, time in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub time: f32,
    pub transform: Transform,
}

impl TransformKey {
    pub fn new(time: f32, transform: Transform) -> Self {
        Self { time, transform }
    }
}

/// Keys driving a single bone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: usize,
    pub keys: Vec<TransformKey>,
}

impl BoneTrack {
    pub fn new(bone: usize, keys: Vec<TransformKey>) -> Self {
        Self { bone, keys }
    }

    /// Single-key track holding `transform` for the whole clip.
    pub fn constant(bone: usize, transform: Transform) -> Self {
        Self::new(bone, vec![TransformKey::new(0.0, transform)])
    }

    /// Interpolate between the two keys bracketing `time`; end keys hold outside the range.
    fn sample(&self, time: f32) -> Transform {
        let keys = &self.keys;
        let n = keys.len();
        if n == 1 || time <= keys[0].time {
            return keys[0].transform;
        }
        if time >= keys[n - 1].time {
            return keys[n - 1].transform;
        }
        let upper = keys.partition_point(|k| k.time <= time);
        let (a, b) = (&keys[upper - 1], &keys[upper]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.transform;
        }
        a.transform.interpolate(&b.transform, (time - a.time) / span)
    }
}

/// Literal keyframe clip. Only bones with a track are contributed.
#[derive(Clone, Debug)]
pub struct ClipSource {
    name: String,
    tracks: Vec<BoneTrack>,
    duration: f32,
    looping: bool,
    curves: HashMap<String, Curve>,
    max_bone: usize,
}

impl ClipSource {
    /// Build a clip from bone tracks. Keys are sorted by time and their rotations
    /// normalized; tracks without keys are dropped. Duration defaults to the last key time.
    ///
    /// Fails with [`AnimError::EmptyClip`] when no track holds a key.
    pub fn new(name: impl Into<String>, tracks: Vec<BoneTrack>) -> Result<Self> {
        let name = name.into();
        let mut kept: Vec<BoneTrack> = Vec::with_capacity(tracks.len());
        for mut track in tracks {
            if track.keys.is_empty() {
                continue;
            }
            for key in &mut track.keys {
                if !key.time.is_finite() {
                    return Err(AnimError::InvalidParameter {
                        name: "key time",
                        value: key.time,
                    });
                }
                if !key.transform.is_finite() || key.transform.rotation.length_squared() == 0.0 {
                    return Err(AnimError::InvalidParameter {
                        name: "key transform",
                        value: key.time,
                    });
                }
                key.transform.rotation = key.transform.rotation.normalize();
            }
            track.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
            if kept.iter().any(|t| t.bone == track.bone) {
                return Err(AnimError::InvalidCorrespondence {
                    reason: format!("clip '{name}' has more than one track for bone {}", track.bone),
                });
            }
            kept.push(track);
        }

        if kept.is_empty() {
            return Err(AnimError::EmptyClip { clip: name });
        }

        let duration = kept
            .iter()
            .filter_map(|t| t.keys.last().map(|k| k.time))
            .fold(0.0f32, f32::max);
        let max_bone = kept.iter().map(|t| t.bone).max().unwrap_or(0);

        Ok(Self {
            name,
            tracks: kept,
            duration,
            looping: false,
            curves: HashMap::new(),
            max_bone,
        })
    }

    /// Override the clip length. Negative or non-finite values are ignored.
    pub fn with_duration(mut self, duration: f32) -> Self {
        if duration.is_finite() && duration >= 0.0 {
            self.duration = duration;
        }
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_curve(mut self, name: impl Into<String>, curve: Curve) -> Self {
        self.curves.insert(name.into(), curve);
        self
    }

    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }

    pub fn curves(&self) -> impl Iterator<Item = (&str, &Curve)> {
        self.curves.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Evaluate a named curve at `time` under the clip's time policy.
    pub fn curve_value(&self, name: &str, time: f32) -> Option<f32> {
        self.curves
            .get(name)
            .map(|c| c.evaluate(self.local_time(time)))
    }
}

impl AnimationSource for ClipSource {
    fn sample(&self, time: f32, out: &mut PoseBuffer) -> Result<()> {
        if self.max_bone >= out.len() {
            return Err(AnimError::BoneOutOfRange {
                bone: self.max_bone,
                bone_count: out.len(),
            });
        }
        let t = self.local_time(time);
        for track in &self.tracks {
            out.set(track.bone, track.sample(t));
        }
        Ok(())
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn two_key_clip() -> ClipSource {
        ClipSource::new(
            "walk",
            vec![BoneTrack::new(
                1,
                vec![
                    TransformKey::new(1.0, Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))),
                    TransformKey::new(0.0, Transform::IDENTITY),
                ],
            )],
        )
        .unwrap()
    }

    #[test]
    fn empty_clip_is_rejected() {
        let err = ClipSource::new("none", vec![BoneTrack::new(0, Vec::new())]).unwrap_err();
        assert_eq!(err, AnimError::EmptyClip { clip: "none".into() });
        assert!(ClipSource::new("none", Vec::new()).is_err());
    }

    #[test]
    fn keys_are_sorted_and_interpolated() {
        let clip = two_key_clip();
        assert_eq!(clip.duration(), 1.0);
        let mut pose = PoseBuffer::new(2);
        clip.sample(0.25, &mut pose).unwrap();
        assert!(pose.locals()[1]
            .translation
            .abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert!(pose.is_contributed(1));
        assert!(!pose.is_contributed(0));
    }

    #[test]
    fn rotation_uses_slerp() {
        let clip = ClipSource::new(
            "turn",
            vec![BoneTrack::new(
                0,
                vec![
                    TransformKey::new(0.0, Transform::IDENTITY),
                    TransformKey::new(1.0, Transform::from_rotation(Quat::from_rotation_y(1.0))),
                ],
            )],
        )
        .unwrap();
        let mut pose = PoseBuffer::new(1);
        clip.sample(0.5, &mut pose).unwrap();
        assert!(pose.locals()[0]
            .rotation
            .abs_diff_eq(Quat::from_rotation_y(0.5), 1e-5));
    }

    #[test]
    fn out_of_range_bone_leaves_buffer_untouched() {
        let clip = two_key_clip();
        let mut pose = PoseBuffer::new(1);
        let before = pose.clone();
        assert!(matches!(
            clip.sample(0.5, &mut pose),
            Err(AnimError::BoneOutOfRange { bone: 1, bone_count: 1 })
        ));
        assert_eq!(pose, before);
    }

    #[test]
    fn looping_clip_wraps_time() {
        let clip = two_key_clip().with_looping(true);
        let mut pose = PoseBuffer::new(2);
        clip.sample(1.25, &mut pose).unwrap();
        assert!(pose.locals()[1]
            .translation
            .abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn duplicate_tracks_are_rejected() {
        let err = ClipSource::new(
            "dup",
            vec![
                BoneTrack::constant(0, Transform::IDENTITY),
                BoneTrack::constant(0, Transform::IDENTITY),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, AnimError::InvalidCorrespondence { .. }));
    }

    #[test]
    fn curves_follow_clip_time() {
        let clip = two_key_clip().with_curve("distance", Curve::from_pairs(&[(0.0, 0.0), (1.0, 4.0)]));
        assert_eq!(clip.curve_value("distance", 0.5), Some(2.0));
        assert_eq!(clip.curve_value("distance", 9.0), Some(4.0));
        assert_eq!(clip.curve_value("missing", 0.5), None);
        assert!(clip.curve("distance").is_some());
    }
}
