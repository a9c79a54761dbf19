//! Translation / rotation / scale transform used for every bone.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// TRS transform. Rotation is kept as a unit quaternion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Child-local composed with parent-world, yielding the child's world transform.
    ///
    /// Scale is propagated component-wise; shear from non-uniform parent scale is dropped.
    #[inline]
    pub fn compose(&self, parent_world: &Transform) -> Transform {
        Transform {
            translation: parent_world.translation
                + parent_world.rotation * (parent_world.scale * self.translation),
            rotation: (parent_world.rotation * self.rotation).normalize(),
            scale: parent_world.scale * self.scale,
        }
    }

    /// Interpolate towards `other`: lerp for translation/scale, shortest-arc slerp for rotation.
    #[inline]
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Component-wise comparison; `q` and `-q` count as the same rotation.
    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        let rot_eq = self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff);
        rot_eq
            && self
                .translation
                .abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}
