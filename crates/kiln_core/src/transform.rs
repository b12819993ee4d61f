//! Transform component

use crate::math::{EulerRot, Mat4, Quat, Vector3};
use serde::{Deserialize, Serialize};

/// Position, rotation (Euler angles in radians) and scale of an entity.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    pub position: Vector3,
    pub rotation: Vector3,
    pub scale: Vector3,
}

impl TransformComponent {
    pub const IDENTITY: Self = Self {
        position: Vector3::ZERO,
        rotation: Vector3::ZERO,
        scale: Vector3::ONE,
    };

    /// Rotation as a quaternion: roll (Z), then pitch (X), then yaw (Y).
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// Local-to-parent matrix: scale, then rotate, then translate.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale.into(),
            self.orientation(),
            self.position.into(),
        )
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::IDENTITY
    }
}
