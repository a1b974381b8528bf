use glam::{Mat4, Vec3};

/// Position, euler rotation in degrees and scale of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Transform {
        Transform {
            position,
            ..Transform::default()
        }
    }

    pub fn with_rotation(self, rotation: Vec3) -> Transform {
        Transform { rotation, ..self }
    }

    pub fn with_scale(self, scale: Vec3) -> Transform {
        Transform { scale, ..self }
    }

    /// `T * Rx * Ry * Rz * S`: scaled first, then rotated about Z, Y and X,
    /// then translated.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_scale(self.scale)
    }
}
