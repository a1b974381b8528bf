use glam::{Mat4, Vec3};

pub const FIELD_OF_VIEW: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.01;
pub const FAR_PLANE: f32 = 100.0;

/// Position and matrices something is rendered from: the camera, or the
/// light during the shadow pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewpoint {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Viewpoint {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// A free-flying yaw/pitch camera.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    /// Degrees around +Y, in `[0, 360)`.
    pub yaw: f32,
    /// Degrees around the camera's X axis, in `[-89, 89]`.
    pub pitch: f32,
    pub up: Vec3,
    front: Vec3,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: Vec3) -> Camera {
        let mut camera = Camera {
            position,
            yaw: 0.0,
            pitch: 0.0,
            up: Vec3::Y,
            front: Vec3::NEG_Z,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.update(1.0);
        camera
    }

    /// Recomputes the front vector and both matrices.
    pub fn update(&mut self, aspect_ratio: f32) {
        self.front = (Mat4::from_rotation_y(self.yaw.to_radians())
            * Mat4::from_rotation_x(self.pitch.to_radians()))
        .transform_vector3(Vec3::NEG_Z);
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, self.up);
        self.projection = Mat4::perspective_rh_gl(
            FIELD_OF_VIEW.to_radians(),
            aspect_ratio,
            NEAR_PLANE,
            FAR_PLANE,
        );
    }

    /// Moves along the camera's own axes: `right` along the side vector,
    /// `up` along the camera's up vector and `forward` along front.
    pub fn translate(&mut self, right: f32, up: f32, forward: f32) {
        let side = self.front.cross(self.up).normalize_or_zero();
        let camera_up = side.cross(self.front).normalize_or_zero();
        self.position += side * right + camera_up * up + self.front * forward;
    }

    /// Turns by mouse-style deltas, in degrees.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
        self.pitch = (self.pitch + pitch_delta).clamp(-89.0, 89.0);
    }

    #[cfg(test)]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn viewpoint(&self) -> Viewpoint {
        Viewpoint {
            position: self.position,
            view: self.view,
            projection: self.projection,
        }
    }
}
