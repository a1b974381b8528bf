use glam::{Mat4, Vec3, Vec4};
use rand::Rng;

use crate::renderer::camera::Viewpoint;

pub const MAX_POINT_LIGHTS: usize = 32;

/// The scene's shadow casting light: directional, or a spot light when
/// positional.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub directional: bool,
    pub position: Vec3,
    pub direction: Vec3,
    /// Inner cone angle and the extra angle over which the edge fades out,
    /// in degrees.
    pub cutoff: (f32, f32),
    /// Distance at which the light has practically faded out.
    pub distance: f32,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Light {
            directional: false,
            position: Vec3::new(2.0, 4.0, 4.0),
            direction: Vec3::new(-1.0, -1.0, -1.0),
            cutoff: (20.0, 5.0),
            distance: 32.0,
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::splat(1.0),
        }
    }
}

impl Light {
    /// Constant, linear and quadratic attenuation terms for `distance`,
    /// from a polynomial fit of the usual range table (e.g. 32 -> 1, 0.14, 0.07).
    pub fn attenuation(&self) -> Vec3 {
        const LINEAR: Vec4 = Vec4::new(8.4523112e-05, 4.4712582, -1.8516388, 33.955811);
        const QUADRATIC: Vec4 = Vec4::new(-7.6103583e-04, 9.0120201, -11.6185, 100.00464);
        let d = 1.0 / self.distance.max(f32::EPSILON);
        let powers = Vec4::new(1.0, d, d * d, d * d * d);
        let linear = LINEAR.dot(powers);
        let quadratic = QUADRATIC.dot(powers);
        Vec3::new(1.0, linear.max(0.0), (quadratic * quadratic).max(0.0))
    }

    /// Cosines of the inner and outer cone angles, as the shaders compare them.
    pub fn cutoff_cosines(&self) -> (f32, f32) {
        let (inner, offset) = self.cutoff;
        (inner.to_radians().cos(), (inner + offset).to_radians().cos())
    }

    /// Where the shadow map is rendered from.
    pub fn viewpoint(&self) -> Viewpoint {
        let direction = self.direction.normalize_or_zero();
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, self.position + direction, up);
        let projection = if self.directional {
            Mat4::orthographic_rh_gl(-10.0, 10.0, -10.0, 10.0, 1.0, 30.0)
        } else {
            let (inner, offset) = self.cutoff;
            Mat4::perspective_rh_gl(((inner + offset) * 2.0).to_radians(), 1.0, 1.0, 20.0)
        };
        Viewpoint {
            position: self.position,
            view,
            projection,
        }
    }
}

/// One of the lights of the deferred composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

/// `count` lights scattered over the ground, at most [`MAX_POINT_LIGHTS`].
pub fn scatter_point_lights(count: usize, rng: &mut impl Rng) -> Vec<PointLight> {
    (0..count.min(MAX_POINT_LIGHTS))
        .map(|_| PointLight {
            position: Vec3::new(
                rng.random_range(-10.0..=10.0),
                rng.random_range(1.0..=4.0),
                rng.random_range(-10.0..=10.0),
            ),
            color: Vec3::new(
                rng.random_range(0.05..=0.3),
                rng.random_range(0.05..=0.3),
                rng.random_range(0.05..=0.3),
            ),
        })
        .collect()
}
