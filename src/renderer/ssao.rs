//! Sample kernel and rotation noise for screen space ambient occlusion.
//!
//! Both use fixed seeds so the occlusion pattern is identical between runs.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::renderer::device::{Device, PixelFormat, Sampler, Wrap};
use crate::renderer::texture::Texture;

pub const MAX_SAMPLES: usize = 64;
pub const NOISE_SIZE: u32 = 4;

/// Hemisphere (z >= 0) sample offsets inside the unit sphere, denser
/// towards the origin.
pub fn generate_kernel(count: usize) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let direction = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.0..1.0),
            )
            .normalize_or_zero();
            let t = i as f32 / count as f32;
            direction * rng.random_range(0.0..1.0f32) * lerp(0.1, 1.0, t * t)
        })
        .collect()
}

/// Random rotation vectors around the surface normal, tiled over the screen.
pub fn generate_noise() -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..NOISE_SIZE * NOISE_SIZE)
        .map(|_| Vec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.0))
        .collect()
}

/// The noise as a repeating 4x4 float texture.
pub fn noise_texture(device: &mut dyn Device) -> Texture {
    let noise = generate_noise();
    Texture::from_pixels(
        device,
        NOISE_SIZE,
        NOISE_SIZE,
        PixelFormat::Rgb16F,
        Sampler::TARGET.with_wrap(Wrap::Repeat),
        Some(bytemuck::cast_slice(&noise)),
    )
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_stays_in_the_hemisphere() {
        let kernel = generate_kernel(MAX_SAMPLES);
        assert_eq!(kernel.len(), MAX_SAMPLES);
        assert!(kernel[0].length() <= 0.1);
        for sample in &kernel {
            assert!(sample.z >= 0.0);
            assert!(sample.length() <= 1.0);
        }
    }

    #[test]
    fn kernel_is_deterministic() {
        assert_eq!(generate_kernel(16), generate_kernel(16));
    }

    #[test]
    fn noise_rotates_around_z() {
        let noise = generate_noise();
        assert_eq!(noise.len(), 16);
        assert!(noise.iter().all(|v| v.z == 0.0 && v.x.abs() <= 1.0 && v.y.abs() <= 1.0));
    }
}
