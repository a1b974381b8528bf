//! Full-screen passes of the deferred pipeline.

use glam::{Vec2, Vec3};

use crate::renderer::arena::{Assets, Handle};
use crate::renderer::camera::Viewpoint;
use crate::renderer::device::Device;
use crate::renderer::framebuffer::Framebuffer;
use crate::renderer::light::PointLight;
use crate::renderer::material::{Material, MaterialKind, PropertyValue};
use crate::renderer::mesh::Mesh;
use crate::renderer::program::Program;
use crate::renderer::ssao;
use crate::renderer::texture::{Texture, TextureRef};
use crate::renderer::transform::Transform;

/// The unit plane scaled to cover clip space.
struct ScreenQuad {
    mesh: Handle<Mesh>,
    material: Handle<Material>,
    transform: Transform,
}

impl ScreenQuad {
    fn new(
        assets: &mut Assets,
        mesh: Handle<Mesh>,
        program: Handle<Program>,
        kind: MaterialKind,
    ) -> ScreenQuad {
        let material = Material::new(&assets.programs[program], kind);
        ScreenQuad {
            mesh,
            material: assets.materials.insert(material),
            transform: Transform::default().with_scale(Vec3::new(2.0, 2.0, 1.0)),
        }
    }

    fn material<'a>(&self, assets: &'a mut Assets) -> &'a mut Material {
        &mut assets.materials[self.material]
    }

    fn draw(&self, device: &mut dyn Device, assets: &mut Assets) {
        let model = self.transform.matrix();
        let material = &mut assets.materials[self.material];
        material.set_property("transform", model);
        material.set_property("modelTransform", model);
        material.apply(device);
        assets.meshes[self.mesh].draw(device);
    }
}

/// Inputs of the lighting composite besides the G-buffer.
pub struct Composite<'a> {
    pub ssao: TextureRef,
    pub use_ssao: bool,
    pub view_position: Vec3,
    pub gamma: f32,
    pub lights: &'a [PointLight],
}

/// Lights the G-buffer with the point lights.
pub struct DeferredPlane {
    quad: ScreenQuad,
    capacity: usize,
}

impl DeferredPlane {
    pub fn new(
        assets: &mut Assets,
        mesh: Handle<Mesh>,
        program: Handle<Program>,
        capacity: usize,
    ) -> DeferredPlane {
        let kind = MaterialKind::DeferredLighting { lights: capacity };
        DeferredPlane {
            quad: ScreenQuad::new(assets, mesh, program, kind),
            capacity,
        }
    }

    pub fn render(
        &self,
        device: &mut dyn Device,
        assets: &mut Assets,
        gbuffer: &Framebuffer,
        composite: &Composite,
    ) {
        let material = self.quad.material(assets);
        material.set_property("gPosition", gbuffer.color_attachment(0));
        material.set_property("gNormal", gbuffer.color_attachment(1));
        material.set_property("gAlbedoSpec", gbuffer.color_attachment(2));
        material.set_property("ssao", composite.ssao);
        material.set_property("useSsao", composite.use_ssao);
        material.set_property("viewPos", composite.view_position);
        material.set_property("gamma", composite.gamma);

        let count = composite.lights.len().min(self.capacity);
        material.set_property("lightCount", count as i32);
        for i in 0..self.capacity {
            let (position, color) = match composite.lights.get(i).filter(|_| i < count) {
                Some(light) => (
                    PropertyValue::from(light.position),
                    PropertyValue::from(light.color),
                ),
                None => (PropertyValue::Absent, PropertyValue::Absent),
            };
            material.set_property(&format!("lights[{i}].position"), position);
            material.set_property(&format!("lights[{i}].color"), color);
        }
        self.quad.draw(device, assets);
    }
}

/// Estimates ambient occlusion from the G-buffer.
pub struct SsaoPlane {
    quad: ScreenQuad,
    noise: Handle<Texture>,
}

impl SsaoPlane {
    pub fn new(
        device: &mut dyn Device,
        assets: &mut Assets,
        mesh: Handle<Mesh>,
        program: Handle<Program>,
        samples: usize,
    ) -> SsaoPlane {
        let samples = samples.clamp(1, ssao::MAX_SAMPLES);
        let quad = ScreenQuad::new(assets, mesh, program, MaterialKind::Ssao { samples });
        let noise = assets.textures.insert(ssao::noise_texture(device));

        let noise_texture = assets.textures[noise].handle();
        let material = quad.material(assets);
        material.set_property("texNoise", noise_texture);
        material.set_property("sampleCount", samples as i32);
        for (i, sample) in ssao::generate_kernel(samples).into_iter().enumerate() {
            material.set_property(&format!("samples[{i}]"), sample);
        }
        SsaoPlane { quad, noise }
    }

    pub fn render(
        &self,
        device: &mut dyn Device,
        assets: &mut Assets,
        gbuffer: &Framebuffer,
        viewpoint: &Viewpoint,
        radius: f32,
    ) {
        let noise_size = assets.textures[self.noise].width() as f32;
        let material = self.quad.material(assets);
        material.set_property("gPosition", gbuffer.color_attachment(0));
        material.set_property("gNormal", gbuffer.color_attachment(1));
        material.set_property("view", viewpoint.view);
        material.set_property("projection", viewpoint.projection);
        material.set_property(
            "noiseScale",
            Vec2::new(gbuffer.width() as f32, gbuffer.height() as f32) / noise_size,
        );
        material.set_property("radius", radius);
        self.quad.draw(device, assets);
    }
}

/// Smooths the occlusion buffer with a small box filter.
pub struct BlurPlane {
    quad: ScreenQuad,
}

impl BlurPlane {
    pub fn new(assets: &mut Assets, mesh: Handle<Mesh>, program: Handle<Program>) -> BlurPlane {
        BlurPlane {
            quad: ScreenQuad::new(assets, mesh, program, MaterialKind::Blur),
        }
    }

    pub fn render(&self, device: &mut dyn Device, assets: &mut Assets, input: TextureRef) {
        self.quad.material(assets).set_property("tex", input);
        self.quad.draw(device, assets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::{PixelFormat, Uniform};
    use crate::renderer::recording::RecordingDevice;

    struct Fixture {
        device: RecordingDevice,
        assets: Assets,
        mesh: Handle<Mesh>,
        program: Handle<Program>,
        gbuffer: Framebuffer,
    }

    fn fixture() -> Fixture {
        let mut device = RecordingDevice::new();
        let mut assets = Assets::new();
        let mesh = assets.meshes.insert(Mesh::create_plane(&mut device));
        let program = Program::from_sources(&mut device, "screen", "", "").unwrap();
        let program = assets.programs.insert(program);
        let formats = [PixelFormat::Rgba16F, PixelFormat::Rgba16F, PixelFormat::Rgba8];
        let gbuffer = Framebuffer::create(&mut device, 640, 480, &formats).unwrap();
        Fixture {
            device,
            assets,
            mesh,
            program,
            gbuffer,
        }
    }

    fn composite(ssao: TextureRef, lights: &[PointLight]) -> Composite<'_> {
        Composite {
            ssao,
            use_ssao: false,
            view_position: Vec3::ZERO,
            gamma: 2.2,
            lights,
        }
    }

    #[test]
    fn no_lights_pushes_no_light_uniforms() {
        let mut f = fixture();
        let plane = DeferredPlane::new(&mut f.assets, f.mesh, f.program, 32);
        let lit = [PointLight {
            position: Vec3::ONE,
            color: Vec3::X,
        }];
        // A previous frame with a light must not leak into this one.
        let first = composite(f.gbuffer.color_attachment(0), &lit);
        plane.render(&mut f.device, &mut f.assets, &f.gbuffer, &first);
        f.device.commands.clear();

        let dark = composite(f.gbuffer.color_attachment(0), &[]);
        plane.render(&mut f.device, &mut f.assets, &f.gbuffer, &dark);
        assert!(f.device.uniform_names().all(|name| !name.starts_with("lights[")));
        assert_eq!(f.device.last_uniform("lightCount"), Some(Uniform::Int(0)));
        assert_eq!(f.device.last_uniform("useSsao"), Some(Uniform::Int(0)));
        assert_eq!(f.device.draws().count(), 1);
    }

    #[test]
    fn lights_beyond_capacity_are_ignored() {
        let mut f = fixture();
        let plane = DeferredPlane::new(&mut f.assets, f.mesh, f.program, 2);
        let lights = [PointLight {
            position: Vec3::ONE,
            color: Vec3::ONE,
        }; 3];
        let composite = composite(f.gbuffer.color_attachment(0), &lights);
        plane.render(&mut f.device, &mut f.assets, &f.gbuffer, &composite);
        assert_eq!(f.device.last_uniform("lightCount"), Some(Uniform::Int(2)));
        assert!(f.device.uniform_names().any(|name| name == "lights[1].color"));
    }

    #[test]
    fn ssao_tiles_noise_over_the_target() {
        let mut f = fixture();
        let plane = SsaoPlane::new(&mut f.device, &mut f.assets, f.mesh, f.program, 16);
        let viewpoint = Viewpoint {
            position: Vec3::ZERO,
            view: glam::Mat4::IDENTITY,
            projection: glam::Mat4::IDENTITY,
        };
        plane.render(&mut f.device, &mut f.assets, &f.gbuffer, &viewpoint, 0.5);
        assert_eq!(
            f.device.last_uniform("noiseScale"),
            Some(Uniform::Vec2(Vec2::new(160.0, 120.0)))
        );
        assert_eq!(f.device.last_uniform("sampleCount"), Some(Uniform::Int(16)));
        assert!(f.device.uniform_names().any(|name| name == "samples[15]"));
    }
}
