use std::f32::consts::TAU;
use std::mem::size_of;

use glam::{Mat4, Vec3};
use rand::Rng;

use crate::renderer::arena::{Arena, Assets, Handle};
use crate::renderer::buffer::{Buffer, VertexLayout};
use crate::renderer::camera::Viewpoint;
use crate::renderer::device::{BufferTarget, Device};
use crate::renderer::material::Material;
use crate::renderer::mesh::{Mesh, Vertex, VERTEX_ATTRIBUTES};
use crate::renderer::transform::Transform;

/// Which per-draw uniforms an object feeds its material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformBinding {
    /// `transform` (projection * view * model) and `modelTransform`.
    Standard,
    /// Separate `model`, `view` and `projection` plus `cameraPos`.
    Skybox,
    /// The standard pair plus `viewPos` and `lightPos` for tangent space lighting.
    NormalMapped { light_position: Vec3 },
}

impl UniformBinding {
    fn bind(&self, material: &mut Material, viewpoint: &Viewpoint, model: Mat4) {
        match *self {
            UniformBinding::Standard => {
                material.set_property("transform", viewpoint.view_projection() * model);
                material.set_property("modelTransform", model);
            }
            UniformBinding::Skybox => {
                material.set_property("model", model);
                material.set_property("view", viewpoint.view);
                material.set_property("projection", viewpoint.projection);
                material.set_property("cameraPos", viewpoint.position);
            }
            UniformBinding::NormalMapped { light_position } => {
                material.set_property("viewPos", viewpoint.position);
                material.set_property("lightPos", light_position);
                material.set_property("transform", viewpoint.view_projection() * model);
                material.set_property("modelTransform", model);
            }
        }
    }
}

/// Per-instance attribute stream of an instanced object.
struct Instancing {
    layout: VertexLayout,
    buffer: Buffer,
    offsets: Vec<Vec3>,
}

/// A mesh drawn with a material at some transform.
pub struct Object {
    pub mesh: Handle<Mesh>,
    pub material: Handle<Material>,
    pub transform: Transform,
    pub binding: UniformBinding,
    instancing: Option<Instancing>,
}

impl Object {
    pub fn new(mesh: Handle<Mesh>, material: Handle<Material>, transform: Transform) -> Object {
        Object {
            mesh,
            material,
            transform,
            binding: UniformBinding::Standard,
            instancing: None,
        }
    }

    pub fn with_binding(self, binding: UniformBinding) -> Object {
        Object { binding, ..self }
    }

    /// Draws with `material` if given, otherwise with the object's own.
    pub fn render(
        &self,
        device: &mut dyn Device,
        assets: &mut Assets,
        viewpoint: &Viewpoint,
        material: Option<Handle<Material>>,
    ) {
        let material = &mut assets.materials[material.unwrap_or(self.material)];
        self.binding.bind(material, viewpoint, self.transform.matrix());
        material.apply(device);

        let mesh = &assets.meshes[self.mesh];
        match &self.instancing {
            Some(instancing) => {
                mesh.draw_instanced(device, &instancing.layout, instancing.offsets.len() as u32)
            }
            None => mesh.draw(device),
        }
    }

    /// Turns this into `count` copies of the object, each displaced by a
    /// random `(x, angle, z)` read by the vertex shader from attribute
    /// `attrib`. x and z are in `[-5, 5]`, the angle in `[0, 2π)` radians.
    #[allow(clippy::too_many_arguments)]
    pub fn active_instancing(
        &mut self,
        device: &mut dyn Device,
        meshes: &Arena<Mesh>,
        count: usize,
        attrib: u32,
        components: i32,
        divisor: u32,
        rng: &mut impl Rng,
    ) {
        self.release(device);

        let offsets = (0..count)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-5.0..=5.0),
                    rng.random_range(0.0..TAU),
                    rng.random_range(-5.0..=5.0),
                )
            })
            .collect::<Vec<_>>();

        let mesh = &meshes[self.mesh];
        let layout = VertexLayout::new(device);
        mesh.vertex_buffer().bind(device);
        for (location, components, offset) in &VERTEX_ATTRIBUTES[..3] {
            layout.set_attrib(device, *location, *components, size_of::<Vertex>(), *offset);
        }
        let buffer = Buffer::with_data(device, BufferTarget::Vertex, &offsets);
        layout.set_instanced_attrib(device, attrib, components, size_of::<Vec3>(), 0, divisor);
        mesh.index_buffer().bind(device);

        self.instancing = Some(Instancing {
            layout,
            buffer,
            offsets,
        });
    }

    #[cfg(test)]
    pub fn instance_offsets(&self) -> &[Vec3] {
        self.instancing
            .as_ref()
            .map_or(&[][..], |instancing| instancing.offsets.as_slice())
    }

    /// Deletes the instance stream, if any. Meshes and materials belong to
    /// the [`Assets`].
    pub fn release(&mut self, device: &mut dyn Device) {
        if let Some(instancing) = self.instancing.take() {
            instancing.layout.destroy(device);
            instancing.buffer.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::Uniform;
    use crate::renderer::material::{MaterialKind, PropertyValue};
    use crate::renderer::program::Program;
    use crate::renderer::recording::{Command, RecordingDevice};
    use crate::renderer::texture::{Image, Texture};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene(device: &mut RecordingDevice, kind: MaterialKind) -> (Assets, Object) {
        let mut assets = Assets::new();
        let program = Program::from_sources(device, "test", "", "").unwrap();
        let material = assets.materials.insert(Material::new(&program, kind));
        assets.programs.insert(program);
        let mesh = assets.meshes.insert(Mesh::create_box(device));
        (assets, Object::new(mesh, material, Transform::default()))
    }

    fn viewpoint() -> Viewpoint {
        Viewpoint {
            position: Vec3::new(0.0, 1.0, 3.0),
            view: Mat4::IDENTITY,
            projection: Mat4::from_scale(Vec3::splat(2.0)),
        }
    }

    #[test]
    fn standard_binding_pushes_both_transforms() {
        let mut device = RecordingDevice::new();
        let (mut assets, mut object) = scene(&mut device, MaterialKind::Basic);
        object.transform.position = Vec3::X;
        object.render(&mut device, &mut assets, &viewpoint(), None);
        let model = Mat4::from_translation(Vec3::X);
        assert_eq!(device.last_uniform("modelTransform"), Some(Uniform::Mat4(model)));
        assert_eq!(
            device.last_uniform("transform"),
            Some(Uniform::Mat4(Mat4::from_scale(Vec3::splat(2.0)) * model))
        );
        assert_eq!(device.draws().count(), 1);
    }

    #[test]
    fn override_material_leaves_the_default_alone() {
        let mut device = RecordingDevice::new();
        let (mut assets, object) = scene(&mut device, MaterialKind::Basic);
        let program = Program::from_sources(&mut device, "other", "", "").unwrap();
        let other = assets.materials.insert(Material::new(&program, MaterialKind::Basic));
        object.render(&mut device, &mut assets, &viewpoint(), Some(other));
        assert_eq!(device.draws().last().unwrap().program, Some(program.id()));
        assert_eq!(
            assets.materials[object.material].property("transform"),
            Some(PropertyValue::Absent)
        );
    }

    #[test]
    fn skybox_binding_samples_unit_zero() {
        let mut device = RecordingDevice::new();
        let (mut assets, object) = scene(&mut device, MaterialKind::Skybox);
        let object = object.with_binding(UniformBinding::Skybox);
        let faces = [(); 6].map(|_| Image::solid(1, 1, [0, 0, 255, 255]));
        let cube = Texture::cube_from_images(&mut device, &faces);
        assets.materials[object.material].set_property("skybox", cube.handle());
        object.render(&mut device, &mut assets, &viewpoint(), None);
        assert_eq!(device.last_uniform("skybox"), Some(Uniform::Int(0)));
        assert_eq!(
            device.last_uniform("cameraPos"),
            Some(Uniform::Vec3(Vec3::new(0.0, 1.0, 3.0)))
        );
    }

    #[test]
    fn instancing_draws_every_offset() {
        let mut device = RecordingDevice::new();
        let (mut assets, mut object) = scene(&mut device, MaterialKind::Transparent);
        let mut rng = StdRng::seed_from_u64(3);
        object.active_instancing(&mut device, &assets.meshes, 1000, 3, 3, 1, &mut rng);

        let offsets = object.instance_offsets();
        assert_eq!(offsets.len(), 1000);
        for offset in offsets {
            assert!(offset.x.abs() <= 5.0 && offset.z.abs() <= 5.0);
            assert!((0.0..TAU).contains(&offset.y));
        }
        assert!(device.commands.contains(&Command::VertexAttrib(
            crate::renderer::device::VertexAttrib {
                index: 3,
                components: 3,
                stride: 12,
                offset: 0,
                divisor: 1,
            }
        )));

        object.render(&mut device, &mut assets, &viewpoint(), None);
        let draw = device.draws().last().cloned().unwrap();
        assert_eq!(draw.instances, Some(1000));
        assert_eq!(draw.index_count, 36);
    }
}
