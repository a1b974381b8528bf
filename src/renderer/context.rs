//! The scene and the order it's drawn in.
//!
//! A frame goes through these passes, each declaring its fixed-function
//! state up front:
//!
//! 1. geometry: the ground, boxes and model into the G-buffer
//! 2. occlusion: SSAO from the G-buffer, then a blur
//! 3. composite: the G-buffer lit by the point lights, onto the screen,
//!    followed by a copy of the G-buffer depth so forward passes depth test
//!    against the model
//! 4. shadow: the ground, boxes and outlined box into the shadow map, from
//!    the light
//! 5. forward: shadow-mapped ground and boxes, skybox, windows back to
//!    front, instanced grass, the normal-mapped wall and the shadow-mapped
//!    outlined box

use std::mem;
use std::path::Path;

use glam::{Vec2, Vec3, Vec4};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::Config;
use crate::renderer::arena::{Assets, Handle};
use crate::renderer::camera::{Camera, Viewpoint};
use crate::renderer::device::{
    Clear, Comparison, Device, FixedState, PixelFormat, RenderTarget, Sampler, Wrap,
};
use crate::renderer::error::RenderError;
use crate::renderer::framebuffer::{Framebuffer, ShadowMap};
use crate::renderer::light::{scatter_point_lights, Light, PointLight, MAX_POINT_LIGHTS};
use crate::renderer::material::{Material, MaterialKind, PropertyValue};
use crate::renderer::mesh::Mesh;
use crate::renderer::model::{FallbackTextures, Model};
use crate::renderer::object::{Object, UniformBinding};
use crate::renderer::program::Program;
use crate::renderer::screen::{BlurPlane, Composite, DeferredPlane, SsaoPlane};
use crate::renderer::stencil::StencilBox;
use crate::renderer::texture::{Image, Texture, TextureRef};
use crate::renderer::transform::Transform;

const MOVE_SPEED: f32 = 0.05;
const ROTATE_SPEED: f32 = 0.8;

const GBUFFER_FORMATS: [PixelFormat; 3] = [
    PixelFormat::Rgba16F,
    PixelFormat::Rgba16F,
    PixelFormat::Rgba8,
];

/// Image files of the scene, relative to the image directory.
mod images {
    pub const CONTAINER: &str = "container2.png";
    pub const CONTAINER_SPECULAR: &str = "container2_specular.png";
    pub const MARBLE: &str = "marble.png";
    pub const WINDOW: &str = "blending_transparent_window.png";
    pub const GRASS: &str = "grass.png";
    pub const BRICK: &str = "brickwall.png";
    pub const BRICK_NORMAL: &str = "brickwall_normal.png";
    /// +X, -X, +Y, -Y, +Z, -Z
    pub const SKYBOX: [&str; 6] = [
        "skybox/right.png",
        "skybox/left.png",
        "skybox/top.png",
        "skybox/bottom.png",
        "skybox/front.png",
        "skybox/back.png",
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraKey {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Knobs that can be turned while the scene runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tunables {
    pub clear_color: Vec4,
    pub gamma: f32,
    pub ssao_radius: f32,
    pub use_ssao: bool,
    /// Whether windows and grass blend with what's behind them.
    pub blend: bool,
    pub outline_color: Vec4,
    pub outline_size: f32,
}

impl Tunables {
    fn new(config: &Config) -> Tunables {
        Tunables {
            clear_color: Vec4::new(0.1, 0.2, 0.3, 0.0),
            gamma: 1.0,
            ssao_radius: 1.0,
            use_ssao: true,
            blend: true,
            outline_color: Vec4::from_array(config.scene.outline_color),
            outline_size: config.scene.outline_size,
        }
    }
}

/// Render targets. The G-buffer and occlusion buffers follow the window size.
struct Targets {
    gbuffer: Framebuffer,
    ssao: Framebuffer,
    blur: Framebuffer,
    shadow_map: ShadowMap,
}

impl Targets {
    fn create(
        device: &mut dyn Device,
        width: u32,
        height: u32,
        shadow_map_size: u32,
    ) -> Result<Targets, RenderError> {
        let (gbuffer, ssao, blur) = Targets::create_sized(device, width, height)?;
        match ShadowMap::create(device, shadow_map_size, shadow_map_size) {
            Ok(shadow_map) => Ok(Targets {
                gbuffer,
                ssao,
                blur,
                shadow_map,
            }),
            Err(err) => {
                for framebuffer in [gbuffer, ssao, blur] {
                    framebuffer.destroy(device);
                }
                Err(err)
            }
        }
    }

    fn create_sized(
        device: &mut dyn Device,
        width: u32,
        height: u32,
    ) -> Result<(Framebuffer, Framebuffer, Framebuffer), RenderError> {
        let gbuffer = Framebuffer::create(device, width, height, &GBUFFER_FORMATS)?;
        let ssao = match Framebuffer::create(device, width, height, &[PixelFormat::R16F]) {
            Ok(ssao) => ssao,
            Err(err) => {
                gbuffer.destroy(device);
                return Err(err);
            }
        };
        match Framebuffer::create(device, width, height, &[PixelFormat::R16F]) {
            Ok(blur) => Ok((gbuffer, ssao, blur)),
            Err(err) => {
                gbuffer.destroy(device);
                ssao.destroy(device);
                Err(err)
            }
        }
    }

    fn resize(
        &mut self,
        device: &mut dyn Device,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let (gbuffer, ssao, blur) = Targets::create_sized(device, width, height)?;
        mem::replace(&mut self.gbuffer, gbuffer).destroy(device);
        mem::replace(&mut self.ssao, ssao).destroy(device);
        mem::replace(&mut self.blur, blur).destroy(device);
        Ok(())
    }

    fn destroy(self, device: &mut dyn Device) {
        self.gbuffer.destroy(device);
        self.ssao.destroy(device);
        self.blur.destroy(device);
        self.shadow_map.destroy(device);
    }
}

/// Everything that gets drawn.
struct Scene {
    model: Model,
    geometry_material: Handle<Material>,
    shadow_material: Handle<Material>,
    ground: Object,
    boxes: Vec<Object>,
    skybox: Object,
    windows: Vec<Object>,
    grass: Object,
    wall: Object,
    stencil_box: StencilBox,
    deferred: DeferredPlane,
    ssao: SsaoPlane,
    blur: BlurPlane,
}

/// Loaded programs, by the name of their shader files.
struct Programs {
    simple: Handle<Program>,
    texture: Handle<Program>,
    grass: Handle<Program>,
    normal: Handle<Program>,
    skybox: Handle<Program>,
    defer_geo: Handle<Program>,
    defer_light: Handle<Program>,
    ssao: Handle<Program>,
    blur: Handle<Program>,
    lighting_shadow: Handle<Program>,
}

impl Programs {
    fn load(
        device: &mut dyn Device,
        assets: &mut Assets,
        dir: &Path,
    ) -> Result<Programs, RenderError> {
        let mut load = |name: &str| -> Result<Handle<Program>, RenderError> {
            let program = Program::load(device, dir, name)?;
            Ok(assets.programs.insert(program))
        };
        Ok(Programs {
            simple: load("simple")?,
            texture: load("texture")?,
            grass: load("grass")?,
            normal: load("normal")?,
            skybox: load("skybox")?,
            defer_geo: load("defer_geo")?,
            defer_light: load("defer_light")?,
            ssao: load("ssao")?,
            blur: load("blur")?,
            lighting_shadow: load("lighting_shadow")?,
        })
    }
}

/// Owns the device and every resource of the scene, takes input from the
/// window shell and renders frames.
pub struct Context<D: Device> {
    gpu: D,
    assets: Assets,
    targets: Option<Targets>,
    scene: Scene,
    width: u32,
    height: u32,
    camera: Camera,
    light: Light,
    point_lights: Vec<PointLight>,
    tunables: Tunables,
    camera_control: bool,
    previous_mouse: Vec2,
}

impl<D: Device> Context<D> {
    /// Loads every shader, image and model the scene needs. Any missing or
    /// broken file fails the whole thing.
    pub fn create(
        mut gpu: D,
        config: &Config,
        width: u32,
        height: u32,
    ) -> Result<Context<D>, RenderError> {
        let (width, height) = (width.max(1), height.max(1));
        let mut assets = Assets::new();
        let mut rng = StdRng::seed_from_u64(config.scene.light_seed);
        let shadow_map_size = config.scene.shadow_map_size.max(1);
        let built = build_scene(&mut gpu, &mut assets, config, &mut rng).and_then(|mut scene| {
            match Targets::create(&mut gpu, width, height, shadow_map_size) {
                Ok(targets) => Ok((scene, targets)),
                Err(err) => {
                    scene.grass.release(&mut gpu);
                    Err(err)
                }
            }
        });
        let (scene, targets) = match built {
            Ok(built) => built,
            Err(err) => {
                assets.release(&mut gpu);
                return Err(err);
            }
        };

        let point_lights = scatter_point_lights(config.scene.point_lights, &mut rng);
        let mut camera = Camera::new(Vec3::new(0.0, 2.5, 8.0));
        camera.pitch = -20.0;
        info!(
            "scene ready: {} programs, {} textures, {} meshes, {} materials, {} point lights",
            assets.programs.len(),
            assets.textures.len(),
            assets.meshes.len(),
            assets.materials.len(),
            point_lights.len()
        );

        Ok(Context {
            gpu,
            assets,
            targets: Some(targets),
            scene,
            width,
            height,
            camera,
            light: Light::default(),
            point_lights,
            tunables: Tunables::new(config),
            camera_control: false,
            previous_mouse: Vec2::ZERO,
        })
    }

    /// Moves the camera while it's being controlled.
    pub fn process_input(&mut self, is_pressed: impl Fn(CameraKey) -> bool) {
        if !self.camera_control {
            return;
        }
        let axis = |positive, negative| {
            (is_pressed(positive) as i32 - is_pressed(negative) as i32) as f32 * MOVE_SPEED
        };
        self.camera.translate(
            axis(CameraKey::Right, CameraKey::Left),
            axis(CameraKey::Up, CameraKey::Down),
            axis(CameraKey::Forward, CameraKey::Backward),
        );
    }

    pub fn mouse_move(&mut self, x: f64, y: f64) {
        if !self.camera_control {
            return;
        }
        let position = Vec2::new(x as f32, y as f32);
        let delta = position - self.previous_mouse;
        self.camera.rotate(-delta.x * ROTATE_SPEED, -delta.y * ROTATE_SPEED);
        self.previous_mouse = position;
    }

    /// Holding the right button hands the camera to the mouse and keyboard.
    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool, x: f64, y: f64) {
        if button != MouseButton::Right {
            return;
        }
        if pressed {
            self.previous_mouse = Vec2::new(x as f32, y as f32);
        }
        self.camera_control = pressed;
    }

    /// Recreates the size dependent targets. Zero sizes, e.g. from a
    /// minimized window, are ignored.
    pub fn reshape(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return Ok(());
        }
        if let Some(targets) = &mut self.targets {
            targets.resize(&mut self.gpu, width, height)?;
        }
        debug!("resized to {width}x{height}");
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn render(&mut self) {
        self.camera.update(self.width as f32 / self.height as f32);
        let camera = self.camera.viewpoint();
        let light_view = self.light.viewpoint();
        let Some(targets) = &self.targets else {
            return;
        };
        let gpu: &mut dyn Device = &mut self.gpu;
        let assets = &mut self.assets;
        let scene = &mut self.scene;
        let tunables = self.tunables;
        let (width, height) = (self.width, self.height);

        // Geometry
        gpu.apply_state(&FixedState::opaque());
        targets.gbuffer.bind(gpu);
        gpu.viewport(0, 0, width, height);
        gpu.clear(Clear::all(Vec4::ZERO));
        for object in scene.lit_objects() {
            feed_maps(assets, object.material, scene.geometry_material);
            object.render(gpu, assets, &camera, Some(scene.geometry_material));
        }
        scene.model.render(gpu, assets, &camera, scene.geometry_material);

        // Occlusion
        gpu.apply_state(&FixedState::screen_pass());
        targets.ssao.bind(gpu);
        gpu.clear(Clear::color_only(Vec4::ONE));
        scene.ssao.render(gpu, assets, &targets.gbuffer, &camera, tunables.ssao_radius);

        gpu.apply_state(&FixedState::screen_pass());
        targets.blur.bind(gpu);
        gpu.clear(Clear::color_only(Vec4::ONE));
        scene.blur.render(gpu, assets, targets.ssao.color_attachment(0));

        // Composite
        gpu.apply_state(&FixedState::screen_pass());
        gpu.bind_render_target(RenderTarget::Screen);
        gpu.clear(Clear::all(tunables.clear_color));
        let composite = Composite {
            ssao: targets.blur.color_attachment(0),
            use_ssao: tunables.use_ssao,
            view_position: camera.position,
            gamma: tunables.gamma,
            lights: &self.point_lights,
        };
        scene.deferred.render(gpu, assets, &targets.gbuffer, &composite);
        gpu.blit_depth(targets.gbuffer.target(), RenderTarget::Screen, width, height);

        // Shadow
        gpu.apply_state(&FixedState::opaque());
        targets.shadow_map.bind(gpu);
        gpu.viewport(0, 0, targets.shadow_map.width(), targets.shadow_map.height());
        gpu.clear(Clear::depth_only());
        for object in scene.shadow_casters() {
            object.render(gpu, assets, &light_view, Some(scene.shadow_material));
        }
        gpu.bind_render_target(RenderTarget::Screen);
        gpu.viewport(0, 0, width, height);

        // Forward, over the same depth the G-buffer left behind
        gpu.apply_state(&FixedState {
            depth_func: Comparison::LessEqual,
            ..FixedState::opaque()
        });
        let shadow_map = targets.shadow_map.depth();
        for object in scene.lit_objects() {
            let material = &mut assets.materials[object.material];
            set_lighting(material, &self.light, &light_view, &camera, &tunables, shadow_map);
            object.render(gpu, assets, &camera, None);
        }
        let material = &mut assets.materials[scene.stencil_box.object.material];
        set_lighting(material, &self.light, &light_view, &camera, &tunables, shadow_map);

        gpu.apply_state(&FixedState {
            depth_func: Comparison::LessEqual,
            ..FixedState::opaque()
        });
        scene.skybox.render(gpu, assets, &camera, None);

        gpu.apply_state(&FixedState::opaque());
        sort_back_to_front(&mut scene.windows, camera.position);
        for window in &scene.windows {
            assets.materials[window.material].set_blending(tunables.blend);
            window.render(gpu, assets, &camera, None);
        }
        assets.materials[scene.grass.material].set_blending(tunables.blend);
        scene.grass.render(gpu, assets, &camera, None);

        gpu.apply_state(&FixedState::opaque());
        scene.wall.binding = UniformBinding::NormalMapped {
            light_position: self.light.position,
        };
        scene.wall.render(gpu, assets, &camera, None);

        scene.stencil_box.outline_color = tunables.outline_color;
        scene.stencil_box.outline_size = tunables.outline_size;
        scene.stencil_box.render(gpu, assets, &camera);
    }

    pub fn tunables_mut(&mut self) -> &mut Tunables {
        &mut self.tunables
    }

    pub fn light_mut(&mut self) -> &mut Light {
        &mut self.light
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.gpu
    }

    #[cfg(test)]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl<D: Device> Drop for Context<D> {
    fn drop(&mut self) {
        self.scene.grass.release(&mut self.gpu);
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.gpu);
        }
        self.assets.release(&mut self.gpu);
    }
}

impl Scene {
    /// Shadow-mapped objects that also go through the G-buffer.
    fn lit_objects(&self) -> impl Iterator<Item = &Object> {
        std::iter::once(&self.ground).chain(&self.boxes)
    }

    fn shadow_casters(&self) -> impl Iterator<Item = &Object> {
        self.lit_objects().chain(std::iter::once(&self.stencil_box.object))
    }
}

/// Hands the diffuse and specular maps of `from` to `to`.
fn feed_maps(assets: &mut Assets, from: Handle<Material>, to: Handle<Material>) {
    for name in ["material.diffuse", "material.specular"] {
        if let Some(PropertyValue::Texture(map)) = assets.materials[from].property(name) {
            assets.materials[to].set_property(name, map);
        }
    }
}

fn set_lighting(
    material: &mut Material,
    light: &Light,
    light_view: &Viewpoint,
    camera: &Viewpoint,
    tunables: &Tunables,
    shadow_map: TextureRef,
) {
    let (inner, outer) = light.cutoff_cosines();
    material.set_property("viewPos", camera.position);
    material.set_property("lightTransform", light_view.view_projection());
    material.set_property("light.directional", light.directional);
    material.set_property("light.position", light.position);
    material.set_property("light.direction", light.direction);
    material.set_property("light.cutoff", Vec2::new(inner, outer));
    material.set_property("light.attenuation", light.attenuation());
    material.set_property("light.ambient", light.ambient);
    material.set_property("light.diffuse", light.diffuse);
    material.set_property("light.specular", light.specular);
    material.set_property("gamma", tunables.gamma);
    material.set_property("shadowMap", shadow_map);
}

fn sort_back_to_front(objects: &mut [Object], eye: Vec3) {
    objects.sort_by(|a, b| {
        let a = a.transform.position.distance_squared(eye);
        let b = b.transform.position.distance_squared(eye);
        b.total_cmp(&a)
    });
}

fn build_scene(
    device: &mut dyn Device,
    assets: &mut Assets,
    config: &Config,
    rng: &mut StdRng,
) -> Result<Scene, RenderError> {
    let programs = Programs::load(device, assets, &config.assets.shader_dir)?;
    let image_dir = &config.assets.image_dir;
    let mut image_texture = |name: &str, wrap: Wrap| -> Result<TextureRef, RenderError> {
        let image = Image::load(&image_dir.join(name))?;
        let texture = Texture::from_image(device, &image, Sampler::IMAGE.with_wrap(wrap));
        let handle = texture.handle();
        assets.textures.insert(texture);
        Ok(handle)
    };
    let container = image_texture(images::CONTAINER, Wrap::Repeat)?;
    let container_specular = image_texture(images::CONTAINER_SPECULAR, Wrap::Repeat)?;
    let marble = image_texture(images::MARBLE, Wrap::Repeat)?;
    let window = image_texture(images::WINDOW, Wrap::ClampToEdge)?;
    let grass = image_texture(images::GRASS, Wrap::ClampToEdge)?;
    let brick = image_texture(images::BRICK, Wrap::Repeat)?;
    let brick_normal = image_texture(images::BRICK_NORMAL, Wrap::Repeat)?;

    let [right, left, top, bottom, front, back] =
        images::SKYBOX.map(|name| Image::load_cube_face(&image_dir.join(name)));
    let faces = [right?, left?, top?, bottom?, front?, back?];
    let skybox_texture = Texture::cube_from_images(device, &faces);
    let skybox_handle = skybox_texture.handle();
    assets.textures.insert(skybox_texture);

    let mut solid = |color: [u8; 4]| {
        let texture = Texture::from_image(device, &Image::solid(1, 1, color), Sampler::IMAGE);
        let handle = texture.handle();
        assets.textures.insert(texture);
        handle
    };
    let fallback = FallbackTextures {
        diffuse: solid([255, 255, 255, 255]),
        specular: solid([0, 0, 0, 255]),
    };
    let dim_specular = solid([64, 64, 64, 255]);

    let box_mesh = assets.meshes.insert(Mesh::create_box(device));
    let plane_mesh = assets.meshes.insert(Mesh::create_plane(device));

    let mut model = Model::load(device, assets, &config.assets.model, fallback)?;
    model.transform =
        Transform::from_position(Vec3::new(-4.0, 1.5, 2.0)).with_scale(Vec3::splat(0.5));
    let geometry_material = assets.materials.insert(Material::new(
        &assets.programs[programs.defer_geo],
        MaterialKind::GeometryBuffer,
    ));

    let mut basic = Material::new(&assets.programs[programs.simple], MaterialKind::Basic);
    basic.set_property("color", Vec4::new(0.0, 0.0, 0.0, 1.0));
    let shadow_material = assets.materials.insert(basic);

    let mut shadow_lit = |diffuse: TextureRef, specular: TextureRef| {
        let mut material = Material::new(
            &assets.programs[programs.lighting_shadow],
            MaterialKind::ShadowLighting,
        );
        material.set_property("material.diffuse", diffuse);
        material.set_property("material.specular", specular);
        material.set_property("material.shininess", 32.0);
        assets.materials.insert(material)
    };
    let ground = Object::new(
        box_mesh,
        shadow_lit(marble, dim_specular),
        Transform::from_position(Vec3::new(0.0, -0.5, 0.0)).with_scale(Vec3::new(10.0, 1.0, 10.0)),
    );
    let box_material = shadow_lit(container, container_specular);
    let stencil_box_material = shadow_lit(marble, container_specular);
    let boxes = [
        (Vec3::new(-1.0, 0.75, -4.0), 30.0),
        (Vec3::new(0.0, 0.75, 2.0), 20.0),
        (Vec3::new(3.0, 1.75, -2.0), 50.0),
    ]
    .into_iter()
    .map(|(position, yaw)| {
        let transform = Transform::from_position(position)
            .with_rotation(Vec3::new(0.0, yaw, 0.0))
            .with_scale(Vec3::splat(1.5));
        Object::new(box_mesh, box_material, transform)
    })
    .collect();

    let mut skybox_material =
        Material::new(&assets.programs[programs.skybox], MaterialKind::Skybox);
    skybox_material.set_property("skybox", skybox_handle);
    let skybox = Object::new(
        box_mesh,
        assets.materials.insert(skybox_material),
        Transform::default().with_scale(Vec3::splat(50.0)),
    )
    .with_binding(UniformBinding::Skybox);

    let mut window_material =
        Material::new(&assets.programs[programs.texture], MaterialKind::Transparent);
    window_material.set_property("tex", window);
    let window_material = assets.materials.insert(window_material);
    let windows = [
        Vec3::new(0.0, 0.5, 4.0),
        Vec3::new(0.2, 0.5, 5.0),
        Vec3::new(0.4, 0.5, 6.0),
    ]
    .into_iter()
    .map(|position| Object::new(plane_mesh, window_material, Transform::from_position(position)))
    .collect();

    let mut grass_material =
        Material::new(&assets.programs[programs.grass], MaterialKind::Transparent);
    grass_material.set_property("tex", grass);
    let mut grass = Object::new(
        plane_mesh,
        assets.materials.insert(grass_material),
        Transform::from_position(Vec3::new(0.0, 0.5, 0.0)),
    );
    grass.active_instancing(device, &assets.meshes, config.scene.grass_instances, 3, 3, 1, rng);

    let mut wall_material =
        Material::new(&assets.programs[programs.normal], MaterialKind::NormalMap);
    wall_material.set_property("diffuse", brick);
    wall_material.set_property("normalMap", brick_normal);
    let wall = Object::new(
        plane_mesh,
        assets.materials.insert(wall_material),
        Transform::from_position(Vec3::new(0.0, 2.5, -6.0)).with_scale(Vec3::splat(5.0)),
    );

    let mut outline = Material::new(&assets.programs[programs.simple], MaterialKind::Basic);
    outline.set_property("color", Vec4::from_array(config.scene.outline_color));
    let stencil_box = StencilBox {
        object: Object::new(
            box_mesh,
            stencil_box_material,
            Transform::from_position(Vec3::new(-3.0, 0.75, -1.0)).with_scale(Vec3::splat(1.5)),
        ),
        outline_material: assets.materials.insert(outline),
        outline_color: Vec4::from_array(config.scene.outline_color),
        outline_size: config.scene.outline_size,
    };

    let deferred = DeferredPlane::new(assets, plane_mesh, programs.defer_light, MAX_POINT_LIGHTS);
    let ssao = SsaoPlane::new(device, assets, plane_mesh, programs.ssao, config.scene.ssao_samples);
    let blur = BlurPlane::new(assets, plane_mesh, programs.blur);

    Ok(Scene {
        model,
        geometry_material,
        shadow_material,
        ground,
        boxes,
        skybox,
        windows,
        grass,
        wall,
        stencil_box,
        deferred,
        ssao,
        blur,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::config::{AssetConfig, SceneConfig};
    use crate::renderer::device::Uniform;
    use crate::renderer::gltf::tests::write_triangle_gltf;
    use crate::renderer::recording::{Command, RecordingDevice};

    fn write_png(path: &Path) {
        image::RgbaImage::from_pixel(2, 2, image::Rgba([120, 80, 40, 255]))
            .save(path)
            .unwrap();
    }

    /// Writes every image and the model of the scene under `dir`.
    fn config_in(dir: &Path) -> Config {
        let image_dir = dir.join("image");
        fs::create_dir_all(image_dir.join("skybox")).unwrap();
        let flat = [
            images::CONTAINER,
            images::CONTAINER_SPECULAR,
            images::MARBLE,
            images::WINDOW,
            images::GRASS,
            images::BRICK,
            images::BRICK_NORMAL,
        ];
        for name in flat.into_iter().chain(images::SKYBOX) {
            write_png(&image_dir.join(name));
        }
        let model_dir = dir.join("model");
        let model = write_triangle_gltf(&model_dir);
        write_png(&model_dir.join("diffuse.png"));
        write_png(&model_dir.join("specular.png"));

        Config {
            assets: AssetConfig {
                shader_dir: PathBuf::from("shader"),
                image_dir,
                model,
            },
            scene: SceneConfig {
                point_lights: 4,
                grass_instances: 10,
                ssao_samples: 8,
                shadow_map_size: 64,
                ..SceneConfig::default()
            },
            ..Config::default()
        }
    }

    fn context(name: &str) -> Context<RecordingDevice> {
        let config = config_in(&std::env::temp_dir().join(name));
        Context::create(RecordingDevice::new(), &config, 320, 240).unwrap()
    }

    #[test]
    fn frame_visits_targets_in_pass_order() {
        let mut context = context("deferred-scene-context-frame");
        context.render();
        let device = context.device();

        let targets = device.bound_targets();
        assert_eq!(targets.len(), 6);
        assert!(targets[..3]
            .iter()
            .all(|target| matches!(target, RenderTarget::Offscreen(_))));
        assert_ne!(targets[0], targets[1]);
        assert_ne!(targets[1], targets[2]);
        assert_eq!(targets[3], RenderTarget::Screen);
        assert!(matches!(targets[4], RenderTarget::Offscreen(_)));
        assert_eq!(targets[5], RenderTarget::Screen);

        // The last pass restores the opaque state it started from.
        assert_eq!(*device.fixed_state(), FixedState::opaque());
        assert_eq!(device.last_uniform("lightCount"), Some(Uniform::Int(4)));
        assert_eq!(
            device.last_uniform("shadowMap"),
            Some(Uniform::Int(crate::renderer::material::SHADOW_MAP_UNIT as i32))
        );
    }

    #[test]
    fn forward_draws_follow_the_depth_copy() {
        let mut context = context("deferred-scene-context-forward");
        context.render();
        let device = context.device();

        let blit = device
            .commands
            .iter()
            .position(|command| matches!(command, Command::BlitDepth { .. }))
            .unwrap();
        let first_screen_draw = device
            .commands
            .iter()
            .position(|command| match command {
                Command::Draw(draw) => draw.target == RenderTarget::Screen && draw.state.depth_test,
                _ => false,
            })
            .unwrap();
        assert!(blit < first_screen_draw);

        let grass = device.draws().find(|draw| draw.instances.is_some()).unwrap();
        assert_eq!(grass.instances, Some(10));
        assert!(grass.state.blend);
        assert!(!grass.state.cull_face);

        // The ground and 3 boxes drawn three times (G-buffer, shadow map,
        // forward), 1 model part, 3 screen passes, the outlined box into the
        // shadow map and twice for its outline, the skybox, 3 windows, grass
        // and the wall.
        assert_eq!(device.draws().count(), 4 * 3 + 1 + 3 + 3 + 1 + 3 + 1 + 1);
    }

    #[test]
    fn gbuffer_holds_ground_boxes_and_model() {
        let mut context = context("deferred-scene-context-gbuffer");
        context.render();
        let device = context.device();
        let gbuffer = device.bound_targets()[0];
        let geometry = device.draws().filter(|draw| draw.target == gbuffer).count();
        assert_eq!(geometry, 4 + 1);

        // The last object fed to the G-buffer was a box.
        let scene = &context.scene;
        let material = &context.assets.materials[scene.geometry_material];
        let box_material = &context.assets.materials[scene.boxes[2].material];
        assert_eq!(
            material.property("material.diffuse"),
            box_material.property("material.diffuse")
        );
        assert!(matches!(
            material.property("material.specular"),
            Some(PropertyValue::Texture(_))
        ));
    }

    #[test]
    fn outlined_box_is_shadow_mapped() {
        let mut context = context("deferred-scene-context-outlined");
        context.render();
        let light = context.light;
        let material = &context.assets.materials[context.scene.stencil_box.object.material];
        assert_eq!(
            material.property("light.position"),
            Some(PropertyValue::Vec3(light.position))
        );
        assert!(matches!(
            material.property("shadowMap"),
            Some(PropertyValue::Texture(_))
        ));

        // The stamp draw samples the shadow map from its pinned unit.
        let stamp = context
            .device()
            .draws()
            .find(|draw| draw.state.stencil_test)
            .unwrap();
        assert_eq!(stamp.state.stencil_write_mask, 0xFF);
        assert_eq!(
            context.device().last_uniform("shadowMap"),
            Some(Uniform::Int(crate::renderer::material::SHADOW_MAP_UNIT as i32))
        );
    }

    #[test]
    fn failed_targets_leave_nothing_behind() {
        for limit in 0..4 {
            let mut device = RecordingDevice::new();
            device.framebuffer_limit = Some(limit);
            let result = Targets::create(&mut device, 32, 32, 16);
            assert!(matches!(result, Err(RenderError::IncompleteFramebuffer(_))));
            assert_eq!(device.live_framebuffers(), 0, "limit {limit}");
            assert_eq!(device.live_textures(), 0, "limit {limit}");
        }

        for limit in 4..7 {
            let mut device = RecordingDevice::new();
            let mut targets = Targets::create(&mut device, 32, 32, 16).unwrap();
            let textures = device.live_textures();
            device.framebuffer_limit = Some(limit);
            assert!(targets.resize(&mut device, 64, 64).is_err());
            assert_eq!(device.live_framebuffers(), 4, "limit {limit}");
            assert_eq!(device.live_textures(), textures, "limit {limit}");
            assert_eq!(targets.gbuffer.width(), 32);
            targets.destroy(&mut device);
        }
    }

    #[test]
    fn windows_are_drawn_back_to_front() {
        let mut context = context("deferred-scene-context-windows");
        context.render();
        let eye = context.camera.position;
        let distances = context
            .scene
            .windows
            .iter()
            .map(|window| window.transform.position.distance(eye))
            .collect::<Vec<_>>();
        assert!(distances.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn unblended_windows_overwrite() {
        let mut context = context("deferred-scene-context-unblended");
        context.tunables_mut().blend = false;
        context.render();
        let grass = context
            .device()
            .draws()
            .find(|draw| draw.instances.is_some())
            .unwrap();
        assert!(!grass.state.blend);
    }

    #[test]
    fn reshape_replaces_sized_targets() {
        let mut context = context("deferred-scene-context-reshape");
        let framebuffers = context.device().live_framebuffers();
        let textures = context.device().live_textures();
        assert_eq!(framebuffers, 4);

        context.reshape(640, 480).unwrap();
        assert_eq!(context.size(), (640, 480));
        assert_eq!(context.device().live_framebuffers(), framebuffers);
        assert_eq!(context.device().live_textures(), textures);

        context.reshape(0, 0).unwrap();
        assert_eq!(context.size(), (640, 480));
    }

    #[test]
    fn camera_moves_only_while_controlled() {
        let mut context = context("deferred-scene-context-camera");
        let start = context.camera.position;
        context.process_input(|key| key == CameraKey::Forward);
        context.mouse_move(100.0, 0.0);
        assert_eq!(context.camera.position, start);
        assert_eq!(context.camera.yaw, 0.0);

        context.mouse_button(MouseButton::Right, true, 0.0, 0.0);
        context.mouse_move(10.0, 0.0);
        assert!((context.camera.yaw - 352.0).abs() < 1e-4);
        context.process_input(|key| key == CameraKey::Forward);
        assert!((context.camera.position - start).length() > 0.049);

        context.mouse_button(MouseButton::Right, false, 10.0, 0.0);
        let yaw = context.camera.yaw;
        context.mouse_move(50.0, 50.0);
        assert_eq!(context.camera.yaw, yaw);
    }

    #[test]
    fn missing_images_fail_creation() {
        let dir = std::env::temp_dir().join("deferred-scene-context-missing");
        let config = config_in(&dir);
        fs::remove_file(config.assets.image_dir.join(images::GRASS)).unwrap();
        let result = Context::create(RecordingDevice::new(), &config, 320, 240);
        assert!(matches!(result, Err(RenderError::Image { .. })));
    }
}
