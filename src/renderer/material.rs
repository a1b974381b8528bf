//! Materials: a program plus a fixed table of named uniform values.
//!
//! Each [`MaterialKind`] declares which property names its shaders read. Only
//! declared names can be set; anything else is logged and dropped, so a typo
//! shows up in the log instead of as a silently black object.

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::warn;

use crate::renderer::device::{BlendFactor, Capability, Device, Uniform};
use crate::renderer::program::Program;
use crate::renderer::texture::TextureRef;

/// Texture unit the shadow map is always bound to.
pub const SHADOW_MAP_UNIT: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Absent,
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Texture(TextureRef),
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}
impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Int(value as i32)
    }
}
impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Float(value)
    }
}
impl From<Vec2> for PropertyValue {
    fn from(value: Vec2) -> Self {
        PropertyValue::Vec2(value)
    }
}
impl From<Vec3> for PropertyValue {
    fn from(value: Vec3) -> Self {
        PropertyValue::Vec3(value)
    }
}
impl From<Vec4> for PropertyValue {
    fn from(value: Vec4) -> Self {
        PropertyValue::Vec4(value)
    }
}
impl From<Mat4> for PropertyValue {
    fn from(value: Mat4) -> Self {
        PropertyValue::Mat4(value)
    }
}
impl From<TextureRef> for PropertyValue {
    fn from(value: TextureRef) -> Self {
        PropertyValue::Texture(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialKind {
    /// Flat color or diffuse/specular mapped surfaces.
    Basic,
    /// Alpha blended, double sided textured quads.
    Transparent,
    NormalMap,
    Skybox,
    /// Writes position, normal and albedo/specular into the G-buffer.
    GeometryBuffer,
    DeferredLighting { lights: usize },
    Ssao { samples: usize },
    Blur,
    ShadowLighting,
}

impl MaterialKind {
    /// The property names materials of this kind accept, in binding order.
    pub fn property_names(&self) -> Vec<String> {
        let names: &[&str] = match self {
            MaterialKind::Basic => &[
                "transform",
                "modelTransform",
                "color",
                "material.diffuse",
                "material.specular",
                "material.shininess",
            ],
            MaterialKind::Transparent | MaterialKind::Blur => {
                &["transform", "modelTransform", "tex"]
            }
            MaterialKind::NormalMap => &[
                "transform",
                "modelTransform",
                "viewPos",
                "lightPos",
                "diffuse",
                "normalMap",
            ],
            MaterialKind::Skybox => &["model", "view", "projection", "cameraPos", "skybox"],
            MaterialKind::GeometryBuffer => &[
                "transform",
                "modelTransform",
                "material.diffuse",
                "material.specular",
            ],
            MaterialKind::DeferredLighting { .. } => &[
                "transform",
                "modelTransform",
                "gPosition",
                "gNormal",
                "gAlbedoSpec",
                "ssao",
                "useSsao",
                "viewPos",
                "gamma",
                "lightCount",
            ],
            MaterialKind::Ssao { .. } => &[
                "transform",
                "modelTransform",
                "gPosition",
                "gNormal",
                "texNoise",
                "view",
                "projection",
                "noiseScale",
                "radius",
                "sampleCount",
            ],
            MaterialKind::ShadowLighting => &[
                "transform",
                "modelTransform",
                "viewPos",
                "lightTransform",
                "light.directional",
                "light.position",
                "light.direction",
                "light.cutoff",
                "light.attenuation",
                "light.ambient",
                "light.diffuse",
                "light.specular",
                "material.diffuse",
                "material.specular",
                "material.shininess",
                "gamma",
                "shadowMap",
            ],
        };
        let mut names = names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        match *self {
            MaterialKind::DeferredLighting { lights } => {
                for i in 0..lights {
                    names.push(format!("lights[{i}].position"));
                    names.push(format!("lights[{i}].color"));
                }
            }
            MaterialKind::Ssao { samples } => {
                names.extend((0..samples).map(|i| format!("samples[{i}]")));
            }
            _ => {}
        }
        names
    }

    fn pinned_units(&self) -> &'static [(&'static str, u32)] {
        match self {
            MaterialKind::ShadowLighting => &[("shadowMap", SHADOW_MAP_UNIT)],
            _ => &[],
        }
    }
}

pub struct Material {
    program: Program,
    kind: MaterialKind,
    properties: Vec<(String, PropertyValue)>,
    blending: bool,
}

impl Material {
    pub fn new(program: &Program, kind: MaterialKind) -> Material {
        let mut material = Material {
            program: program.clone(),
            kind,
            properties: Vec::new(),
            blending: true,
        };
        material.init_properties(kind.property_names());
        material
    }

    fn init_properties(&mut self, names: Vec<String>) {
        self.properties = names
            .into_iter()
            .map(|name| (name, PropertyValue::Absent))
            .collect();
    }

    /// Stores `value` under `name` if the material declares it. Returns
    /// whether the value was stored.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        match self.properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => {
                *slot = value.into();
                true
            }
            None => {
                warn!("material {:?} has no property {name:?}", self.kind);
                false
            }
        }
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Whether transparent materials blend with what's behind them.
    pub fn set_blending(&mut self, blending: bool) {
        self.blending = blending;
    }

    /// Uses the program and uploads every property that has a value.
    pub fn apply(&self, device: &mut dyn Device) {
        self.program.use_program(device);
        let pinned = self.kind.pinned_units();
        let mut next_unit = 0;
        for (name, value) in &self.properties {
            let uniform = match *value {
                PropertyValue::Absent => continue,
                PropertyValue::Int(v) => Uniform::Int(v),
                PropertyValue::Float(v) => Uniform::Float(v),
                PropertyValue::Vec2(v) => Uniform::Vec2(v),
                PropertyValue::Vec3(v) => Uniform::Vec3(v),
                PropertyValue::Vec4(v) => Uniform::Vec4(v),
                PropertyValue::Mat4(v) => Uniform::Mat4(v),
                PropertyValue::Texture(texture) => {
                    let unit = match pinned.iter().find(|(pinned_name, _)| pinned_name == name) {
                        Some(&(_, unit)) => unit,
                        None => {
                            while pinned.iter().any(|&(_, unit)| unit == next_unit) {
                                next_unit += 1;
                            }
                            let unit = next_unit;
                            next_unit += 1;
                            unit
                        }
                    };
                    self.apply_texture(device, name, texture, unit);
                    continue;
                }
            };
            self.program.set_uniform(device, name, uniform);
        }
    }

    fn apply_texture(&self, device: &mut dyn Device, name: &str, texture: TextureRef, unit: u32) {
        if self.kind == MaterialKind::Transparent {
            if self.blending {
                device.enable(Capability::Blend);
                device.set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
            } else {
                device.disable(Capability::Blend);
            }
            device.disable(Capability::CullFace);
        }
        device.bind_texture(unit, texture.kind, texture.id);
        self.program.set_uniform(device, name, unit as i32);
    }
}
