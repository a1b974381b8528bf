//! OpenGL scene renderer: deferred shading with SSAO for the model, forward
//! passes with shadow mapping, transparency, instancing, normal mapping and
//! stencil outlines for the rest.

pub mod arena;
pub mod buffer;
pub mod camera;
pub mod context;
pub mod device;
pub mod error;
pub mod framebuffer;
mod gl;
pub mod gl_device;
pub mod gltf;
pub mod light;
pub mod material;
pub mod mesh;
pub mod model;
pub mod object;
pub mod program;
#[cfg(test)]
mod recording;
pub mod screen;
pub mod ssao;
pub mod stencil;
pub mod texture;
pub mod transform;

pub use context::{CameraKey, Context, MouseButton};
pub use gl_device::GlDevice;
