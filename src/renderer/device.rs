//! The command surface the renderer draws through.
//!
//! Everything above this module talks to the GPU via [`Device`], which mirrors
//! the handful of OpenGL entry points the scene needs and keeps track of the
//! fixed-function state (depth, stencil, blending, culling). Passes declare the
//! state they need with [`Device::apply_state`] instead of relying on whatever
//! the previous pass left behind.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::renderer::error::RenderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Flat,
    Cube,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    R16F,
    Rgb16F,
    Rgba16F,
    Depth,
}

impl PixelFormat {
    /// The upload format for decoded images with the given channel count.
    pub fn from_channel_count(channel_count: u8) -> PixelFormat {
        match channel_count {
            1 => PixelFormat::R8,
            2 => PixelFormat::Rg8,
            3 => PixelFormat::Rgb8,
            _ => PixelFormat::Rgba8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampler {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap: Wrap,
    pub border_color: Option<Vec4>,
}

impl Sampler {
    pub const IMAGE: Sampler = Sampler {
        min_filter: Filter::LinearMipmapLinear,
        mag_filter: Filter::Linear,
        wrap: Wrap::ClampToEdge,
        border_color: None,
    };
    pub const TARGET: Sampler = Sampler {
        min_filter: Filter::Nearest,
        mag_filter: Filter::Nearest,
        wrap: Wrap::ClampToEdge,
        border_color: None,
    };

    pub fn with_wrap(self, wrap: Wrap) -> Sampler {
        Sampler { wrap, ..self }
    }

    pub fn uses_mipmaps(&self) -> bool {
        self.min_filter == Filter::LinearMipmapLinear
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sampler: Sampler,
}

/// Pixel data of a single cube map face.
#[derive(Clone, Copy, Debug)]
pub struct FaceData<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthAttachment {
    /// A combined 24-bit depth and 8-bit stencil renderbuffer.
    Renderbuffer { width: u32, height: u32 },
    Texture(TextureId),
}

/// Where draws land. `Screen` is the window's default framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    Screen,
    Offscreen(FramebufferId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Clear {
    pub color: Option<Vec4>,
    pub depth: bool,
    pub stencil: bool,
}

impl Clear {
    pub fn all(color: Vec4) -> Clear {
        Clear {
            color: Some(color),
            depth: true,
            stencil: true,
        }
    }

    pub fn color_only(color: Vec4) -> Clear {
        Clear {
            color: Some(color),
            depth: false,
            stencil: false,
        }
    }

    pub fn depth_only() -> Clear {
        Clear {
            color: None,
            depth: true,
            stencil: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexAttrib {
    pub index: u32,
    pub components: i32,
    pub stride: usize,
    pub offset: usize,
    /// Advance the attribute once every `divisor` instances, 0 for per-vertex.
    pub divisor: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<i32> for Uniform {
    fn from(value: i32) -> Self {
        Uniform::Int(value)
    }
}
impl From<f32> for Uniform {
    fn from(value: f32) -> Self {
        Uniform::Float(value)
    }
}
impl From<Vec2> for Uniform {
    fn from(value: Vec2) -> Self {
        Uniform::Vec2(value)
    }
}
impl From<Vec3> for Uniform {
    fn from(value: Vec3) -> Self {
        Uniform::Vec3(value)
    }
}
impl From<Vec4> for Uniform {
    fn from(value: Vec4) -> Self {
        Uniform::Vec4(value)
    }
}
impl From<Mat4> for Uniform {
    fn from(value: Mat4) -> Self {
        Uniform::Mat4(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    DepthTest,
    StencilTest,
    Blend,
    CullFace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Always,
    Less,
    LessEqual,
    NotEqual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilAction {
    Keep,
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilFunc {
    pub compare: Comparison,
    pub reference: i32,
    pub mask: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilOps {
    pub stencil_fail: StencilAction,
    pub depth_fail: StencilAction,
    pub pass: StencilAction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// The fixed-function toggles a pass can depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedState {
    pub depth_test: bool,
    pub depth_func: Comparison,
    pub stencil_test: bool,
    pub stencil_func: StencilFunc,
    pub stencil_ops: StencilOps,
    pub stencil_write_mask: u32,
    pub blend: bool,
    pub blend_func: (BlendFactor, BlendFactor),
    pub cull_face: bool,
}

impl Default for FixedState {
    /// The state of a freshly created GL context.
    fn default() -> Self {
        FixedState {
            depth_test: false,
            depth_func: Comparison::Less,
            stencil_test: false,
            stencil_func: StencilFunc {
                compare: Comparison::Always,
                reference: 0,
                mask: !0,
            },
            stencil_ops: StencilOps {
                stencil_fail: StencilAction::Keep,
                depth_fail: StencilAction::Keep,
                pass: StencilAction::Keep,
            },
            stencil_write_mask: !0,
            blend: false,
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            cull_face: false,
        }
    }
}

impl FixedState {
    /// Depth tested opaque drawing, no blending, stencil and culling off.
    pub fn opaque() -> FixedState {
        FixedState {
            depth_test: true,
            stencil_func: StencilFunc {
                compare: Comparison::Always,
                reference: 1,
                mask: 0xFF,
            },
            stencil_write_mask: 0xFF,
            ..FixedState::default()
        }
    }

    /// Full-screen passes: no depth test, no blending.
    pub fn screen_pass() -> FixedState {
        FixedState {
            depth_test: false,
            ..FixedState::opaque()
        }
    }
}

pub trait Device {
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId;
    fn delete_buffer(&mut self, buffer: BufferId);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);

    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);
    /// Describes an attribute of the currently bound vertex buffer on the
    /// currently bound vertex array.
    fn vertex_attrib(&mut self, attrib: &VertexAttrib);

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> TextureId;
    fn create_cube_texture(&mut self, faces: &[FaceData<'_>; 6]) -> TextureId;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: TextureId);

    fn create_framebuffer(
        &mut self,
        colors: &[TextureId],
        depth: DepthAttachment,
    ) -> Result<FramebufferId, RenderError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_render_target(&mut self, target: RenderTarget);
    /// Copies the depth buffer of `from` into `to` and leaves `to` bound.
    fn blit_depth(&mut self, from: RenderTarget, to: RenderTarget, width: u32, height: u32);

    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, RenderError>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    /// Sets a uniform of the program in use. Unknown names are ignored.
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: Uniform);

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear(&mut self, clear: Clear);
    fn draw_elements(&mut self, primitive: Primitive, index_count: u32);
    fn draw_elements_instanced(&mut self, primitive: Primitive, index_count: u32, instances: u32);

    fn fixed_state(&self) -> &FixedState;
    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn set_depth_func(&mut self, func: Comparison);
    fn set_stencil_func(&mut self, func: StencilFunc);
    fn set_stencil_ops(&mut self, ops: StencilOps);
    fn set_stencil_write_mask(&mut self, mask: u32);
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    fn enable(&mut self, capability: Capability) {
        self.set_capability(capability, true);
    }

    fn disable(&mut self, capability: Capability) {
        self.set_capability(capability, false);
    }

    /// Brings the fixed-function state to `state`, touching only what differs.
    fn apply_state(&mut self, state: &FixedState) {
        let current = *self.fixed_state();
        if current.depth_test != state.depth_test {
            self.set_capability(Capability::DepthTest, state.depth_test);
        }
        if current.depth_func != state.depth_func {
            self.set_depth_func(state.depth_func);
        }
        if current.stencil_test != state.stencil_test {
            self.set_capability(Capability::StencilTest, state.stencil_test);
        }
        if current.stencil_func != state.stencil_func {
            self.set_stencil_func(state.stencil_func);
        }
        if current.stencil_ops != state.stencil_ops {
            self.set_stencil_ops(state.stencil_ops);
        }
        if current.stencil_write_mask != state.stencil_write_mask {
            self.set_stencil_write_mask(state.stencil_write_mask);
        }
        if current.blend != state.blend {
            self.set_capability(Capability::Blend, state.blend);
        }
        if current.blend_func != state.blend_func {
            self.set_blend_func(state.blend_func.0, state.blend_func.1);
        }
        if current.cull_face != state.cull_face {
            self.set_capability(Capability::CullFace, state.cull_face);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::recording::{Command, RecordingDevice};

    #[test]
    fn channel_counts_map_to_upload_formats() {
        assert_eq!(PixelFormat::from_channel_count(1), PixelFormat::R8);
        assert_eq!(PixelFormat::from_channel_count(2), PixelFormat::Rg8);
        assert_eq!(PixelFormat::from_channel_count(3), PixelFormat::Rgb8);
        assert_eq!(PixelFormat::from_channel_count(4), PixelFormat::Rgba8);
        assert_eq!(PixelFormat::from_channel_count(0), PixelFormat::Rgba8);
    }

    #[test]
    fn apply_state_only_touches_differences() {
        let mut device = RecordingDevice::new();
        device.apply_state(&FixedState::opaque());
        let first = device.commands.len();
        assert!(first > 0);
        device.apply_state(&FixedState::opaque());
        assert_eq!(device.commands.len(), first);
        assert_eq!(*device.fixed_state(), FixedState::opaque());
    }

    #[test]
    fn apply_state_reaches_requested_state_from_anywhere() {
        let mut device = RecordingDevice::new();
        device.enable(Capability::StencilTest);
        device.set_stencil_write_mask(0);
        device.set_depth_func(Comparison::LessEqual);
        let blended = FixedState {
            blend: true,
            blend_func: (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            ..FixedState::opaque()
        };
        device.apply_state(&blended);
        assert_eq!(*device.fixed_state(), blended);
        assert!(device
            .commands
            .contains(&Command::Capability(Capability::StencilTest, false)));
    }
}
