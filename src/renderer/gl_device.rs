use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;

use crate::renderer::device::{
    BlendFactor, BufferId, BufferTarget, Capability, Clear, Comparison, DepthAttachment, Device,
    FaceData, Filter, FixedState, FramebufferId, PixelFormat, Primitive, ProgramId, RenderTarget,
    StencilAction, StencilFunc, StencilOps, TextureDesc, TextureId, TextureKind, Uniform,
    VertexArrayId, VertexAttrib, Wrap,
};
use crate::renderer::error::RenderError;
use crate::renderer::gl;

/// [`Device`] backed by the current OpenGL context.
pub struct GlDevice {
    state: FixedState,
    /// Depth-stencil renderbuffers owned by framebuffers.
    renderbuffers: HashMap<FramebufferId, gl::types::GLuint>,
}

impl GlDevice {
    /// Loads the GL function pointers. Requires a current GL context.
    pub fn load<F>(loader: F) -> GlDevice
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        // Decoded RGB images are tightly packed.
        gl::call!(gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1));
        GlDevice {
            state: FixedState::default(),
            renderbuffers: HashMap::new(),
        }
    }
}

fn buffer_target(target: BufferTarget) -> gl::types::GLenum {
    match target {
        BufferTarget::Vertex => gl::ARRAY_BUFFER,
        BufferTarget::Index => gl::ELEMENT_ARRAY_BUFFER,
    }
}

fn primitive_mode(primitive: Primitive) -> gl::types::GLenum {
    match primitive {
        Primitive::Triangles => gl::TRIANGLES,
    }
}

/// (internal format, pixel format, component type)
fn pixel_format(format: PixelFormat) -> (gl::types::GLenum, gl::types::GLenum, gl::types::GLenum) {
    match format {
        PixelFormat::R8 => (gl::RED, gl::RED, gl::UNSIGNED_BYTE),
        PixelFormat::Rg8 => (gl::RG, gl::RG, gl::UNSIGNED_BYTE),
        PixelFormat::Rgb8 => (gl::RGB, gl::RGB, gl::UNSIGNED_BYTE),
        PixelFormat::Rgba8 => (gl::RGBA, gl::RGBA, gl::UNSIGNED_BYTE),
        PixelFormat::R16F => (gl::R16F, gl::RED, gl::FLOAT),
        PixelFormat::Rgb16F => (gl::RGB16F, gl::RGB, gl::FLOAT),
        PixelFormat::Rgba16F => (gl::RGBA16F, gl::RGBA, gl::FLOAT),
        PixelFormat::Depth => (gl::DEPTH_COMPONENT, gl::DEPTH_COMPONENT, gl::FLOAT),
    }
}

fn filter(filter: Filter) -> gl::types::GLint {
    (match filter {
        Filter::Nearest => gl::NEAREST,
        Filter::Linear => gl::LINEAR,
        Filter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
    }) as gl::types::GLint
}

fn wrap(wrap: Wrap) -> gl::types::GLint {
    (match wrap {
        Wrap::Repeat => gl::REPEAT,
        Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
        Wrap::ClampToBorder => gl::CLAMP_TO_BORDER,
    }) as gl::types::GLint
}

fn comparison(comparison: Comparison) -> gl::types::GLenum {
    match comparison {
        Comparison::Always => gl::ALWAYS,
        Comparison::Less => gl::LESS,
        Comparison::LessEqual => gl::LEQUAL,
        Comparison::NotEqual => gl::NOTEQUAL,
    }
}

fn stencil_action(action: StencilAction) -> gl::types::GLenum {
    match action {
        StencilAction::Keep => gl::KEEP,
        StencilAction::Replace => gl::REPLACE,
    }
}

fn blend_factor(factor: BlendFactor) -> gl::types::GLenum {
    match factor {
        BlendFactor::Zero => gl::ZERO,
        BlendFactor::One => gl::ONE,
        BlendFactor::SrcAlpha => gl::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
    }
}

fn framebuffer_name(target: RenderTarget) -> gl::types::GLuint {
    match target {
        RenderTarget::Screen => 0,
        RenderTarget::Offscreen(FramebufferId(id)) => id,
    }
}

impl Device for GlDevice {
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let mut buffer = 0;
        gl::call!(gl::GenBuffers(1, &mut buffer));
        gl::call!(gl::BindBuffer(buffer_target(target), buffer));
        gl::call!(gl::BufferData(
            buffer_target(target),
            data.len() as isize,
            data.as_ptr() as *const c_void,
            gl::STATIC_DRAW,
        ));
        BufferId(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        gl::call!(gl::DeleteBuffers(1, &buffer.0));
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        gl::call!(gl::BindBuffer(buffer_target(target), buffer.0));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let mut vao = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        VertexArrayId(vao)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        gl::call!(gl::DeleteVertexArrays(1, &vertex_array.0));
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        gl::call!(gl::BindVertexArray(vertex_array.0));
    }

    fn vertex_attrib(&mut self, attrib: &VertexAttrib) {
        gl::call!(gl::EnableVertexAttribArray(attrib.index));
        gl::call!(gl::VertexAttribPointer(
            attrib.index,
            attrib.components,
            gl::FLOAT,
            gl::FALSE,
            attrib.stride as gl::types::GLsizei,
            attrib.offset as *const c_void,
        ));
        gl::call!(gl::VertexAttribDivisor(attrib.index, attrib.divisor));
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> TextureId {
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
        let (internal_format, format, type_) = pixel_format(desc.format);
        let pixels = pixels.map_or(ptr::null(), |pixels| pixels.as_ptr() as *const c_void);
        gl::call!(gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            internal_format as gl::types::GLint,
            desc.width as gl::types::GLsizei,
            desc.height as gl::types::GLsizei,
            0,
            format,
            type_,
            pixels,
        ));
        let sampler = desc.sampler;
        let parameters = [
            (gl::TEXTURE_MIN_FILTER, filter(sampler.min_filter)),
            (gl::TEXTURE_MAG_FILTER, filter(sampler.mag_filter)),
            (gl::TEXTURE_WRAP_S, wrap(sampler.wrap)),
            (gl::TEXTURE_WRAP_T, wrap(sampler.wrap)),
        ];
        for (name, value) in parameters {
            gl::call!(gl::TexParameteri(gl::TEXTURE_2D, name, value));
        }
        if let Some(border) = sampler.border_color {
            let border = border.to_array();
            let name = gl::TEXTURE_BORDER_COLOR;
            gl::call!(gl::TexParameterfv(gl::TEXTURE_2D, name, border.as_ptr()));
        }
        if sampler.uses_mipmaps() {
            gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
        }
        TextureId(texture)
    }

    fn create_cube_texture(&mut self, faces: &[FaceData<'_>; 6]) -> TextureId {
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        gl::call!(gl::BindTexture(gl::TEXTURE_CUBE_MAP, texture));
        for (i, face) in faces.iter().enumerate() {
            let (internal_format, format, type_) = pixel_format(face.format);
            gl::call!(gl::TexImage2D(
                gl::TEXTURE_CUBE_MAP_POSITIVE_X + i as gl::types::GLenum,
                0,
                internal_format as gl::types::GLint,
                face.width as gl::types::GLsizei,
                face.height as gl::types::GLsizei,
                0,
                format,
                type_,
                face.pixels.as_ptr() as *const c_void,
            ));
        }
        let linear = gl::LINEAR as gl::types::GLint;
        let clamp = gl::CLAMP_TO_EDGE as gl::types::GLint;
        gl::call!(gl::TexParameteri(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_MIN_FILTER, linear));
        gl::call!(gl::TexParameteri(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_MAG_FILTER, linear));
        gl::call!(gl::TexParameteri(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_WRAP_S, clamp));
        gl::call!(gl::TexParameteri(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_WRAP_T, clamp));
        gl::call!(gl::TexParameteri(gl::TEXTURE_CUBE_MAP, gl::TEXTURE_WRAP_R, clamp));
        TextureId(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        gl::call!(gl::DeleteTextures(1, &texture.0));
    }

    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: TextureId) {
        let target = match kind {
            TextureKind::Flat => gl::TEXTURE_2D,
            TextureKind::Cube => gl::TEXTURE_CUBE_MAP,
        };
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
        gl::call!(gl::BindTexture(target, texture.0));
    }

    fn create_framebuffer(
        &mut self,
        colors: &[TextureId],
        depth: DepthAttachment,
    ) -> Result<FramebufferId, RenderError> {
        let mut framebuffer = 0;
        gl::call!(gl::GenFramebuffers(1, &mut framebuffer));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer));
        for (i, texture) in colors.iter().enumerate() {
            gl::call!(gl::FramebufferTexture2D(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0 + i as gl::types::GLenum,
                gl::TEXTURE_2D,
                texture.0,
                0,
            ));
        }
        if colors.is_empty() {
            gl::call!(gl::DrawBuffer(gl::NONE));
            gl::call!(gl::ReadBuffer(gl::NONE));
        } else {
            let attachments = (0..colors.len())
                .map(|i| gl::COLOR_ATTACHMENT0 + i as gl::types::GLenum)
                .collect::<Vec<_>>();
            gl::call!(gl::DrawBuffers(attachments.len() as i32, attachments.as_ptr()));
        }

        let id = FramebufferId(framebuffer);
        match depth {
            DepthAttachment::Renderbuffer { width, height } => {
                let mut renderbuffer = 0;
                gl::call!(gl::GenRenderbuffers(1, &mut renderbuffer));
                gl::call!(gl::BindRenderbuffer(gl::RENDERBUFFER, renderbuffer));
                gl::call!(gl::RenderbufferStorage(
                    gl::RENDERBUFFER,
                    gl::DEPTH24_STENCIL8,
                    width as gl::types::GLsizei,
                    height as gl::types::GLsizei,
                ));
                gl::call!(gl::BindRenderbuffer(gl::RENDERBUFFER, 0));
                gl::call!(gl::FramebufferRenderbuffer(
                    gl::FRAMEBUFFER,
                    gl::DEPTH_STENCIL_ATTACHMENT,
                    gl::RENDERBUFFER,
                    renderbuffer,
                ));
                self.renderbuffers.insert(id, renderbuffer);
            }
            DepthAttachment::Texture(texture) => {
                gl::call!(gl::FramebufferTexture2D(
                    gl::FRAMEBUFFER,
                    gl::DEPTH_ATTACHMENT,
                    gl::TEXTURE_2D,
                    texture.0,
                    0,
                ));
            }
        }

        let status = gl::call!(gl::CheckFramebufferStatus(gl::FRAMEBUFFER));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, 0));
        if status != gl::FRAMEBUFFER_COMPLETE {
            self.delete_framebuffer(id);
            return Err(RenderError::IncompleteFramebuffer(status));
        }
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(renderbuffer) = self.renderbuffers.remove(&framebuffer) {
            gl::call!(gl::DeleteRenderbuffers(1, &renderbuffer));
        }
        gl::call!(gl::DeleteFramebuffers(1, &framebuffer.0));
    }

    fn bind_render_target(&mut self, target: RenderTarget) {
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer_name(target)));
    }

    fn blit_depth(&mut self, from: RenderTarget, to: RenderTarget, width: u32, height: u32) {
        let (width, height) = (width as i32, height as i32);
        gl::call!(gl::BindFramebuffer(gl::READ_FRAMEBUFFER, framebuffer_name(from)));
        gl::call!(gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, framebuffer_name(to)));
        gl::call!(gl::BlitFramebuffer(
            0,
            0,
            width,
            height,
            0,
            0,
            width,
            height,
            gl::DEPTH_BUFFER_BIT,
            gl::NEAREST,
        ));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer_name(to)));
    }

    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, RenderError> {
        let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, vertex)
            .map_err(|log| RenderError::ShaderCompile { stage: "vertex", log })?;
        let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, fragment) {
            Ok(shader) => shader,
            Err(log) => {
                gl::call!(gl::DeleteShader(vertex_shader));
                return Err(RenderError::ShaderCompile { stage: "fragment", log });
            }
        };
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        program.map(ProgramId).map_err(RenderError::ProgramLink)
    }

    fn delete_program(&mut self, program: ProgramId) {
        gl::call!(gl::DeleteProgram(program.0));
    }

    fn use_program(&mut self, program: ProgramId) {
        gl::call!(gl::UseProgram(program.0));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: Uniform) {
        let Some(location) = gl::get_uniform_location(program.0, name) else {
            return;
        };
        match value {
            Uniform::Int(value) => gl::call!(gl::Uniform1i(location, value)),
            Uniform::Float(value) => gl::call!(gl::Uniform1f(location, value)),
            Uniform::Vec2(value) => gl::call!(gl::Uniform2f(location, value.x, value.y)),
            Uniform::Vec3(value) => gl::call!(gl::Uniform3f(location, value.x, value.y, value.z)),
            Uniform::Vec4(value) => {
                gl::call!(gl::Uniform4f(location, value.x, value.y, value.z, value.w))
            }
            Uniform::Mat4(value) => gl::call!(gl::UniformMatrix4fv(
                location,
                1,
                gl::FALSE,
                value.to_cols_array().as_ptr(),
            )),
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        gl::call!(gl::Viewport(x, y, width as i32, height as i32));
    }

    fn clear(&mut self, clear: Clear) {
        let mut mask = 0;
        if let Some(color) = clear.color {
            gl::call!(gl::ClearColor(color.x, color.y, color.z, color.w));
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if clear.depth {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if clear.stencil {
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        gl::call!(gl::Clear(mask));
    }

    fn draw_elements(&mut self, primitive: Primitive, index_count: u32) {
        gl::call!(gl::DrawElements(
            primitive_mode(primitive),
            index_count as i32,
            gl::UNSIGNED_INT,
            ptr::null(),
        ));
    }

    fn draw_elements_instanced(&mut self, primitive: Primitive, index_count: u32, instances: u32) {
        gl::call!(gl::DrawElementsInstanced(
            primitive_mode(primitive),
            index_count as i32,
            gl::UNSIGNED_INT,
            ptr::null(),
            instances as i32,
        ));
    }

    fn fixed_state(&self) -> &FixedState {
        &self.state
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        let (cap, slot) = match capability {
            Capability::DepthTest => (gl::DEPTH_TEST, &mut self.state.depth_test),
            Capability::StencilTest => (gl::STENCIL_TEST, &mut self.state.stencil_test),
            Capability::Blend => (gl::BLEND, &mut self.state.blend),
            Capability::CullFace => (gl::CULL_FACE, &mut self.state.cull_face),
        };
        *slot = enabled;
        if enabled {
            gl::call!(gl::Enable(cap));
        } else {
            gl::call!(gl::Disable(cap));
        }
    }

    fn set_depth_func(&mut self, func: Comparison) {
        self.state.depth_func = func;
        gl::call!(gl::DepthFunc(comparison(func)));
    }

    fn set_stencil_func(&mut self, func: StencilFunc) {
        self.state.stencil_func = func;
        gl::call!(gl::StencilFunc(comparison(func.compare), func.reference, func.mask));
    }

    fn set_stencil_ops(&mut self, ops: StencilOps) {
        self.state.stencil_ops = ops;
        gl::call!(gl::StencilOp(
            stencil_action(ops.stencil_fail),
            stencil_action(ops.depth_fail),
            stencil_action(ops.pass),
        ));
    }

    fn set_stencil_write_mask(&mut self, mask: u32) {
        self.state.stencil_write_mask = mask;
        gl::call!(gl::StencilMask(mask));
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.state.blend_func = (src, dst);
        gl::call!(gl::BlendFunc(blend_factor(src), blend_factor(dst)));
    }
}
