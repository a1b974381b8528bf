//! A [`Device`] that records what it's asked to do, for tests.

use crate::renderer::device::{
    BlendFactor, BufferId, BufferTarget, Capability, Clear, Comparison, DepthAttachment, Device,
    FaceData, FixedState, FramebufferId, Primitive, ProgramId, RenderTarget, StencilFunc,
    StencilOps, TextureDesc, TextureId, TextureKind, Uniform, VertexArrayId, VertexAttrib,
};
use crate::renderer::error::RenderError;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BindBuffer(BufferTarget, BufferId),
    BindVertexArray(VertexArrayId),
    VertexAttrib(VertexAttrib),
    BindTexture {
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    },
    BindTarget(RenderTarget),
    BlitDepth {
        from: RenderTarget,
        to: RenderTarget,
    },
    UseProgram(ProgramId),
    Uniform {
        program: ProgramId,
        name: String,
        value: Uniform,
    },
    Viewport(i32, i32, u32, u32),
    Clear(Clear),
    Draw(DrawRecord),
    Capability(Capability, bool),
    DepthFunc(Comparison),
    StencilFunc(StencilFunc),
    StencilOps(StencilOps),
    StencilWriteMask(u32),
    BlendFunc(BlendFactor, BlendFactor),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub program: Option<ProgramId>,
    pub target: RenderTarget,
    pub vertex_array: Option<VertexArrayId>,
    pub primitive: Primitive,
    pub index_count: u32,
    pub instances: Option<u32>,
    pub state: FixedState,
}

pub struct RecordingDevice {
    pub commands: Vec<Command>,
    pub buffers: Vec<(BufferId, BufferTarget, Vec<u8>)>,
    next_id: u32,
    state: FixedState,
    program: Option<ProgramId>,
    target: RenderTarget,
    vertex_array: Option<VertexArrayId>,
    live_textures: usize,
    live_framebuffers: usize,
    /// Framebuffer creation fails while this many are alive.
    pub framebuffer_limit: Option<usize>,
}

impl RecordingDevice {
    pub fn new() -> RecordingDevice {
        RecordingDevice {
            commands: Vec::new(),
            buffers: Vec::new(),
            next_id: 1,
            state: FixedState::default(),
            program: None,
            target: RenderTarget::Screen,
            vertex_array: None,
            live_textures: 0,
            live_framebuffers: 0,
            framebuffer_limit: None,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    /// The last value set for the named uniform, on any program.
    pub fn last_uniform(&self, name: &str) -> Option<Uniform> {
        self.commands.iter().rev().find_map(|command| match command {
            Command::Uniform { name: n, value, .. } if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            Command::Uniform { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn bound_targets(&self) -> Vec<RenderTarget> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BindTarget(target) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    pub fn live_framebuffers(&self) -> usize {
        self.live_framebuffers
    }
}

impl Device for RecordingDevice {
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let id = BufferId(self.next_id());
        self.buffers.push((id, target, data.to_vec()));
        id
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.retain(|(id, _, _)| *id != buffer);
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.commands.push(Command::BindBuffer(target, buffer));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        VertexArrayId(self.next_id())
    }

    fn delete_vertex_array(&mut self, _vertex_array: VertexArrayId) {}

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_array = Some(vertex_array);
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn vertex_attrib(&mut self, attrib: &VertexAttrib) {
        self.commands.push(Command::VertexAttrib(*attrib));
    }

    fn create_texture(&mut self, _desc: &TextureDesc, _pixels: Option<&[u8]>) -> TextureId {
        self.live_textures += 1;
        TextureId(self.next_id())
    }

    fn create_cube_texture(&mut self, _faces: &[FaceData<'_>; 6]) -> TextureId {
        self.live_textures += 1;
        TextureId(self.next_id())
    }

    fn delete_texture(&mut self, _texture: TextureId) {
        self.live_textures -= 1;
    }

    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: TextureId) {
        self.commands.push(Command::BindTexture { unit, kind, texture });
    }

    fn create_framebuffer(
        &mut self,
        _colors: &[TextureId],
        _depth: DepthAttachment,
    ) -> Result<FramebufferId, RenderError> {
        if self.framebuffer_limit == Some(self.live_framebuffers) {
            return Err(RenderError::IncompleteFramebuffer(0x8CD6));
        }
        self.live_framebuffers += 1;
        Ok(FramebufferId(self.next_id()))
    }

    fn delete_framebuffer(&mut self, _framebuffer: FramebufferId) {
        self.live_framebuffers -= 1;
    }

    fn bind_render_target(&mut self, target: RenderTarget) {
        self.target = target;
        self.commands.push(Command::BindTarget(target));
    }

    fn blit_depth(&mut self, from: RenderTarget, to: RenderTarget, _width: u32, _height: u32) {
        self.target = to;
        self.commands.push(Command::BlitDepth { from, to });
    }

    fn create_program(&mut self, _vertex: &str, _fragment: &str) -> Result<ProgramId, RenderError> {
        Ok(ProgramId(self.next_id()))
    }

    fn delete_program(&mut self, _program: ProgramId) {}

    fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: Uniform) {
        self.commands.push(Command::Uniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.commands.push(Command::Viewport(x, y, width, height));
    }

    fn clear(&mut self, clear: Clear) {
        self.commands.push(Command::Clear(clear));
    }

    fn draw_elements(&mut self, primitive: Primitive, index_count: u32) {
        self.commands.push(Command::Draw(DrawRecord {
            program: self.program,
            target: self.target,
            vertex_array: self.vertex_array,
            primitive,
            index_count,
            instances: None,
            state: self.state,
        }));
    }

    fn draw_elements_instanced(&mut self, primitive: Primitive, index_count: u32, instances: u32) {
        self.commands.push(Command::Draw(DrawRecord {
            program: self.program,
            target: self.target,
            vertex_array: self.vertex_array,
            primitive,
            index_count,
            instances: Some(instances),
            state: self.state,
        }));
    }

    fn fixed_state(&self) -> &FixedState {
        &self.state
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::DepthTest => self.state.depth_test = enabled,
            Capability::StencilTest => self.state.stencil_test = enabled,
            Capability::Blend => self.state.blend = enabled,
            Capability::CullFace => self.state.cull_face = enabled,
        }
        self.commands.push(Command::Capability(capability, enabled));
    }

    fn set_depth_func(&mut self, func: Comparison) {
        self.state.depth_func = func;
        self.commands.push(Command::DepthFunc(func));
    }

    fn set_stencil_func(&mut self, func: StencilFunc) {
        self.state.stencil_func = func;
        self.commands.push(Command::StencilFunc(func));
    }

    fn set_stencil_ops(&mut self, ops: StencilOps) {
        self.state.stencil_ops = ops;
        self.commands.push(Command::StencilOps(ops));
    }

    fn set_stencil_write_mask(&mut self, mask: u32) {
        self.state.stencil_write_mask = mask;
        self.commands.push(Command::StencilWriteMask(mask));
    }

    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.state.blend_func = (src, dst);
        self.commands.push(Command::BlendFunc(src, dst));
    }
}
