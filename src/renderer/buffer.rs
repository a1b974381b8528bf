use bytemuck::Pod;

use crate::renderer::device::{BufferId, BufferTarget, Device, VertexArrayId, VertexAttrib};

/// An immutable GPU buffer of `count` elements.
pub struct Buffer {
    id: BufferId,
    target: BufferTarget,
    count: usize,
}

impl Buffer {
    pub fn with_data<T: Pod>(device: &mut dyn Device, target: BufferTarget, data: &[T]) -> Buffer {
        let id = device.create_buffer(target, bytemuck::cast_slice(data));
        Buffer {
            id,
            target,
            count: data.len(),
        }
    }

    pub fn bind(&self, device: &mut dyn Device) {
        device.bind_buffer(self.target, self.id);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_buffer(self.id);
    }
}

/// A vertex array object: which buffers feed which attribute locations.
pub struct VertexLayout {
    id: VertexArrayId,
}

impl VertexLayout {
    pub fn new(device: &mut dyn Device) -> VertexLayout {
        let id = device.create_vertex_array();
        device.bind_vertex_array(id);
        VertexLayout { id }
    }

    pub fn bind(&self, device: &mut dyn Device) {
        device.bind_vertex_array(self.id);
    }

    /// Describes a float attribute read from the currently bound vertex buffer.
    /// The layout must be bound.
    pub fn set_attrib(
        &self,
        device: &mut dyn Device,
        index: u32,
        components: i32,
        stride: usize,
        offset: usize,
    ) {
        self.set_instanced_attrib(device, index, components, stride, offset, 0);
    }

    /// Like [`VertexLayout::set_attrib`], but the attribute advances once every
    /// `divisor` instances instead of once per vertex.
    pub fn set_instanced_attrib(
        &self,
        device: &mut dyn Device,
        index: u32,
        components: i32,
        stride: usize,
        offset: usize,
        divisor: u32,
    ) {
        device.vertex_attrib(&VertexAttrib {
            index,
            components,
            stride,
            offset,
            divisor,
        });
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_vertex_array(self.id);
    }
}
