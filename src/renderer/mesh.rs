use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::renderer::buffer::{Buffer, VertexLayout};
use crate::renderer::device::{BufferTarget, Device, Primitive};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub tangent: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Vertex {
        Vertex {
            position,
            normal,
            tex_coord,
            tangent: Vec3::ZERO,
        }
    }
}

/// Attribute locations of [`Vertex`] fields, as `(location, components, offset)`.
pub const VERTEX_ATTRIBUTES: [(u32, i32, usize); 4] = [
    (0, 3, offset_of!(Vertex, position)),
    (1, 3, offset_of!(Vertex, normal)),
    (2, 2, offset_of!(Vertex, tex_coord)),
    (3, 3, offset_of!(Vertex, tangent)),
];

/// Indexed geometry on the GPU.
pub struct Mesh {
    primitive: Primitive,
    layout: VertexLayout,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

impl Mesh {
    /// Uploads the geometry. Triangle meshes get their tangents computed first.
    pub fn create(
        device: &mut dyn Device,
        mut vertices: Vec<Vertex>,
        indices: &[u32],
        primitive: Primitive,
    ) -> Mesh {
        if primitive == Primitive::Triangles {
            compute_tangents(&mut vertices, indices);
        }

        let layout = VertexLayout::new(device);
        let vertex_buffer = Buffer::with_data(device, BufferTarget::Vertex, &vertices);
        for (location, components, offset) in VERTEX_ATTRIBUTES {
            layout.set_attrib(device, location, components, size_of::<Vertex>(), offset);
        }
        let index_buffer = Buffer::with_data(device, BufferTarget::Index, indices);

        Mesh {
            primitive,
            layout,
            vertex_buffer,
            index_buffer,
        }
    }

    /// A unit cube centered on the origin, four vertices per face.
    pub fn create_box(device: &mut dyn Device) -> Mesh {
        let (vertices, indices) = box_geometry();
        Mesh::create(device, vertices, &indices, Primitive::Triangles)
    }

    /// A unit square on the XY plane facing +Z.
    pub fn create_plane(device: &mut dyn Device) -> Mesh {
        let vertices = vec![
            Vertex::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::Z, Vec2::new(0.0, 0.0)),
            Vertex::new(Vec3::new(0.5, -0.5, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
            Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
        ];
        Mesh::create(device, vertices, &[0, 1, 2, 2, 3, 0], Primitive::Triangles)
    }

    pub fn draw(&self, device: &mut dyn Device) {
        self.layout.bind(device);
        device.draw_elements(self.primitive, self.index_count());
    }

    /// Draws `instances` copies through `layout`, which must describe this
    /// mesh's buffers plus the per-instance stream.
    pub fn draw_instanced(&self, device: &mut dyn Device, layout: &VertexLayout, instances: u32) {
        layout.bind(device);
        device.draw_elements_instanced(self.primitive, self.index_count(), instances);
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_buffer.count() as u32
    }

    pub fn destroy(self, device: &mut dyn Device) {
        self.layout.destroy(device);
        self.vertex_buffer.destroy(device);
        self.index_buffer.destroy(device);
    }
}

/// Fills in per-vertex tangents from the UV layout of each triangle. A
/// triangle's tangent is accumulated into all three of its vertices and the
/// sums are normalized, so shared vertices get the average direction.
/// Triangles whose UVs span no area contribute nothing.
pub fn compute_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vec3::ZERO; vertices.len()];
    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if i0.max(i1).max(i2) >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let edge1 = v1.position - v0.position;
        let edge2 = v2.position - v0.position;
        let uv1 = v1.tex_coord - v0.tex_coord;
        let uv2 = v2.tex_coord - v0.tex_coord;

        let det = uv1.x * uv2.y - uv2.x * uv1.y;
        if det == 0.0 {
            continue;
        }
        let tangent = (edge1 * uv2.y - edge2 * uv1.y) / det;
        for i in [i0, i1, i2] {
            tangents[i] += tangent;
        }
    }
    for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
        vertex.tangent = tangent.normalize_or_zero();
    }
}

fn box_geometry() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, u axis, v axis) for each face, u x v = normal.
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];
    let corners = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for uv in corners {
            let position = normal * 0.5 + u * (uv.x - 0.5) + v * (uv.y - 0.5);
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}
