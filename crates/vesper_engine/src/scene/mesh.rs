//! CPU-side geometry handed to the model loader

use bytemuck::{Pod, Zeroable};

/// Vertex layout uploaded to GPU vertex buffers
///
/// `#[repr(C)]` keeps the layout identical to the shader's vertex input.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexData {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
}

impl VertexData {
    /// Create from vertices and indices
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad() -> Self {
        let normal = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 1.0]),
                Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 1.0]),
                Vertex::new([0.5, 0.5, 0.0], normal, [1.0, 0.0]),
                Vertex::new([-0.5, 0.5, 0.0], normal, [0.0, 0.0]),
            ],
            vec![0, 1, 2, 2, 3, 0],
        )
    }

    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex bytes as uploaded to the GPU
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes as uploaded to the GPU
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_is_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_quad_bytes() {
        let quad = VertexData::quad();
        assert!(!quad.is_empty());
        assert_eq!(quad.vertex_bytes().len(), 4 * 32);
        assert_eq!(quad.index_bytes().len(), 6 * 4);
    }
}
