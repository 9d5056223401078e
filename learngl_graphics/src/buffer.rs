//! Vertex arrays and the buffers that feed them.

use gl::types::*;

use crate::api::{BufferTarget, GlApi};

/// A vertex array object (VAO), which remembers the buffer bindings and attribute layout set up
/// while it was bound. Deleted on drop.
pub struct VertexArray<G: GlApi> {
    gl: G,
    id: GLuint,
}

impl<G: GlApi> VertexArray<G> {
    pub fn new(gl: G) -> Self {
        let id = gl.gen_vertex_array();
        Self { gl, id }
    }

    pub fn id(&self) -> GLuint { self.id }

    pub fn bind(&self) {
        self.gl.bind_vertex_array(self.id);
    }

    pub fn unbind(&self) {
        self.gl.bind_vertex_array(0);
    }
}

impl<G: GlApi> Drop for VertexArray<G> {
    fn drop(&mut self) {
        self.gl.delete_vertex_array(self.id);
    }
}

/// Represents a [vertex buffer object (VBO)](https://en.wikipedia.org/wiki/Vertex_buffer_object),
/// vertex data that's sent to the graphics card. Deleted on drop.
pub struct VertexBuffer<G: GlApi> {
    gl: G,
    id: GLuint,
}

impl<G: GlApi> VertexBuffer<G> {
    /// Generates a buffer, binds it and uploads `data`. The buffer stays bound.
    pub fn init(gl: G, data: &[f32]) -> Self {
        let id = gl.gen_buffer();
        let vbo = Self { gl, id };
        vbo.bind();
        vbo.gl.buffer_data(BufferTarget::Array, bytemuck::cast_slice(data));
        vbo
    }

    pub fn id(&self) -> GLuint { self.id }

    pub fn bind(&self) {
        self.gl.bind_buffer(BufferTarget::Array, self.id);
    }
}

impl<G: GlApi> Drop for VertexBuffer<G> {
    fn drop(&mut self) {
        self.gl.delete_buffer(self.id);
    }
}

/// An element buffer object (EBO): a list of vertex indices, so vertices shared between triangles
/// only have to be sent once. Deleted on drop.
pub struct ElementBuffer<G: GlApi> {
    gl: G,
    id: GLuint,
    len: usize,
}

impl<G: GlApi> ElementBuffer<G> {
    /// Generates a buffer, binds it and uploads `indices`. The buffer stays bound, so if a vertex
    /// array is bound it records this buffer.
    pub fn init(gl: G, indices: &[u32]) -> Self {
        let id = gl.gen_buffer();
        let ebo = Self { gl, id, len: indices.len() };
        ebo.bind();
        ebo.gl.buffer_data(BufferTarget::Element, bytemuck::cast_slice(indices));
        ebo
    }

    pub fn id(&self) -> GLuint { self.id }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn bind(&self) {
        self.gl.bind_buffer(BufferTarget::Element, self.id);
    }
}

impl<G: GlApi> Drop for ElementBuffer<G> {
    fn drop(&mut self) {
        self.gl.delete_buffer(self.id);
    }
}

/// Abstracts over the arguments of [glVertexAttribPointer](http://docs.gl/gl3/glVertexAttribPointer),
/// which tells OpenGL how to read vertex data out of the bound array buffer.
///
/// Everything is counted in `f32`s.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub index: GLuint,
    pub size: GLint,
    pub stride: usize,
    pub offset: usize,
}

impl VertexAttribute {
    /// Points the attribute at the bound array buffer and enables it.
    pub fn enable<G: GlApi>(&self, gl: &G) {
        gl.vertex_attrib_pointer(self.index, self.size, self.stride, self.offset);
        gl.enable_vertex_attrib_array(self.index);
    }
}

#[cfg(test)]
mod test {
    use super::{ElementBuffer, VertexArray, VertexBuffer};
    use crate::api::BufferTarget;
    use crate::fake::FakeGl;

    #[test]
    fn vertex_buffer_uploads_and_stays_bound() {
        let gl = FakeGl::new();
        let vertices = [0.5f32, -0.5, 0.0];

        let vbo = VertexBuffer::init(gl.clone(), &vertices);

        assert_eq!(gl.bound_buffer(BufferTarget::Array), vbo.id());
        let contents = gl.buffer_contents(vbo.id()).unwrap();
        assert_eq!(contents.len(), 12);
        assert_eq!(&contents[0..4], &0.5f32.to_ne_bytes());
    }

    #[test]
    fn element_buffer_counts_indices() {
        let gl = FakeGl::new();
        let ebo = ElementBuffer::init(gl.clone(), &[0, 1, 3, 1, 2, 3]);

        assert_eq!(ebo.len(), 6);
        assert!(!ebo.is_empty());
        assert_eq!(gl.bound_buffer(BufferTarget::Element), ebo.id());
        assert_eq!(gl.buffer_contents(ebo.id()).unwrap().len(), 24);
    }

    #[test]
    fn everything_is_released_on_drop() {
        let gl = FakeGl::new();

        {
            let vao = VertexArray::new(gl.clone());
            vao.bind();
            let _vbo = VertexBuffer::init(gl.clone(), &[0.0; 9]);
            let _ebo = ElementBuffer::init(gl.clone(), &[0, 1, 2]);

            assert_eq!(gl.live_vertex_arrays(), 1);
            assert_eq!(gl.live_buffers(), 2);
        }

        assert_eq!(gl.live_vertex_arrays(), 0);
        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(gl.bound_buffer(BufferTarget::Array), 0);
    }
}
