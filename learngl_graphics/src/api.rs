//! The slice of the OpenGL API this crate uses.

use std::error::Error;
use std::ffi::{c_void, CString};
use std::fmt;
use std::mem::size_of;
use std::ptr::{null, null_mut};

use gl;
use gl::types::*;

use crate::shader::ShaderStage;
use crate::utils::info_log_to_string;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    Array = gl::ARRAY_BUFFER as isize,
    Element = gl::ELEMENT_ARRAY_BUFFER as isize,
}

/// How polygons are rasterized, see [glPolygonMode](http://docs.gl/gl3/glPolygonMode).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PolygonMode {
    Fill = gl::FILL as isize,
    Line = gl::LINE as isize,
}

/// The graphics API as seen by the wrappers.
///
/// Handles are the raw GL names. Every method assumes the context the implementation was created
/// for is current on the calling thread.
pub trait GlApi {
    fn create_shader(&self, stage: ShaderStage) -> GLuint;
    fn shader_source(&self, shader: GLuint, source: &str);
    fn compile_shader(&self, shader: GLuint);
    fn shader_compile_status(&self, shader: GLuint) -> bool;
    fn shader_info_log(&self, shader: GLuint) -> String;
    fn delete_shader(&self, shader: GLuint);

    fn create_program(&self) -> GLuint;
    fn attach_shader(&self, program: GLuint, shader: GLuint);
    fn detach_shader(&self, program: GLuint, shader: GLuint);
    fn link_program(&self, program: GLuint);
    fn program_link_status(&self, program: GLuint) -> bool;
    fn program_info_log(&self, program: GLuint) -> String;
    fn delete_program(&self, program: GLuint);
    fn use_program(&self, program: GLuint);
    fn current_program(&self) -> GLuint;

    /// Returns `-1` when `program` has no active uniform called `name`.
    fn uniform_location(&self, program: GLuint, name: &str) -> GLint;
    fn uniform_4f(&self, location: GLint, value: [f32; 4]);

    fn gen_vertex_array(&self) -> GLuint;
    fn bind_vertex_array(&self, vao: GLuint);
    fn delete_vertex_array(&self, vao: GLuint);

    fn gen_buffer(&self) -> GLuint;
    fn bind_buffer(&self, target: BufferTarget, buffer: GLuint);
    /// Uploads `data` to the buffer bound at `target` with `STATIC_DRAW` usage.
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&self, buffer: GLuint);

    /// `stride` and `offset` are counted in `f32`s.
    fn vertex_attrib_pointer(&self, index: GLuint, size: GLint, stride: usize, offset: usize);
    fn enable_vertex_attrib_array(&self, index: GLuint);

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn clear_color(&self, rgba: [f32; 4]);
    fn clear(&self);
    fn polygon_mode(&self, mode: PolygonMode);
    fn draw_arrays(&self, first: GLint, count: GLsizei);
    /// Draws `count` `u32` indices from the bound element buffer as triangles.
    fn draw_elements(&self, count: GLsizei);
}

/// Returned when the driver doesn't provide every entry point [`NativeGl`] needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub missing: Vec<&'static str>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to load OpenGL functions: {}", self.missing.join(", "))
    }
}

impl Error for LoadError {}

/// Entry points that must resolve before [`NativeGl`] is handed out.
const REQUIRED: &[(&str, fn() -> bool)] = &[
    ("glCreateShader", gl::CreateShader::is_loaded),
    ("glShaderSource", gl::ShaderSource::is_loaded),
    ("glCompileShader", gl::CompileShader::is_loaded),
    ("glCreateProgram", gl::CreateProgram::is_loaded),
    ("glLinkProgram", gl::LinkProgram::is_loaded),
    ("glUseProgram", gl::UseProgram::is_loaded),
    ("glGetUniformLocation", gl::GetUniformLocation::is_loaded),
    ("glGenVertexArrays", gl::GenVertexArrays::is_loaded),
    ("glGenBuffers", gl::GenBuffers::is_loaded),
    ("glBufferData", gl::BufferData::is_loaded),
    ("glVertexAttribPointer", gl::VertexAttribPointer::is_loaded),
    ("glViewport", gl::Viewport::is_loaded),
    ("glClear", gl::Clear::is_loaded),
    ("glDrawArrays", gl::DrawArrays::is_loaded),
    ("glDrawElements", gl::DrawElements::is_loaded),
];

/// [`GlApi`] backed by the global function pointers of the `gl` crate.
///
/// Only obtainable through [`NativeGl::load_with`], so holding one means the pointers are loaded.
#[derive(Debug, Copy, Clone)]
pub struct NativeGl {
    _loaded: (),
}

impl NativeGl {
    /// Loads every GL function through `loader` (usually the context's `get_proc_address`).
    pub fn load_with<F>(loader: F) -> Result<Self, LoadError>
        where F: FnMut(&'static str) -> *const c_void
    {
        gl::load_with(loader);

        let missing: Vec<&'static str> = REQUIRED.iter()
            .filter(|(_, is_loaded)| !is_loaded())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(LoadError { missing });
        }

        Ok(Self { _loaded: () })
    }
}

impl GlApi for NativeGl {
    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        unsafe { gl::CreateShader(stage.gl_enum()) }
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        // Passing the length lets the source go through without a NUL terminator
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &ptr, &len); }
    }

    fn compile_shader(&self, shader: GLuint) {
        unsafe { gl::CompileShader(shader); }
    }

    fn shader_compile_status(&self, shader: GLuint) -> bool {
        let mut success = 1;
        unsafe { gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success); }
        success != 0
    }

    fn shader_info_log(&self, shader: GLuint) -> String {
        let mut len = 0;
        unsafe { gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len); }

        let mut buf = vec![0u8; len.max(0) as usize];
        if !buf.is_empty() {
            unsafe {
                gl::GetShaderInfoLog(shader, len, null_mut(), buf.as_mut_ptr() as *mut GLchar);
            }
        }

        info_log_to_string(buf)
    }

    fn delete_shader(&self, shader: GLuint) {
        unsafe { gl::DeleteShader(shader); }
    }

    fn create_program(&self) -> GLuint {
        unsafe { gl::CreateProgram() }
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::AttachShader(program, shader); }
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        unsafe { gl::DetachShader(program, shader); }
    }

    fn link_program(&self, program: GLuint) {
        unsafe { gl::LinkProgram(program); }
    }

    fn program_link_status(&self, program: GLuint) -> bool {
        let mut success = 1;
        unsafe { gl::GetProgramiv(program, gl::LINK_STATUS, &mut success); }
        success != 0
    }

    fn program_info_log(&self, program: GLuint) -> String {
        let mut len = 0;
        unsafe { gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len); }

        let mut buf = vec![0u8; len.max(0) as usize];
        if !buf.is_empty() {
            unsafe {
                gl::GetProgramInfoLog(program, len, null_mut(), buf.as_mut_ptr() as *mut GLchar);
            }
        }

        info_log_to_string(buf)
    }

    fn delete_program(&self, program: GLuint) {
        unsafe { gl::DeleteProgram(program); }
    }

    fn use_program(&self, program: GLuint) {
        unsafe { gl::UseProgram(program); }
    }

    fn current_program(&self) -> GLuint {
        let mut current = 0;
        unsafe { gl::GetIntegerv(gl::CURRENT_PROGRAM, &mut current); }
        current as GLuint
    }

    fn uniform_location(&self, program: GLuint, name: &str) -> GLint {
        match CString::new(name) {
            Ok(name) => unsafe { gl::GetUniformLocation(program, name.as_ptr()) },
            // GL can't name a uniform with an interior NUL
            Err(_) => -1,
        }
    }

    fn uniform_4f(&self, location: GLint, value: [f32; 4]) {
        let [x, y, z, w] = value;
        unsafe { gl::Uniform4f(location, x, y, z, w); }
    }

    fn gen_vertex_array(&self) -> GLuint {
        let mut vao = 0;
        unsafe { gl::GenVertexArrays(1, &mut vao); }
        vao
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        unsafe { gl::BindVertexArray(vao); }
    }

    fn delete_vertex_array(&self, vao: GLuint) {
        unsafe { gl::DeleteVertexArrays(1, &vao); }
    }

    fn gen_buffer(&self) -> GLuint {
        let mut buffer = 0;
        unsafe { gl::GenBuffers(1, &mut buffer); }
        buffer
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: GLuint) {
        unsafe { gl::BindBuffer(target as GLenum, buffer); }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe {
            gl::BufferData(
                target as GLenum,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
                gl::STATIC_DRAW
            );
        }
    }

    fn delete_buffer(&self, buffer: GLuint) {
        unsafe { gl::DeleteBuffers(1, &buffer); }
    }

    fn vertex_attrib_pointer(&self, index: GLuint, size: GLint, stride: usize, offset: usize) {
        unsafe {
            gl::VertexAttribPointer(
                index,
                size,
                gl::FLOAT,
                gl::FALSE,
                (stride * size_of::<f32>()) as GLsizei,
                (offset * size_of::<f32>()) as *const c_void
            );
        }
    }

    fn enable_vertex_attrib_array(&self, index: GLuint) {
        unsafe { gl::EnableVertexAttribArray(index); }
    }

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        unsafe { gl::Viewport(x, y, width, height); }
    }

    fn clear_color(&self, rgba: [f32; 4]) {
        let [r, g, b, a] = rgba;
        unsafe { gl::ClearColor(r, g, b, a); }
    }

    fn clear(&self) {
        unsafe { gl::Clear(gl::COLOR_BUFFER_BIT); }
    }

    fn polygon_mode(&self, mode: PolygonMode) {
        unsafe { gl::PolygonMode(gl::FRONT_AND_BACK, mode as GLenum); }
    }

    fn draw_arrays(&self, first: GLint, count: GLsizei) {
        unsafe { gl::DrawArrays(gl::TRIANGLES, first, count); }
    }

    fn draw_elements(&self, count: GLsizei) {
        unsafe { gl::DrawElements(gl::TRIANGLES, count, gl::UNSIGNED_INT, null()); }
    }
}

#[cfg(test)]
mod test {
    use super::LoadError;

    #[test]
    fn load_error_lists_every_missing_function() {
        let err = LoadError { missing: vec!["glCreateShader", "glDrawElements"] };

        assert_eq!(
            err.to_string(),
            "Failed to load OpenGL functions: glCreateShader, glDrawElements"
        );
    }
}
