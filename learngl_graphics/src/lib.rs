//! A small set of owning wrappers around the OpenGL API.
//!
//! Everything that talks to the driver goes through [`GlApi`], so the
//! wrappers here never touch a window or an event loop. The real implementation is
//! [`NativeGl`], which forwards to the `gl` crate once its function
//! pointers have been loaded against a current context.
//!
//! Each GPU object (shader, program, vertex array, buffer) is held by exactly one Rust value and
//! released when that value is dropped.

pub mod api;
pub mod buffer;
pub mod shader;
mod utils;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use api::{BufferTarget, GlApi, LoadError, NativeGl, PolygonMode};
pub use buffer::{ElementBuffer, VertexArray, VertexAttribute, VertexBuffer};
pub use shader::{Diagnostic, Shader, ShaderProgram, ShaderStage};
