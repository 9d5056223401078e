//! An in-memory [`GlApi`] for tests.
//!
//! The fake understands just enough GLSL to tell a working shader from a broken one:
//!
//! * compilation needs a `#version` directive, a `main` function, balanced brackets, and every
//!   statement terminated before its block closes;
//! * linking needs both stages compiled, and every `in` of the fragment stage matched by an `out`
//!   of the vertex stage with the same type;
//! * uniforms are numbered in declaration order, vertex stage first.
//!
//! It also tracks which objects are alive and records the draw-side calls.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use gl::types::*;

use crate::api::{BufferTarget, GlApi, PolygonMode};
use crate::shader::ShaderStage;

/// Draw-side calls, in the order they were made.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Viewport(GLint, GLint, GLsizei, GLsizei),
    ClearColor([f32; 4]),
    Clear,
    PolygonMode(PolygonMode),
    UseProgram(GLuint),
    Uniform4f(GLint, [f32; 4]),
    BindVertexArray(GLuint),
    DrawArrays { first: GLint, count: GLsizei },
    DrawElements { count: GLsizei },
}

struct FakeShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Default)]
struct FakeProgram {
    attached: Vec<GLuint>,
    linked: bool,
    log: String,
    uniforms: Vec<String>,
}

#[derive(Default)]
struct State {
    next_id: GLuint,
    shaders: HashMap<GLuint, FakeShader>,
    programs: HashMap<GLuint, FakeProgram>,
    vertex_arrays: HashSet<GLuint>,
    buffers: HashMap<GLuint, Vec<u8>>,
    bound_buffers: HashMap<BufferTarget, GLuint>,
    current_program: GLuint,
    calls: Vec<Call>,
}

impl State {
    fn next_id(&mut self) -> GLuint {
        self.next_id += 1;
        self.next_id
    }
}

/// Cloning gives another handle to the same fake context.
#[derive(Clone, Default)]
pub struct FakeGl {
    state: Rc<RefCell<State>>,
}

impl FakeGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_program(&self, program: GLuint) -> bool {
        self.state.borrow().programs.contains_key(&program)
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Contents of a live buffer.
    pub fn buffer_contents(&self, buffer: GLuint) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> GLuint {
        self.state.borrow().bound_buffers.get(&target).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn last_uniform_4f(&self) -> Option<[f32; 4]> {
        self.state.borrow().calls.iter().rev().find_map(|call| match call {
            Call::Uniform4f(_, value) => Some(*value),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl fmt::Debug for FakeGl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FakeGl")
            .field("shaders", &state.shaders.len())
            .field("programs", &state.programs.len())
            .field("vertex_arrays", &state.vertex_arrays.len())
            .field("buffers", &state.buffers.len())
            .field("current_program", &state.current_program)
            .finish()
    }
}

impl GlApi for FakeGl {
    fn create_shader(&self, stage: ShaderStage) -> GLuint {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.shaders.insert(id, FakeShader {
            stage,
            source: String::new(),
            compiled: false,
            log: String::new(),
        });
        id
    }

    fn shader_source(&self, shader: GLuint, source: &str) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.source = source.to_owned();
        }
    }

    fn compile_shader(&self, shader: GLuint) {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            match check_syntax(&s.source) {
                Ok(()) => {
                    s.compiled = true;
                    s.log.clear();
                }

                Err(log) => {
                    s.compiled = false;
                    s.log = log;
                }
            }
        }
    }

    fn shader_compile_status(&self, shader: GLuint) -> bool {
        self.state.borrow().shaders.get(&shader).map_or(false, |s| s.compiled)
    }

    fn shader_info_log(&self, shader: GLuint) -> String {
        self.state.borrow().shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn delete_shader(&self, shader: GLuint) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.programs.insert(id, FakeProgram::default());
        id
    }

    fn attach_shader(&self, program: GLuint, shader: GLuint) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&self, program: GLuint, shader: GLuint) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.retain(|&s| s != shader);
        }
    }

    fn link_program(&self, program: GLuint) {
        let mut state = self.state.borrow_mut();

        let result = {
            let attached = match state.programs.get(&program) {
                Some(p) => &p.attached,
                None => return,
            };
            let shaders: Vec<&FakeShader> = attached.iter()
                .filter_map(|id| state.shaders.get(id))
                .collect();
            link(&shaders)
        };

        if let Some(p) = state.programs.get_mut(&program) {
            match result {
                Ok(uniforms) => {
                    p.linked = true;
                    p.log.clear();
                    p.uniforms = uniforms;
                }

                Err(log) => {
                    p.linked = false;
                    p.log = log;
                    p.uniforms.clear();
                }
            }
        }
    }

    fn program_link_status(&self, program: GLuint) -> bool {
        self.state.borrow().programs.get(&program).map_or(false, |p| p.linked)
    }

    fn program_info_log(&self, program: GLuint) -> String {
        self.state.borrow().programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn delete_program(&self, program: GLuint) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current_program == program {
            state.current_program = 0;
        }
    }

    fn use_program(&self, program: GLuint) {
        self.state.borrow_mut().current_program = program;
        self.record(Call::UseProgram(program));
    }

    fn current_program(&self) -> GLuint {
        self.state.borrow().current_program
    }

    fn uniform_location(&self, program: GLuint, name: &str) -> GLint {
        self.state.borrow().programs.get(&program)
            .filter(|p| p.linked)
            .and_then(|p| p.uniforms.iter().position(|u| u == name))
            .map_or(-1, |index| index as GLint)
    }

    fn uniform_4f(&self, location: GLint, value: [f32; 4]) {
        self.record(Call::Uniform4f(location, value));
    }

    fn gen_vertex_array(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.vertex_arrays.insert(id);
        id
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        self.record(Call::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: GLuint) {
        self.state.borrow_mut().vertex_arrays.remove(&vao);
    }

    fn gen_buffer(&self) -> GLuint {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.buffers.insert(id, vec![]);
        id
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: GLuint) {
        self.state.borrow_mut().bound_buffers.insert(target, buffer);
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let bound = state.bound_buffers.get(&target).copied().unwrap_or(0);
        if let Some(contents) = state.buffers.get_mut(&bound) {
            *contents = data.to_vec();
        }
    }

    fn delete_buffer(&self, buffer: GLuint) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(&buffer);
        // Deleting a bound buffer unbinds it
        state.bound_buffers.retain(|_, bound| *bound != buffer);
    }

    fn vertex_attrib_pointer(&self, _index: GLuint, _size: GLint, _stride: usize, _offset: usize) {}

    fn enable_vertex_attrib_array(&self, _index: GLuint) {}

    fn viewport(&self, x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
        self.record(Call::Viewport(x, y, width, height));
    }

    fn clear_color(&self, rgba: [f32; 4]) {
        self.record(Call::ClearColor(rgba));
    }

    fn clear(&self) {
        self.record(Call::Clear);
    }

    fn polygon_mode(&self, mode: PolygonMode) {
        self.record(Call::PolygonMode(mode));
    }

    fn draw_arrays(&self, first: GLint, count: GLsizei) {
        self.record(Call::DrawArrays { first, count });
    }

    fn draw_elements(&self, count: GLsizei) {
        self.record(Call::DrawElements { count });
    }
}

/// Source with preprocessor lines blanked out.
fn strip_directives(source: &str) -> String {
    source.lines()
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_syntax(source: &str) -> Result<(), String> {
    let has_version = source.lines()
        .find(|line| !line.trim().is_empty())
        .map_or(false, |line| line.trim_start().starts_with("#version"));

    if !has_version {
        return Err("0:1(1): error: missing #version directive".to_owned());
    }

    let body = strip_directives(source);

    let mut depth = [0i32; 2];
    // Text since the last statement boundary
    let mut pending = String::new();

    for (n, line) in body.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '}' | ';' => {
                    if c == '}' && !pending.trim().is_empty() {
                        return Err(format!(
                            "0:{}(1): error: syntax error, unexpected '}}', expecting ';'", n + 1
                        ));
                    }
                    pending.clear();
                }
                _ => pending.push(c),
            }

            let slot = match c {
                '{' | '}' => 0,
                '(' | ')' => 1,
                _ => continue,
            };

            depth[slot] += if c == '{' || c == '(' { 1 } else { -1 };

            if depth[slot] < 0 {
                return Err(format!("0:{}(1): error: syntax error, unexpected '{}'", n + 1, c));
            }
        }

        pending.push('\n');
    }

    if depth != [0, 0] || !pending.trim().is_empty() {
        return Err("0:0(0): error: syntax error, unexpected end of file".to_owned());
    }

    if !body.contains("void main") {
        return Err("0:0(0): error: function `main' is not defined".to_owned());
    }

    Ok(())
}

/// Global `qualifier type name` declarations, e.g. `("in", "vec3", "position")`.
fn declarations(source: &str) -> Vec<(String, String, String)> {
    let body = strip_directives(source);

    body.split(';')
        .filter_map(|statement| {
            // Drop anything up to the last block boundary and any layout(...) prefix
            let statement = statement.rsplit(|c: char| c == '{' || c == '}').next().unwrap_or("");
            let statement = statement.trim();
            let statement = if statement.starts_with("layout") {
                statement.rsplit(')').next().unwrap_or("")
            } else {
                statement
            };

            let tokens: Vec<&str> = statement.split_whitespace().collect();
            match tokens.as_slice() {
                [qualifier @ "in", ty, name]
                | [qualifier @ "out", ty, name]
                | [qualifier @ "uniform", ty, name] =>
                    Some((qualifier.to_string(), ty.to_string(), name.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn link(shaders: &[&FakeShader]) -> Result<Vec<String>, String> {
    let stage = |wanted: ShaderStage| shaders.iter().find(|s| s.stage == wanted);

    let (vertex, fragment) = match (stage(ShaderStage::Vertex), stage(ShaderStage::Fragment)) {
        (Some(v), Some(f)) => (v, f),
        _ => return Err("error: program needs both a vertex and a fragment shader".to_owned()),
    };

    for s in &[vertex, fragment] {
        if !s.compiled {
            return Err("error: linking with uncompiled/unspecialized shader".to_owned());
        }
    }

    let vertex_decls = declarations(&vertex.source);
    let fragment_decls = declarations(&fragment.source);

    for (_, ty, name) in fragment_decls.iter().filter(|(q, _, _)| q == "in") {
        let matched = vertex_decls.iter()
            .any(|(q, t, n)| q == "out" && t == ty && n == name);

        if !matched {
            return Err(format!(
                "error: fragment shader input `{}' has no matching output in the previous stage",
                name
            ));
        }
    }

    let mut uniforms: Vec<String> = vec![];
    for (_, _, name) in vertex_decls.iter().chain(&fragment_decls).filter(|(q, _, _)| q == "uniform") {
        if !uniforms.contains(name) {
            uniforms.push(name.clone());
        }
    }

    Ok(uniforms)
}

#[cfg(test)]
mod test {
    use super::{check_syntax, declarations, FakeGl};
    use crate::api::GlApi;

    #[test]
    fn debug_shows_live_objects() {
        let gl = FakeGl::new();
        gl.create_program();

        let shown = format!("{:?}", gl);
        assert!(shown.starts_with("FakeGl"));
        assert!(shown.contains("programs: 1"));
    }

    #[test]
    fn missing_semicolon_before_closing_brace() {
        let src = "#version 330 core\nvoid main()\n{\n    int x = 1\n}\n";
        assert!(check_syntax(src).unwrap_err().contains("expecting ';'"));
    }

    #[test]
    fn unbalanced_braces() {
        let src = "#version 330 core\nvoid main()\n{\n    int x = 1;\n";
        assert!(check_syntax(src).is_err());
    }

    #[test]
    fn version_must_come_first() {
        assert!(check_syntax("void main() {}").is_err());
        assert!(check_syntax("\n#version 330 core\nvoid main() {}").is_ok());
    }

    #[test]
    fn finds_globals_with_layouts() {
        let src = "#version 330 core\n\
            layout(location = 0) in vec3 position;\n\
            out vec4 vertexColor;\n\
            uniform float scale;\n\
            void main()\n{\n    vertexColor = vec4(position * scale, 1.0);\n}\n";

        let decls = declarations(src);
        let names: Vec<&str> = decls.iter().map(|(_, _, n)| n.as_str()).collect();

        assert_eq!(names, vec!["position", "vertexColor", "scale"]);
    }
}
