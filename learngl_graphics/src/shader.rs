//! Shader stages and the two-stage program built from them.
//!
//! Building a program is deliberately lenient: unreadable files, compile errors and link errors are
//! recorded as [`Diagnostic`]s (and logged) instead of being returned as errors, so the caller always
//! gets a [`ShaderProgram`] back. A program that failed to link simply draws nothing.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use gl;
use gl::types::*;
use log::{debug, error};

use crate::api::GlApi;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that went wrong while building a [`ShaderProgram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Read { stage: ShaderStage, path: PathBuf, message: String },
    Compile { stage: ShaderStage, log: String },
    Link { log: String },
}

impl Diagnostic {
    /// The stage the problem belongs to, `None` for link failures.
    pub fn stage(&self) -> Option<ShaderStage> {
        match self {
            Diagnostic::Read { stage, .. } | Diagnostic::Compile { stage, .. } => Some(*stage),
            Diagnostic::Link { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Read { stage, path, message } =>
                write!(f, "ERROR::SHADER::{}::FILE_NOT_READ\n{}: {}", stage, path.display(), message),
            Diagnostic::Compile { stage, log } =>
                write!(f, "ERROR::SHADER::{}::COMPILATION_FAILED\n{}", stage, log),
            Diagnostic::Link { log } =>
                write!(f, "ERROR::PROGRAM::LINK_FAILED\n{}", log),
        }
    }
}

/// A compiled (or failed) shader object. Deleted on drop.
pub struct Shader<G: GlApi> {
    gl: G,
    id: GLuint,
    stage: ShaderStage,
}

impl<G: GlApi> Shader<G> {
    /// Compiles `source` as `stage`. The shader object exists even if compilation failed, in which
    /// case the compiler's log comes back as a diagnostic.
    pub fn compile(gl: G, stage: ShaderStage, source: &str) -> (Self, Option<Diagnostic>) {
        let id = gl.create_shader(stage);
        gl.shader_source(id, source);
        gl.compile_shader(id);

        let diagnostic = if gl.shader_compile_status(id) {
            None
        } else {
            Some(Diagnostic::Compile { stage, log: gl.shader_info_log(id) })
        };

        (Self { gl, id, stage }, diagnostic)
    }

    pub fn id(&self) -> GLuint { self.id }

    pub fn stage(&self) -> ShaderStage { self.stage }
}

impl<G: GlApi> Drop for Shader<G> {
    fn drop(&mut self) {
        self.gl.delete_shader(self.id);
    }
}

/// A linked vertex + fragment program. Deleted on drop.
pub struct ShaderProgram<G: GlApi> {
    gl: G,
    id: GLuint,
    linked: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<G: GlApi + Clone> ShaderProgram<G> {
    /// Reads both stages from disk and builds the program.
    ///
    /// A file that can't be read is reported and compiled as empty source, which fails to compile
    /// and is reported again by the compiler.
    pub fn new<V, F>(gl: G, vertex_path: V, fragment_path: F) -> Self
        where V: AsRef<Path>, F: AsRef<Path>
    {
        let mut diagnostics = vec![];

        let vertex = read_source(ShaderStage::Vertex, vertex_path.as_ref(), &mut diagnostics);
        let fragment = read_source(ShaderStage::Fragment, fragment_path.as_ref(), &mut diagnostics);

        Self::build(gl, &vertex, &fragment, diagnostics)
    }

    /// Builds the program from in-memory sources.
    pub fn from_sources(gl: G, vertex: &str, fragment: &str) -> Self {
        Self::build(gl, vertex, fragment, vec![])
    }

    fn build(gl: G, vertex: &str, fragment: &str, mut diagnostics: Vec<Diagnostic>) -> Self {
        let (vert_shader, vert_diag) = Shader::compile(gl.clone(), ShaderStage::Vertex, vertex);
        report(vert_diag, &mut diagnostics);

        let (frag_shader, frag_diag) = Shader::compile(gl.clone(), ShaderStage::Fragment, fragment);
        report(frag_diag, &mut diagnostics);

        let id = gl.create_program();
        let shaders = [&vert_shader, &frag_shader];

        for shader in &shaders {
            gl.attach_shader(id, shader.id());
        }

        gl.link_program(id);

        let linked = gl.program_link_status(id);
        if !linked {
            report(Some(Diagnostic::Link { log: gl.program_info_log(id) }), &mut diagnostics);
        }

        for shader in &shaders {
            gl.detach_shader(id, shader.id());
        }

        // vert_shader and frag_shader are deleted here; only the program is kept
        debug!("built shader program {} (linked: {})", id, linked);

        Self { gl, id, linked, diagnostics }
    }
}

impl<G: GlApi> ShaderProgram<G> {
    pub fn id(&self) -> GLuint { self.id }

    pub fn is_linked(&self) -> bool { self.linked }

    /// Everything reported while building this program, in the order it happened.
    pub fn diagnostics(&self) -> &[Diagnostic] { &self.diagnostics }

    pub fn set_used(&self) {
        self.gl.use_program(self.id);
    }

    pub fn uniform_location(&self, name: &str) -> Option<GLint> {
        match self.gl.uniform_location(self.id, name) {
            -1 => None,
            location => Some(location),
        }
    }

    /// Sets a `vec4` uniform on the program. Must be the active program.
    ///
    /// Returns `false` if the program has no such uniform.
    pub fn set_vec4(&self, name: &str, value: [f32; 4]) -> bool {
        match self.uniform_location(name) {
            Some(location) => {
                self.gl.uniform_4f(location, value);
                true
            }

            None => false
        }
    }
}

impl<G: GlApi> Drop for ShaderProgram<G> {
    fn drop(&mut self) {
        self.gl.delete_program(self.id);
    }
}

fn read_source(stage: ShaderStage, path: &Path, diagnostics: &mut Vec<Diagnostic>) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            report(
                Some(Diagnostic::Read { stage, path: path.to_path_buf(), message: e.to_string() }),
                diagnostics
            );
            String::new()
        }
    }
}

fn report(diagnostic: Option<Diagnostic>, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(d) = diagnostic {
        error!("{}", d);
        diagnostics.push(d);
    }
}

#[cfg(test)]
mod test {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    use super::{Diagnostic, Shader, ShaderProgram, ShaderStage};
    use crate::api::GlApi;
    use crate::fake::FakeGl;

    const VERTEX: &str = "#version 330 core\n\
        layout(location = 0) in vec3 position;\n\
        void main()\n\
        {\n\
            gl_Position = vec4(position.x, position.y, position.z, 1.0);\n\
        }\n";

    const FRAGMENT: &str = "#version 330 core\n\
        out vec4 color;\n\
        void main()\n\
        {\n\
            color = vec4(1.0f, 0.5f, 0.2f, 1.0f);\n\
        }\n";

    const UNIFORM_FRAGMENT: &str = "#version 330 core\n\
        out vec4 color;\n\
        uniform vec4 ourColor;\n\
        void main()\n\
        {\n\
            color = ourColor;\n\
        }\n";

    // Missing semicolon after the assignment
    const BROKEN_VERTEX: &str = "#version 330 core\n\
        layout(location = 0) in vec3 position;\n\
        void main()\n\
        {\n\
            gl_Position = vec4(position, 1.0)\n\
        }\n";

    // Reads an input the vertex stage never writes
    const MISMATCHED_FRAGMENT: &str = "#version 330 core\n\
        in vec3 vertexColor;\n\
        out vec4 color;\n\
        void main()\n\
        {\n\
            color = vec4(vertexColor, 1.0);\n\
        }\n";

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("graphics-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn valid_sources_link_without_diagnostics() {
        let gl = FakeGl::new();
        let program = ShaderProgram::from_sources(gl.clone(), VERTEX, FRAGMENT);

        assert!(program.is_linked());
        assert!(program.diagnostics().is_empty());
        assert!(gl.is_program(program.id()));
    }

    #[test]
    fn program_builds_from_files() {
        let vert = write_temp("files.vert", VERTEX);
        let frag = write_temp("files.frag", FRAGMENT);

        let program = ShaderProgram::new(FakeGl::new(), &vert, &frag);

        assert!(program.is_linked());
        assert!(program.diagnostics().is_empty());

        fs::remove_file(vert).unwrap();
        fs::remove_file(frag).unwrap();
    }

    #[test]
    fn vertex_syntax_error_is_reported_but_program_still_exists() {
        let gl = FakeGl::new();
        let program = ShaderProgram::from_sources(gl.clone(), BROKEN_VERTEX, FRAGMENT);

        let first = &program.diagnostics()[0];
        assert_eq!(first.stage(), Some(ShaderStage::Vertex));
        assert!(first.to_string().contains("VERTEX"));
        assert!(first.to_string().contains("COMPILATION_FAILED"));

        // The program object is still there, it just didn't link
        assert!(!program.is_linked());
        assert!(gl.is_program(program.id()));
    }

    #[test]
    fn mismatched_interfaces_fail_at_link() {
        let program = ShaderProgram::from_sources(FakeGl::new(), VERTEX, MISMATCHED_FRAGMENT);

        assert!(!program.is_linked());
        assert_eq!(program.diagnostics().len(), 1);

        let diagnostic = &program.diagnostics()[0];
        assert!(matches!(diagnostic, Diagnostic::Link { .. }));
        assert!(diagnostic.to_string().starts_with("ERROR::PROGRAM::LINK_FAILED"));
        assert!(diagnostic.to_string().contains("vertexColor"));
    }

    #[test]
    fn missing_file_is_reported_and_compiled_empty() {
        let frag = write_temp("missing.frag", FRAGMENT);
        let vert = env::temp_dir().join("graphics-this-file-does-not-exist.vert");

        let program = ShaderProgram::new(FakeGl::new(), &vert, &frag);
        let diagnostics = program.diagnostics();

        assert!(matches!(diagnostics[0], Diagnostic::Read { stage: ShaderStage::Vertex, .. }));
        assert!(matches!(diagnostics[1], Diagnostic::Compile { stage: ShaderStage::Vertex, .. }));
        assert!(!program.is_linked());

        fs::remove_file(frag).unwrap();
    }

    #[test]
    fn stage_objects_are_released_after_construction() {
        let gl = FakeGl::new();

        let _ok = ShaderProgram::from_sources(gl.clone(), VERTEX, FRAGMENT);
        let _broken = ShaderProgram::from_sources(gl.clone(), BROKEN_VERTEX, FRAGMENT);

        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 2);
    }

    #[test]
    fn program_is_released_on_drop() {
        let gl = FakeGl::new();
        let program = ShaderProgram::from_sources(gl.clone(), VERTEX, FRAGMENT);
        let id = program.id();

        drop(program);

        assert!(!gl.is_program(id));
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn set_used_is_idempotent() {
        let gl = FakeGl::new();
        let program = ShaderProgram::from_sources(gl.clone(), VERTEX, FRAGMENT);

        let other = ShaderProgram::from_sources(gl.clone(), VERTEX, FRAGMENT);
        other.set_used();
        assert_eq!(gl.current_program(), other.id());

        program.set_used();
        assert_eq!(gl.current_program(), program.id());

        program.set_used();
        assert_eq!(gl.current_program(), program.id());
    }

    #[test]
    fn uniform_lookup() {
        let gl = FakeGl::new();
        let program = ShaderProgram::from_sources(gl.clone(), VERTEX, UNIFORM_FRAGMENT);

        assert!(program.uniform_location("ourColor").is_some());
        assert_eq!(program.uniform_location("notThere"), None);
        assert_eq!(program.uniform_location("our\0Color"), None);

        program.set_used();
        assert!(program.set_vec4("ourColor", [0.0, 0.5, 0.0, 1.0]));
        assert!(!program.set_vec4("notThere", [1.0; 4]));
        assert_eq!(gl.last_uniform_4f(), Some([0.0, 0.5, 0.0, 1.0]));
    }

    #[test]
    fn shader_is_deleted_on_drop() {
        let gl = FakeGl::new();
        let (shader, diagnostic) = Shader::compile(gl.clone(), ShaderStage::Fragment, FRAGMENT);

        assert!(diagnostic.is_none());
        assert_eq!(shader.stage(), ShaderStage::Fragment);
        assert_eq!(gl.live_shaders(), 1);

        drop(shader);
        assert_eq!(gl.live_shaders(), 0);
    }
}
