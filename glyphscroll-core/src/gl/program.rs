use glow::HasContext;

use crate::{GlslVersion, error::Error};

/// A linked vertex + fragment program.
#[derive(Debug)]
pub(crate) struct ShaderProgram {
    program: glow::Program,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn gl_enum(self) -> u32 {
        match self {
            Stage::Vertex => glow::VERTEX_SHADER,
            Stage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn preamble(self, version: &GlslVersion) -> &'static str {
        match self {
            Stage::Vertex => version.vertex_preamble(),
            Stage::Fragment => version.fragment_preamble(),
        }
    }
}

impl ShaderProgram {
    /// Compiles both stages with the version preamble prepended and links them.
    ///
    /// Every GL object created along the way is released on failure.
    pub(crate) fn create(
        gl: &glow::Context,
        version: &GlslVersion,
        vertex_body: &str,
        fragment_body: &str,
    ) -> Result<Self, Error> {
        let program =
            unsafe { gl.create_program() }.map_err(Error::shader_program_creation_failed)?;

        let mut shaders = Vec::with_capacity(2);
        for (stage, body) in [(Stage::Vertex, vertex_body), (Stage::Fragment, fragment_body)] {
            match compile(gl, stage, version, body) {
                Ok(shader) => shaders.push(shader),
                Err(e) => {
                    release(gl, program, &shaders);
                    return Err(e);
                },
            }
        }

        unsafe {
            for &shader in &shaders {
                gl.attach_shader(program, shader);
            }
            gl.link_program(program);
        }

        if !unsafe { gl.get_program_link_status(program) } {
            let log = unsafe { gl.get_program_info_log(program) };
            release(gl, program, &shaders);
            return Err(Error::shader_link_failed(log));
        }

        // linked programs keep their own copy of the compiled stages
        unsafe {
            for &shader in &shaders {
                gl.detach_shader(program, shader);
                gl.delete_shader(shader);
            }
        }

        Ok(Self { program })
    }

    pub(crate) fn use_program(&self, gl: &glow::Context) {
        unsafe { gl.use_program(Some(self.program)) };
    }

    pub(crate) fn uniform_location(
        &self,
        gl: &glow::Context,
        name: &str,
    ) -> Result<glow::UniformLocation, Error> {
        unsafe { gl.get_uniform_location(self.program, name) }
            .ok_or_else(|| Error::uniform_location_failed(name))
    }

    pub(crate) fn delete(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}

fn compile(
    gl: &glow::Context,
    stage: Stage,
    version: &GlslVersion,
    body: &str,
) -> Result<glow::Shader, Error> {
    let shader = unsafe { gl.create_shader(stage.gl_enum()) }
        .map_err(|e| Error::shader_creation_failed(&e))?;

    let source = format!("{}{body}", stage.preamble(version));
    unsafe {
        gl.shader_source(shader, &source);
        gl.compile_shader(shader);
    }

    if unsafe { gl.get_shader_compile_status(shader) } {
        Ok(shader)
    } else {
        let log = unsafe { gl.get_shader_info_log(shader) };
        unsafe { gl.delete_shader(shader) };
        Err(Error::shader_compile_failed(format!("{stage:?} stage: {log}")))
    }
}

fn release(gl: &glow::Context, program: glow::Program, shaders: &[glow::Shader]) {
    unsafe {
        for &shader in shaders {
            gl.delete_shader(shader);
        }
        gl.delete_program(program);
    }
}
