use std::collections::HashMap;
use std::fmt;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use log::{debug, error, warn};

use super::shaders::{compile_shader, CompiledShader, ShaderSource};
use crate::gpu::{GraphicsContext, ShaderStage};
use crate::utils::error::RenderError;

/// A linked vertex + fragment program with per-name location caches.
///
/// Lookups that miss are cached as `None` and logged once.
pub struct LinkedProgram<C: GraphicsContext> {
    handle: C::Program,
    attributes: HashMap<String, Option<u32>>,
    uniforms: HashMap<String, Option<C::UniformLocation>>,
}

impl<C: GraphicsContext> LinkedProgram<C> {
    pub fn handle(&self) -> C::Program {
        self.handle
    }

    /// Makes this the program used by subsequent draws and uniform writes.
    pub fn bind(&self, ctx: &C) {
        ctx.use_program(Some(self.handle));
    }

    pub fn attrib_location(&mut self, ctx: &C, name: &str) -> Option<u32> {
        if let Some(location) = self.attributes.get(name) {
            return *location;
        }

        let location = ctx.attrib_location(self.handle, name);
        if location.is_none() {
            warn!("Attribute '{}' not found in program {:?}", name, self.handle);
        }
        self.attributes.insert(name.to_string(), location);
        location
    }

    pub fn uniform_location(&mut self, ctx: &C, name: &str) -> Option<C::UniformLocation> {
        if let Some(location) = self.uniforms.get(name) {
            return location.clone();
        }

        let location = ctx.uniform_location(self.handle, name);
        if location.is_none() {
            warn!("Uniform '{}' not found in program {:?}", name, self.handle);
        }
        self.uniforms.insert(name.to_string(), location.clone());
        location
    }

    // The setters write to the program currently in use; call `bind` first.

    pub fn set_f32(&mut self, ctx: &C, name: &str, value: f32) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_1_f32(location.as_ref(), value);
    }

    pub fn set_vec2(&mut self, ctx: &C, name: &str, value: Vec2) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_2_f32(location.as_ref(), value.x, value.y);
    }

    pub fn set_vec3(&mut self, ctx: &C, name: &str, value: Vec3) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_3_f32(location.as_ref(), value.x, value.y, value.z);
    }

    pub fn set_vec4(&mut self, ctx: &C, name: &str, value: Vec4) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_4_f32(location.as_ref(), value.x, value.y, value.z, value.w);
    }

    pub fn set_mat3(&mut self, ctx: &C, name: &str, value: &Mat3) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_matrix_3_f32(location.as_ref(), &value.to_cols_array());
    }

    pub fn set_mat4(&mut self, ctx: &C, name: &str, value: &Mat4) {
        let location = self.uniform_location(ctx, name);
        ctx.uniform_matrix_4_f32(location.as_ref(), &value.to_cols_array());
    }

    pub fn destroy(self, ctx: &C) {
        debug!("Deleting program {:?}", self.handle);
        ctx.delete_program(self.handle);
    }
}

impl<C: GraphicsContext> fmt::Debug for LinkedProgram<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("handle", &self.handle)
            .field("attributes", &self.attributes)
            .field("uniforms", &self.uniforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Links a vertex and a fragment shader.
///
/// Both shaders are consumed and deleted whether linking succeeds or not;
/// on failure the program object is deleted as well.
pub fn link_program<C: GraphicsContext>(
    ctx: &C,
    vertex: CompiledShader<C>,
    fragment: CompiledShader<C>,
) -> Result<LinkedProgram<C>, RenderError> {
    if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
        let log = format!(
            "expected a vertex and a fragment shader, got {} and {}",
            vertex.stage(),
            fragment.stage()
        );
        vertex.delete(ctx);
        fragment.delete(ctx);
        return Err(RenderError::ProgramLink { log });
    }

    let program = match ctx.create_program() {
        Ok(program) => program,
        Err(reason) => {
            vertex.delete(ctx);
            fragment.delete(ctx);
            return Err(RenderError::ObjectCreation {
                object: "program",
                reason,
            });
        }
    };

    ctx.attach_shader(program, vertex.handle());
    ctx.attach_shader(program, fragment.handle());
    ctx.link_program(program);
    let linked = ctx.program_link_status(program);

    ctx.detach_shader(program, vertex.handle());
    ctx.detach_shader(program, fragment.handle());
    vertex.delete(ctx);
    fragment.delete(ctx);

    if !linked {
        let mut log = ctx.program_info_log(program);
        ctx.delete_program(program);
        if log.trim().is_empty() {
            log = "linker reported failure without a log".to_string();
        }
        error!("Program linking failed:\n{log}");
        return Err(RenderError::ProgramLink { log });
    }

    debug!("Linked program {:?}", program);
    Ok(LinkedProgram {
        handle: program,
        attributes: HashMap::new(),
        uniforms: HashMap::new(),
    })
}

/// Compiles both stages and links them.
pub fn create_program<C: GraphicsContext>(
    ctx: &C,
    vertex: &ShaderSource,
    fragment: &ShaderSource,
) -> Result<LinkedProgram<C>, RenderError> {
    let vertex = compile_shader(ctx, vertex)?;
    let fragment = match compile_shader(ctx, fragment) {
        Ok(fragment) => fragment,
        Err(err) => {
            vertex.delete(ctx);
            return Err(err);
        }
    };
    link_program(ctx, vertex, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::UniformValue;
    use crate::gpu::{GlError, HeadlessContext};

    const SCENARIO_VS: &str = "void main(){gl_Position=vec4(0,0,0,1);}";
    const SCENARIO_FS: &str = "void main(){gl_FragColor=vec4(1,0,0,1);}";

    const COLORED_VS: &str = r#"
        attribute vec2 a_position;
        attribute vec3 a_color;
        uniform mat4 u_matrix;
        varying vec3 v_color;
        void main() {
            v_color = a_color;
            gl_Position = u_matrix * vec4(a_position, 0.0, 1.0);
        }
    "#;
    const COLORED_FS: &str = r#"
        precision mediump float;
        uniform float u_alpha;
        varying vec3 v_color;
        void main() {
            gl_FragColor = vec4(v_color, u_alpha);
        }
    "#;

    fn sources(vs: &str, fs: &str) -> (ShaderSource, ShaderSource) {
        (ShaderSource::vertex(vs), ShaderSource::fragment(fs))
    }

    #[test]
    fn test_minimal_pair_links() {
        let ctx = HeadlessContext::new();
        let (vs, fs) = sources(SCENARIO_VS, SCENARIO_FS);
        let program = create_program(&ctx, &vs, &fs).unwrap();
        assert_eq!(ctx.live_programs(), 1);
        assert_eq!(ctx.live_shaders(), 0);
        program.destroy(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_locations_are_cached_and_missing_names_are_none() {
        let ctx = HeadlessContext::new();
        let (vs, fs) = sources(COLORED_VS, COLORED_FS);
        let mut program = create_program(&ctx, &vs, &fs).unwrap();

        assert_eq!(program.attrib_location(&ctx, "a_position"), Some(0));
        assert_eq!(program.attrib_location(&ctx, "a_color"), Some(1));
        assert_eq!(program.attrib_location(&ctx, "a_missing"), None);
        assert!(program.uniform_location(&ctx, "u_missing").is_none());
        assert!(program.uniform_location(&ctx, "u_missing").is_none());
        assert_eq!(ctx.get_error(), GlError::NoError);
        program.destroy(&ctx);
    }

    #[test]
    fn test_uniform_setters() {
        let ctx = HeadlessContext::new();
        let (vs, fs) = sources(COLORED_VS, COLORED_FS);
        let mut program = create_program(&ctx, &vs, &fs).unwrap();
        program.bind(&ctx);

        program.set_f32(&ctx, "u_alpha", 0.5);
        program.set_mat4(&ctx, "u_matrix", &Mat4::IDENTITY);
        program.set_vec3(&ctx, "u_not_there", Vec3::ONE);
        assert_eq!(ctx.get_error(), GlError::NoError);

        let handle = program.handle();
        assert_eq!(ctx.uniform_value(handle, "u_alpha"), Some(UniformValue::Float(0.5)));
        assert_eq!(
            ctx.uniform_value(handle, "u_matrix"),
            Some(UniformValue::Mat4(Mat4::IDENTITY.to_cols_array()))
        );
        program.destroy(&ctx);
    }

    #[test]
    fn test_link_failure_releases_everything() {
        let ctx = HeadlessContext::new();
        let fs = "precision mediump float;\nvarying vec4 v_unknown;\nvoid main(){ gl_FragColor = v_unknown; }";
        let (vs, fs) = sources(COLORED_VS, fs);
        let err = create_program(&ctx, &vs, &fs).unwrap_err();
        match err {
            RenderError::ProgramLink { log } => assert!(log.contains("v_unknown")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_fragment_compile_failure_releases_vertex_shader() {
        let ctx = HeadlessContext::new();
        let (vs, fs) = sources(SCENARIO_VS, "void main(){gl_FragColor=vec4(1,0,0,1)");
        let err = create_program(&ctx, &vs, &fs).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShaderCompilation {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_swapped_stages_fail_to_link() {
        let ctx = HeadlessContext::new();
        let vs = compile_shader(&ctx, &ShaderSource::vertex(SCENARIO_VS)).unwrap();
        let fs = compile_shader(&ctx, &ShaderSource::fragment(SCENARIO_FS)).unwrap();
        let err = link_program(&ctx, fs, vs).unwrap_err();
        assert!(matches!(err, RenderError::ProgramLink { .. }));
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_program_creation_failure_releases_shaders() {
        let ctx = HeadlessContext::new();
        ctx.limit_allocations(2);
        let (vs, fs) = sources(SCENARIO_VS, SCENARIO_FS);
        let err = create_program(&ctx, &vs, &fs).unwrap_err();
        assert!(matches!(err, RenderError::ObjectCreation { object: "program", .. }));
        assert_eq!(ctx.live_objects(), 0);
    }
}
