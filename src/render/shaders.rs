// shaders.rs - shader sources and stage compilation

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, error};

use crate::gpu::{GraphicsContext, ShaderStage};
use crate::utils::error::{AssetError, RenderError};

/// GLSL source text tagged with the stage it is written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    stage: ShaderStage,
    text: String,
    label: Option<String>,
}

impl ShaderSource {
    pub fn new(stage: ShaderStage, text: impl Into<String>) -> Self {
        Self {
            stage,
            text: text.into(),
            label: None,
        }
    }

    pub fn vertex(text: impl Into<String>) -> Self {
        Self::new(ShaderStage::Vertex, text)
    }

    pub fn fragment(text: impl Into<String>) -> Self {
        Self::new(ShaderStage::Fragment, text)
    }

    /// Name used in log lines, usually the file the source came from.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Loads a shader file, inferring the stage from its name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let stage =
            stage_from_path(path).ok_or_else(|| AssetError::UnknownStage(path.to_path_buf()))?;
        Self::load(path, stage)
    }

    /// Loads a shader file for an explicit stage.
    pub fn load(path: impl AsRef<Path>, stage: ShaderStage) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(stage, text).with_label(path.display().to_string()))
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Display for ShaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} shader '{}'", self.stage, label),
            None => write!(f, "{} shader", self.stage),
        }
    }
}

/// `*.vertex.glsl`, `*.vert`, `*.vs` and the fragment equivalents.
pub fn stage_from_path(path: &Path) -> Option<ShaderStage> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let vertex = [".vertex.glsl", ".vert", ".vs"];
    let fragment = [".fragment.glsl", ".frag", ".fs"];
    if vertex.iter().any(|ext| name.ends_with(ext)) {
        Some(ShaderStage::Vertex)
    } else if fragment.iter().any(|ext| name.ends_with(ext)) {
        Some(ShaderStage::Fragment)
    } else {
        None
    }
}

/// A successfully compiled shader object, waiting to be linked.
pub struct CompiledShader<C: GraphicsContext> {
    handle: C::Shader,
    stage: ShaderStage,
}

impl<C: GraphicsContext> CompiledShader<C> {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn handle(&self) -> C::Shader {
        self.handle
    }

    /// Releases a shader that will not be linked.
    pub fn delete(self, ctx: &C) {
        ctx.delete_shader(self.handle);
    }
}

impl<C: GraphicsContext> fmt::Debug for CompiledShader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledShader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}

/// Compiles one stage. On failure the shader object is deleted and the
/// driver log is returned in the error.
pub fn compile_shader<C: GraphicsContext>(
    ctx: &C,
    source: &ShaderSource,
) -> Result<CompiledShader<C>, RenderError> {
    let stage = source.stage();
    if source.text().trim().is_empty() {
        return Err(RenderError::ShaderCompilation {
            stage,
            log: "shader source is empty".to_string(),
        });
    }

    let shader = ctx
        .create_shader(stage)
        .map_err(|reason| RenderError::ObjectCreation {
            object: "shader",
            reason,
        })?;
    ctx.shader_source(shader, source.text());
    ctx.compile_shader(shader);

    if !ctx.shader_compile_status(shader) {
        let mut log = ctx.shader_info_log(shader);
        ctx.delete_shader(shader);
        if log.trim().is_empty() {
            log = "compiler reported failure without a log".to_string();
        }
        error!("Failed to compile {source}:\n{log}");
        return Err(RenderError::ShaderCompilation { stage, log });
    }

    debug!("Compiled {source}");
    Ok(CompiledShader { handle: shader, stage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_compile_valid_vertex_shader() {
        let ctx = HeadlessContext::new();
        let src = ShaderSource::vertex("void main(){gl_Position=vec4(0,0,0,1);}");
        let shader = compile_shader(&ctx, &src).unwrap();
        assert_eq!(shader.stage(), ShaderStage::Vertex);
        assert_eq!(ctx.live_shaders(), 1);
        shader.delete(&ctx);
        assert_eq!(ctx.live_shaders(), 0);
    }

    #[test]
    fn test_missing_semicolon_fails_with_log() {
        let ctx = HeadlessContext::new();
        let src = ShaderSource::vertex("void main(){gl_Position=vec4(0,0,0,1)}");
        let err = compile_shader(&ctx, &src).unwrap_err();
        match &err {
            RenderError::ShaderCompilation { stage, log } => {
                assert_eq!(*stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.live_shaders(), 0);
    }

    #[test]
    fn test_empty_source_is_rejected_without_gpu_calls() {
        let ctx = HeadlessContext::new();
        ctx.limit_allocations(0);
        let err = compile_shader(&ctx, &ShaderSource::fragment("  \n ")).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilation { .. }));
    }

    #[test]
    fn test_creation_failure() {
        let ctx = HeadlessContext::new();
        ctx.limit_allocations(0);
        let src = ShaderSource::fragment("void main(){gl_FragColor=vec4(1,0,0,1);}");
        let err = compile_shader(&ctx, &src).unwrap_err();
        assert!(matches!(err, RenderError::ObjectCreation { object: "shader", .. }));
    }

    #[test]
    fn test_stage_from_path() {
        assert_eq!(
            stage_from_path(Path::new("assets/triangle.vertex.glsl")),
            Some(ShaderStage::Vertex)
        );
        assert_eq!(stage_from_path(Path::new("lit.FRAG")), Some(ShaderStage::Fragment));
        assert_eq!(stage_from_path(Path::new("post.fs")), Some(ShaderStage::Fragment));
        assert_eq!(stage_from_path(Path::new("common.glsl")), None);
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quad.frag");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "void main(){{gl_FragColor=vec4(1.0);}}").unwrap();

        let src = ShaderSource::from_file(&path).unwrap();
        assert_eq!(src.stage(), ShaderStage::Fragment);
        assert!(src.label().unwrap().ends_with("quad.frag"));

        let missing = ShaderSource::from_file(dir.path().join("missing.vert")).unwrap_err();
        assert!(matches!(missing, AssetError::Io { .. }));

        let unknown = ShaderSource::from_file(dir.path().join("shader.txt")).unwrap_err();
        assert!(matches!(unknown, AssetError::UnknownStage(_)));
    }
}
