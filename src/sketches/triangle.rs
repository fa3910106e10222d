use std::path::PathBuf;

use log::info;

use super::attribute_slot;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, LinkedProgram, Mesh, MeshDescriptor,
    ShaderSource, Surface,
};
use crate::utils::error::SketchError;

pub const VERTEX_FILE: &str = "triangle.vertex.glsl";
pub const FRAGMENT_FILE: &str = "triangle.fragment.glsl";

const POSITIONS: [f32; 6] = [0.0, 0.0, 0.0, 0.5, 0.7, 0.0];

/// A single flat triangle whose shaders are read from disk.
pub struct Triangle<C: GraphicsContext> {
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Triangle<C> {
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
            program: None,
            mesh: None,
        }
    }
}

impl<C: GraphicsContext> Sketch<C> for Triangle<C> {
    fn name(&self) -> &'static str {
        "triangle"
    }

    fn init(&mut self, ctx: &C, _surface: &Surface) -> Result<(), SketchError> {
        let vertex = ShaderSource::from_file(&self.vertex_path)?;
        let fragment = ShaderSource::from_file(&self.fragment_path)?;
        info!(
            "Loaded {} and {}",
            self.vertex_path.display(),
            self.fragment_path.display()
        );

        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);
        let slot = attribute_slot(program, ctx, "a_position", 0);

        let layout = [AttributeDescriptor::float(slot, 2, 0, 0)];
        self.mesh = Some(create_mesh(ctx, &MeshDescriptor::new(&POSITIONS, &layout))?);
        Ok(())
    }

    fn frame(&mut self, ctx: &C, _time: &FrameTime) -> Result<(), SketchError> {
        if let (Some(program), Some(mesh)) = (&self.program, &self.mesh) {
            program.bind(ctx);
            mesh.draw(ctx, Primitive::Triangles);
        }
        Ok(())
    }

    fn dispose(&mut self, ctx: &C) {
        if let Some(mesh) = self.mesh.take() {
            mesh.dispose(ctx);
        }
        if let Some(program) = self.program.take() {
            program.destroy(ctx);
        }
    }

    fn clear_color(&self) -> Option<[f32; 4]> {
        Some([0.0, 0.0, 0.0, 0.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessContext;
    use crate::sketches::testing::run_headless;
    use crate::utils::error::AssetError;
    use std::fs;
    use tempfile::tempdir;

    fn bundled(file: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("assets/shaders")
            .join(file)
    }

    #[test]
    fn test_bundled_shaders_draw() {
        let ctx = HeadlessContext::new();
        let sketch: Triangle<HeadlessContext> =
            Triangle::new(bundled(VERTEX_FILE), bundled(FRAGMENT_FILE));
        run_headless(&ctx, Box::new(sketch), 4);

        let draws = ctx.draw_calls();
        assert_eq!(draws.len(), 5);
        assert!(draws
            .iter()
            .all(|d| d.primitive == Primitive::Triangles && d.count == 3));
    }

    #[test]
    fn test_missing_shader_file_fails_init() {
        let ctx = HeadlessContext::new();
        let dir = tempdir().unwrap();
        let mut sketch: Triangle<HeadlessContext> =
            Triangle::new(dir.path().join("a.vertex.glsl"), bundled(FRAGMENT_FILE));

        let err = sketch.init(&ctx, &Surface::default()).unwrap_err();
        assert!(matches!(err, SketchError::Asset(AssetError::Io { .. })));
        sketch.dispose(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_broken_shader_file_fails_init() {
        let ctx = HeadlessContext::new();
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.fragment.glsl");
        fs::write(&path, "void main() { gl_FragColor = vec4(1.0) }").unwrap();
        let mut sketch = Triangle::<HeadlessContext>::new(bundled(VERTEX_FILE), path);

        let err = sketch.init(&ctx, &Surface::default()).unwrap_err();
        assert!(matches!(err, SketchError::Render(_)));
        sketch.dispose(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }
}
