use glam::{Mat4, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::attribute_slot;
use crate::config::TumbleConfig;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, LinkedProgram, Mesh, MeshDescriptor,
    ShaderSource, Surface,
};
use crate::utils::error::SketchError;

const VERTEX_SHADER: &str = r#"
attribute vec4 coords;
attribute float pointSize;
uniform mat4 transformMatrix;

void main() {
    gl_Position = transformMatrix * coords;
    gl_PointSize = pointSize;
}
"#;

const FRAGMENT_SHADER: &str = r#"
precision mediump float;
uniform vec4 color;

void main() {
    gl_FragColor = color;
}
"#;

const POINT_SIZE: f32 = 20.0;
const INK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);
/// Radians per second about x, y and z: -0.007, 0.013 and 0.01 per 60 Hz frame.
const SPIN: Vec3 = Vec3::new(-0.42, 0.78, 0.6);

/// `count` random positions inside the unit cube, rounded down to whole triangles.
pub fn random_vertices<R: Rng>(rng: &mut R, count: usize) -> Vec<f32> {
    (0..count / 3 * 9).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Random black triangles tumbling about all three axes on white.
pub struct Tumble<C: GraphicsContext> {
    config: TumbleConfig,
    rng: ChaCha8Rng,
    transform: Mat4,
    point_size_slot: Option<u32>,
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Tumble<C> {
    pub fn new(config: TumbleConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            transform: Mat4::IDENTITY,
            point_size_slot: None,
            program: None,
            mesh: None,
        }
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }
}

impl<C: GraphicsContext> Sketch<C> for Tumble<C> {
    fn name(&self) -> &'static str {
        "tumble"
    }

    fn init(&mut self, ctx: &C, _surface: &Surface) -> Result<(), SketchError> {
        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("tumble.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("tumble.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);

        let coords = attribute_slot(program, ctx, "coords", 0);
        self.point_size_slot = program.attrib_location(ctx, "pointSize");

        let vertices = random_vertices(&mut self.rng, self.config.vertex_count);
        let layout = [AttributeDescriptor::float(coords, 3, 0, 0)];
        self.mesh = Some(create_mesh(ctx, &MeshDescriptor::new(&vertices, &layout))?);

        program.bind(ctx);
        program.set_vec4(ctx, "color", INK);
        program.set_mat4(ctx, "transformMatrix", &self.transform);
        Ok(())
    }

    fn frame(&mut self, ctx: &C, time: &FrameTime) -> Result<(), SketchError> {
        let (Some(program), Some(mesh)) = (&mut self.program, &self.mesh) else {
            return Ok(());
        };
        let step = SPIN * time.dt;
        self.transform = self.transform
            * Mat4::from_rotation_x(step.x)
            * Mat4::from_rotation_y(step.y)
            * Mat4::from_rotation_z(step.z);

        program.bind(ctx);
        program.set_mat4(ctx, "transformMatrix", &self.transform);
        if let Some(slot) = self.point_size_slot {
            ctx.vertex_attrib_1_f32(slot, POINT_SIZE);
        }
        mesh.draw(ctx, Primitive::Triangles);
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
        Some([1.0, 1.0, 1.0, 1.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::UniformValue;
    use crate::gpu::HeadlessContext;
    use crate::sketches::testing::run_headless;
    use std::time::{Duration, Instant};

    fn seeded() -> TumbleConfig {
        TumbleConfig {
            seed: Some(3),
            ..TumbleConfig::default()
        }
    }

    #[test]
    fn test_vertices_fill_whole_triangles() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let vertices = random_vertices(&mut rng, 30);
        assert_eq!(vertices.len(), 90);
        assert!(vertices.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(random_vertices(&mut rng, 31).len(), 90);
        assert!(random_vertices(&mut rng, 2).is_empty());
    }

    #[test]
    fn test_frame_rotates_by_elapsed_time() {
        let ctx = HeadlessContext::new();
        let mut sketch: Tumble<HeadlessContext> = Tumble::new(seeded());
        sketch.init(&ctx, &Surface::default()).unwrap();

        let start = Instant::now();
        let mut clock = crate::frame::FrameClock::starting_at(start);
        let time = clock.tick_at(start + Duration::from_millis(100));
        sketch.frame(&ctx, &time).unwrap();

        let expected = Mat4::from_rotation_x(-0.042)
            * Mat4::from_rotation_y(0.078)
            * Mat4::from_rotation_z(0.06);
        assert!(sketch.transform().abs_diff_eq(expected, 1e-5));

        let program = sketch.program.as_ref().unwrap().handle();
        assert_eq!(
            ctx.uniform_value(program, "transformMatrix"),
            Some(UniformValue::Mat4(sketch.transform().to_cols_array()))
        );
        assert_eq!(ctx.uniform_value(program, "color"), Some(UniformValue::Vec4(INK.to_array())));
        let slot = sketch.point_size_slot.unwrap();
        assert_eq!(ctx.generic_attribute(slot).unwrap()[0], POINT_SIZE);

        let draws = ctx.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].primitive, Primitive::Triangles);
        assert_eq!(draws[0].count, 30);
        sketch.dispose(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_runs_headless() {
        let ctx = HeadlessContext::new();
        run_headless(&ctx, Box::new(Tumble::<HeadlessContext>::new(seeded())), 10);
        assert_eq!(ctx.draw_calls().len(), 11);
    }
}
