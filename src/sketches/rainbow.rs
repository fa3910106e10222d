use glam::Mat3;
use super::attribute_slot;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, LinkedProgram, Mesh, MeshDescriptor,
    ShaderSource, Surface,
};
use crate::utils::error::{RenderError, SketchError};

const VERTEX_SHADER: &str = r#"#version 300 es
in vec2 pos;
in vec3 inColor;
uniform mat3 u_matrix;
out vec3 fragColor;

void main() {
    gl_Position = vec4((u_matrix * vec3(pos.x, -pos.y, 0.0)), 1.0);
    // The upper tip keeps its colour, the rest follows the screen position.
    fragColor = gl_Position.y > 0.1 ? inColor : vec3(gl_Position.xy * 0.5 + 0.5, 0.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
in vec3 fragColor;
uniform float u_time;
out vec4 outColor;

void main() {
    float r = abs(sin(u_time * 3.0 + fragColor.r * 5.0));
    float g = abs(sin(u_time * 3.0 + fragColor.g * 5.0 + 2.0));
    float b = abs(sin(u_time * 3.0 + fragColor.b * 5.0 + 4.0));
    outColor = vec4(r, g, b, 1.0);
}
"#;

const STAR_VERTICES: usize = 48;

#[rustfmt::skip]
const STAR_POSITIONS: [f32; STAR_VERTICES * 2] = [
    -0.547, -0.785, -0.267, -0.897, -0.013, -0.804, -0.547, -0.785, -0.013, -0.804, 0.158, -0.567,
    -0.547, -0.785, 0.158, -0.567, 0.16, -0.34, -0.547, -0.785, 0.16, -0.34, 0.008, -0.131,
    0.461, 0.016, 0.779, -0.006, 0.461, 0.713, 0.008, -0.131, 0.461, 0.016, 0.461, 0.713,
    -0.547, -0.785, 0.008, -0.131, 0.461, 0.713, 0.461, 0.713, 0.003, 0.857, -0.44, 0.713,
    0.461, 0.713, -0.44, 0.713, -0.623, 0.358, 0.461, 0.713, -0.623, 0.358, -0.438, 0.012,
    0.461, 0.713, -0.438, 0.012, -0.272, -0.04, -0.547, -0.785, 0.461, 0.713, -0.272, -0.04,
    -0.547, -0.785, -0.272, -0.04, -0.552, -0.137, -0.552, -0.137, -0.794, -0.103, -0.697, -0.302,
    -0.547, -0.785, -0.552, -0.137, -0.697, -0.302, -0.697, -0.302, -0.705, -0.573, -0.547, -0.785,
];

const GOLD: [f32; 3] = [1.0, 0.85, 0.0];
const AMBER: [f32; 3] = [0.973, 0.514, 0.125];
/// Vertices of the one amber triangle.
const AMBER_RANGE: std::ops::Range<usize> = 42..45;

/// Positions followed by one RGB triple per vertex.
fn star_vertices() -> Vec<f32> {
    let mut data = Vec::with_capacity(STAR_VERTICES * 5);
    data.extend_from_slice(&STAR_POSITIONS);
    for vertex in 0..STAR_VERTICES {
        let color = if AMBER_RANGE.contains(&vertex) { AMBER } else { GOLD };
        data.extend_from_slice(&color);
    }
    data
}

/// Rotation about z by `angle`, laid out column-major.
fn rotation(angle: f32) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::from_cols_array(&[s, -c, 0.0, c, s, 0.0, 0.0, 0.0, 1.0])
}

/// A rotating star with colour cycling in the fragment shader.
pub struct Rainbow<C: GraphicsContext> {
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Rainbow<C> {
    pub fn new() -> Self {
        Self {
            program: None,
            mesh: None,
        }
    }
}

impl<C: GraphicsContext> Default for Rainbow<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GraphicsContext> Sketch<C> for Rainbow<C> {
    fn name(&self) -> &'static str {
        "rainbow"
    }

    fn init(&mut self, ctx: &C, _surface: &Surface) -> Result<(), SketchError> {
        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("rainbow.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("rainbow.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);

        let pos = attribute_slot(program, ctx, "pos", 0);
        let color = attribute_slot(program, ctx, "inColor", 1);
        let colors_offset = std::mem::size_of_val(&STAR_POSITIONS) as i32;
        let layout = [
            AttributeDescriptor::float(pos, 2, 0, 0),
            AttributeDescriptor::float(color, 3, 0, colors_offset),
        ];

        let vertices = star_vertices();
        self.mesh = Some(create_mesh(ctx, &MeshDescriptor::new(&vertices, &layout))?);

        program.bind(ctx);
        program.set_mat3(ctx, "u_matrix", &Mat3::IDENTITY);
        program.set_f32(ctx, "u_time", 0.0);
        Ok(())
    }

    fn frame(&mut self, ctx: &C, time: &FrameTime) -> Result<(), SketchError> {
        let (Some(program), Some(mesh)) = (&mut self.program, &self.mesh) else {
            return Ok(());
        };
        let t = time.elapsed;

        program.bind(ctx);
        program.set_mat3(ctx, "u_matrix", &rotation(t * 0.5));
        program.set_f32(ctx, "u_time", (t.sin() + 1.0) / 2.0);

        let error = ctx.get_error();
        if error.is_error() {
            return Err(RenderError::Gl {
                operation: "updating the rainbow uniforms",
                error,
            }
            .into());
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DemoLoop, LoopState};
    use crate::gpu::headless::UniformValue;
    use crate::gpu::{GlError, HeadlessContext};
    use crate::render::SurfaceSize;
    use std::time::{Duration, Instant};
    use crate::sketches::testing::run_headless;
    use glam::Vec3;

    #[test]
    fn test_vertex_data_layout() {
        let data = star_vertices();
        assert_eq!(data.len(), STAR_VERTICES * 5);
        let colors = &data[STAR_POSITIONS.len()..];
        assert_eq!(&colors[0..3], &GOLD);
        assert_eq!(&colors[42 * 3..43 * 3], &AMBER);
        assert_eq!(&colors[44 * 3..45 * 3], &AMBER);
        assert_eq!(&colors[45 * 3..46 * 3], &GOLD);
    }

    #[test]
    fn test_rotation_is_a_rotation() {
        let m = rotation(0.7);
        assert!((m.determinant() - 1.0).abs() < 1e-6);
        let v = m * Vec3::new(1.0, 0.0, 1.0);
        assert!((v.truncate().length() - 1.0).abs() < 1e-6);
        assert_eq!(v.z, 1.0);
    }

    #[test]
    fn test_draws_whole_star_each_frame() {
        let ctx = HeadlessContext::new();
        let mut sketch: Rainbow<HeadlessContext> = Rainbow::new();
        sketch.init(&ctx, &Surface::default()).unwrap();
        let program = sketch.program.as_ref().unwrap().handle();

        let time = crate::frame::FrameClock::new().tick();
        sketch.frame(&ctx, &time).unwrap();
        let draws = ctx.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, STAR_VERTICES as i32);

        let expected = (time.elapsed.sin() + 1.0) / 2.0;
        assert_eq!(ctx.uniform_value(program, "u_time"), Some(UniformValue::Float(expected)));
        sketch.dispose(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_gl_error_skips_the_draw_and_fails_the_frame() {
        let ctx = HeadlessContext::new();
        let mut sketch: Rainbow<HeadlessContext> = Rainbow::new();
        sketch.init(&ctx, &Surface::default()).unwrap();

        // Any error raised before the draw counts against the frame.
        ctx.viewport(0, 0, -1, 1);
        let time = crate::frame::FrameClock::new().tick();
        let err = sketch.frame(&ctx, &time).unwrap_err();
        assert!(matches!(
            err,
            SketchError::Render(RenderError::Gl {
                error: GlError::InvalidValue,
                ..
            })
        ));
        assert!(ctx.draw_calls().is_empty());
        sketch.dispose(&ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_gl_error_ends_the_demo_loop() {
        let ctx = HeadlessContext::new();
        let mut demo = DemoLoop::new(
            Box::new(Rainbow::<HeadlessContext>::new()),
            SurfaceSize::new(640, 480),
        );
        let t0 = Instant::now();
        demo.start_at(&ctx, t0).unwrap();
        demo.frame_at(&ctx, t0 + Duration::from_millis(16)).unwrap();

        ctx.viewport(0, 0, 640, -480);
        assert!(demo.frame_at(&ctx, t0 + Duration::from_millis(32)).is_err());
        assert_eq!(demo.state(), LoopState::Stopped);
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert_eq!(ctx.draw_calls().len(), 1);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_runs_headless() {
        let ctx = HeadlessContext::new();
        run_headless(&ctx, Box::new(Rainbow::<HeadlessContext>::new()), 10);
        assert_eq!(ctx.draw_calls().len(), 11);
    }
}
