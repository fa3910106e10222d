use glam::{Vec2, Vec4};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::attribute_slot;
use crate::config::RectanglesConfig;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{BufferUsage, GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, LinkedProgram, Mesh, MeshDescriptor,
    ShaderSource, Surface,
};
use crate::utils::error::SketchError;

const VERTEX_SHADER: &str = r#"
attribute vec2 a_position;
uniform vec2 u_resolution;

void main() {
    // Pixels to clip space, origin at the top left.
    vec2 clipSpace = a_position / u_resolution * 2.0 - 1.0;
    gl_Position = vec4(clipSpace * vec2(1.0, -1.0), 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"
precision mediump float;
uniform vec4 u_color;

void main() {
    gl_FragColor = u_color;
}
"#;

const FLOATS_PER_RECT: usize = 12;
const VERTICES_PER_RECT: usize = 6;

/// Axis-aligned rectangle in drawing-buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Vec4,
}

impl Rect {
    /// Corner and size drawn from `0..max_extent`, opaque random colour.
    pub fn random<R: Rng>(rng: &mut R, max_extent: u32) -> Self {
        let max_extent = max_extent.max(1);
        let mut pixels = || rng.gen_range(0..max_extent) as f32;
        let (x, y, width, height) = (pixels(), pixels(), pixels(), pixels());
        Self {
            x,
            y,
            width,
            height,
            color: Vec4::new(rng.gen(), rng.gen(), rng.gen(), 1.0),
        }
    }

    /// Two triangles covering the rectangle.
    pub fn triangles(&self) -> [f32; FLOATS_PER_RECT] {
        let (x1, y1) = (self.x, self.y);
        let (x2, y2) = (self.x + self.width, self.y + self.height);
        [x1, y1, x2, y1, x1, y2, x1, y2, x2, y1, x2, y2]
    }
}

/// Solid rectangles in pixel space, scattered anew whenever the pointer moves.
pub struct Rectangles<C: GraphicsContext> {
    config: RectanglesConfig,
    rng: ChaCha8Rng,
    rects: Vec<Rect>,
    scatter_pending: bool,
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Rectangles<C> {
    pub fn new(config: RectanglesConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            rects: Vec::new(),
            scatter_pending: false,
            program: None,
            mesh: None,
        }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    fn scatter(&mut self) -> Vec<f32> {
        let rng = &mut self.rng;
        let max_extent = self.config.max_extent;
        self.rects = (0..self.config.per_move)
            .map(|_| Rect::random(rng, max_extent))
            .collect();
        self.rects.iter().flat_map(Rect::triangles).collect()
    }

    fn set_resolution(&mut self, ctx: &C, surface: &Surface) {
        if let Some(program) = &mut self.program {
            let size = surface.size();
            let resolution = Vec2::new(size.width as f32, size.height as f32);
            program.bind(ctx);
            program.set_vec2(ctx, "u_resolution", resolution);
        }
    }
}

impl<C: GraphicsContext> Sketch<C> for Rectangles<C> {
    fn name(&self) -> &'static str {
        "rectangles"
    }

    fn init(&mut self, ctx: &C, surface: &Surface) -> Result<(), SketchError> {
        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("rectangles.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("rectangles.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);
        let position = attribute_slot(program, ctx, "a_position", 0);

        let vertices = self.scatter();
        let layout = [AttributeDescriptor::float(position, 2, 0, 0)];
        let desc = MeshDescriptor::new(&vertices, &layout).with_usage(BufferUsage::Dynamic);
        self.mesh = Some(create_mesh(ctx, &desc)?);

        self.set_resolution(ctx, surface);
        Ok(())
    }

    fn resize(&mut self, ctx: &C, surface: &Surface) {
        self.set_resolution(ctx, surface);
    }

    fn pointer_moved(&mut self, _position: Vec2) {
        self.scatter_pending = true;
    }

    fn frame(&mut self, ctx: &C, _time: &FrameTime) -> Result<(), SketchError> {
        if self.scatter_pending {
            self.scatter_pending = false;
            let vertices = self.scatter();
            if let Some(mesh) = &self.mesh {
                mesh.update_vertices(ctx, 0, &vertices);
            }
            debug!("Scattered {} rectangles", self.rects.len());
        }

        let (Some(program), Some(mesh)) = (&mut self.program, &self.mesh) else {
            return Ok(());
        };
        program.bind(ctx);
        for (i, rect) in self.rects.iter().enumerate() {
            program.set_vec4(ctx, "u_color", rect.color);
            mesh.draw_range(ctx, Primitive::Triangles, i * VERTICES_PER_RECT, VERTICES_PER_RECT);
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
        self.rects.clear();
    }

    fn clear_color(&self) -> Option<[f32; 4]> {
        Some([0.0, 0.0, 0.0, 0.0])
    }
}
