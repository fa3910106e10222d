use glam::{Vec2, Vec4};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::attribute_slot;
use crate::config::ParticlesConfig;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{BufferUsage, GraphicsContext};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, LinkedProgram, Mesh, MeshDescriptor,
    ShaderSource, Surface,
};
use crate::utils::error::SketchError;

const VERTEX_SHADER: &str = r#"
attribute vec4 coords;
attribute float pointSize;

void main() {
    gl_Position = coords;
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

/// Distance from the pointer inside which particles are pushed out.
pub const REPEL_RADIUS: f32 = 0.2;
const JITTER: f32 = 0.01;

/// Advances every particle by one step: particles near the pointer are moved
/// onto the repel circle, all others drift randomly.
pub fn step_particles<R: Rng>(positions: &mut [f32], pointer: Vec2, rng: &mut R) {
    for p in positions.chunks_exact_mut(2) {
        let offset = Vec2::new(p[0], p[1]) - pointer;
        let distance = offset.length();
        if distance < REPEL_RADIUS {
            let direction = if distance > f32::EPSILON {
                offset / distance
            } else {
                Vec2::X
            };
            let pushed = pointer + direction * REPEL_RADIUS;
            p[0] = pushed.x;
            p[1] = pushed.y;
        } else {
            p[0] += rng.gen::<f32>() * JITTER - JITTER / 2.0;
            p[1] += rng.gen::<f32>() * JITTER - JITTER / 2.0;
        }
    }
}

/// A cloud of points that flee the pointer.
pub struct Particles<C: GraphicsContext> {
    config: ParticlesConfig,
    rng: ChaCha8Rng,
    positions: Vec<f32>,
    pointer: Vec2,
    point_size_slot: Option<u32>,
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Particles<C> {
    pub fn new(config: ParticlesConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            positions: Vec::new(),
            pointer: Vec2::ZERO,
            point_size_slot: None,
            program: None,
            mesh: None,
        }
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }
}

impl<C: GraphicsContext> Sketch<C> for Particles<C> {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn init(&mut self, ctx: &C, _surface: &Surface) -> Result<(), SketchError> {
        let rng = &mut self.rng;
        self.positions = (0..self.config.count * 2)
            .map(|_| rng.gen_range(-1.0..=1.0))
            .collect();

        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("particles.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("particles.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);

        let coords = attribute_slot(program, ctx, "coords", 0);
        self.point_size_slot = program.attrib_location(ctx, "pointSize");

        let layout = [AttributeDescriptor::float(coords, 2, 0, 0)];
        let desc = MeshDescriptor::new(&self.positions, &layout).with_usage(BufferUsage::Dynamic);
        self.mesh = Some(create_mesh(ctx, &desc)?);

        program.bind(ctx);
        program.set_vec4(ctx, "color", Vec4::from_array(self.config.color));
        debug!("Spawned {} particles", self.config.count);
        Ok(())
    }

    fn pointer_moved(&mut self, position: Vec2) {
        self.pointer = position;
    }

    fn frame(&mut self, ctx: &C, _time: &FrameTime) -> Result<(), SketchError> {
        let (Some(program), Some(mesh)) = (&self.program, &self.mesh) else {
            return Ok(());
        };
        step_particles(&mut self.positions, self.pointer, &mut self.rng);
        mesh.update_vertices(ctx, 0, &self.positions);

        program.bind(ctx);
        if let Some(slot) = self.point_size_slot {
            ctx.vertex_attrib_1_f32(slot, self.config.point_size);
        }
        mesh.draw(ctx, self.config.primitive);
        Ok(())
    }

    fn dispose(&mut self, ctx: &C) {
        if let Some(mesh) = self.mesh.take() {
            mesh.dispose(ctx);
        }
        if let Some(program) = self.program.take() {
            program.destroy(ctx);
        }
        self.positions.clear();
    }

    fn clear_color(&self) -> Option<[f32; 4]> {
        Some([0.0, 0.0, 1.0, 1.0])
    }
}
