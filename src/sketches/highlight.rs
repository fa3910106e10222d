use glam::Mat4;
use log::debug;

use super::attribute_slot;
use crate::gpu::{BlendFactor, Capability, GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, CustomLayer, Disposable, LinkedProgram,
    Mesh, MeshDescriptor, MercatorCoordinate, ShaderSource,
};
use crate::utils::error::RenderError;

const VERTEX_SHADER: &str = r#"#version 300 es
uniform mat4 u_matrix;
in vec2 a_pos;

void main() {
    gl_Position = u_matrix * vec4(a_pos, 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
out vec4 outColor;

void main() {
    outColor = vec4(1.0, 0.0, 0.0, 1.0);
}
"#;

/// Longitude/latitude of Helsinki, Berlin and Kyiv.
pub const CITIES: [(f64, f64); 3] = [(25.004, 60.239), (13.403, 52.562), (30.498, 50.541)];

fn route_vertices() -> Vec<f32> {
    CITIES
        .iter()
        .flat_map(|&(lng, lat)| {
            let point = MercatorCoordinate::from_lng_lat(lng, lat, 0.0);
            [point.x as f32, point.y as f32]
        })
        .collect()
}

/// Draws a red line through three cities on top of a map.
pub struct HighlightLayer<C: GraphicsContext> {
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> HighlightLayer<C> {
    pub fn new() -> Self {
        Self {
            program: None,
            mesh: None,
        }
    }

    pub fn is_added(&self) -> bool {
        self.program.is_some() && self.mesh.is_some()
    }
}

impl<C: GraphicsContext> Default for HighlightLayer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GraphicsContext> CustomLayer<C> for HighlightLayer<C> {
    fn on_add(&mut self, ctx: &C) -> Result<(), RenderError> {
        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("highlight.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("highlight.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);

        let slot = attribute_slot(program, ctx, "a_pos", 0);
        let layout = [AttributeDescriptor::float(slot, 2, 0, 0)];
        let vertices = route_vertices();
        self.mesh = Some(create_mesh(ctx, &MeshDescriptor::new(&vertices, &layout))?);
        debug!("Highlight layer added with {} points", CITIES.len());
        Ok(())
    }

    fn render(&mut self, ctx: &C, matrix: &Mat4) {
        let (Some(program), Some(mesh)) = (&mut self.program, &self.mesh) else {
            return;
        };
        program.bind(ctx);
        program.set_mat4(ctx, "u_matrix", matrix);
        ctx.enable(Capability::Blend);
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        mesh.draw(ctx, Primitive::LineStrip);
    }
}

impl<C: GraphicsContext> Disposable<C> for HighlightLayer<C> {
    fn dispose(&mut self, ctx: &C) {
        if let Some(mesh) = self.mesh.take() {
            mesh.dispose(ctx);
        }
        if let Some(program) = self.program.take() {
            program.destroy(ctx);
        }
        ctx.disable(Capability::Blend);
    }
}
