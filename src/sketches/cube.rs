use glam::{Mat4, Vec3};

use super::attribute_slot;
use crate::frame::{FrameTime, Sketch};
use crate::gpu::{Capability, GraphicsContext, Primitive};
use crate::render::{
    create_mesh, create_program, AttributeDescriptor, Indices, LinkedProgram, Mesh,
    MeshDescriptor, ShaderSource, Surface,
};
use crate::utils::error::SketchError;

const VERTEX_SHADER: &str = r#"
attribute vec4 coords;
attribute vec3 normal;
uniform mat4 transformMatrix;
uniform mat4 perspectiveMatrix;
uniform vec3 lightColor;
uniform vec3 lightDirection;
varying vec4 varyingColors;

void main() {
    vec3 norm = normalize(normal);
    vec3 ld = normalize(lightDirection);
    float dotProduct = max(dot(norm, ld), 0.0);
    vec3 vertexColor = lightColor * vec3(1, 1, 0) * dotProduct;
    varyingColors = vec4(vertexColor, 1.0);
    gl_Position = perspectiveMatrix * transformMatrix * coords;
}
"#;

const FRAGMENT_SHADER: &str = r#"
precision mediump float;
varying vec4 varyingColors;

void main() {
    gl_FragColor = varyingColors;
}
"#;

const CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
];

#[rustfmt::skip]
const INDICES: [u16; 36] = [
    0, 1, 2, 1, 2, 3,
    2, 3, 4, 3, 4, 5,
    4, 5, 6, 5, 6, 7,
    6, 7, 0, 7, 0, 1,
    0, 2, 6, 2, 6, 4,
    1, 3, 7, 3, 7, 5,
];

const FLOATS_PER_VERTEX: usize = 6;
const STRIDE: i32 = (FLOATS_PER_VERTEX * 4) as i32;

const LIGHT_COLOR: Vec3 = Vec3::new(1.0, 1.0, 1.0);
const LIGHT_DIRECTION: Vec3 = Vec3::new(0.5, 1.0, 0.1);
const FIELD_OF_VIEW: f32 = 1.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 11.0;
const DISTANCE: f32 = 4.0;
/// Radians per second about x, y and z.
const SPIN: Vec3 = Vec3::new(0.24, 0.6, 0.42);

/// Interleaved position + normal, the normal being the normalized corner.
fn cube_vertices() -> Vec<f32> {
    CORNERS
        .iter()
        .flat_map(|&corner| {
            let n = Vec3::from_array(corner).normalize();
            [corner[0], corner[1], corner[2], n.x, n.y, n.z]
        })
        .collect()
}

fn perspective(aspect: f32) -> Mat4 {
    Mat4::perspective_rh_gl(FIELD_OF_VIEW, aspect, NEAR, FAR)
}

/// A yellow-lit cube tumbling in front of the camera.
pub struct Cube<C: GraphicsContext> {
    transform: Mat4,
    program: Option<LinkedProgram<C>>,
    mesh: Option<Mesh<C>>,
}

impl<C: GraphicsContext> Cube<C> {
    pub fn new() -> Self {
        Self {
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -DISTANCE)),
            program: None,
            mesh: None,
        }
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }
}

impl<C: GraphicsContext> Default for Cube<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GraphicsContext> Sketch<C> for Cube<C> {
    fn name(&self) -> &'static str {
        "cube"
    }

    fn init(&mut self, ctx: &C, surface: &Surface) -> Result<(), SketchError> {
        let vertex = ShaderSource::vertex(VERTEX_SHADER).with_label("cube.vert");
        let fragment = ShaderSource::fragment(FRAGMENT_SHADER).with_label("cube.frag");
        let program = self.program.insert(create_program(ctx, &vertex, &fragment)?);

        let coords = attribute_slot(program, ctx, "coords", 0);
        let normal = attribute_slot(program, ctx, "normal", 1);
        let layout = [
            AttributeDescriptor::float(coords, 3, STRIDE, 0),
            AttributeDescriptor::float(normal, 3, STRIDE, 12),
        ];
        let vertices = cube_vertices();
        let desc = MeshDescriptor::new(&vertices, &layout).with_indices(Indices::U16(&INDICES));
        self.mesh = Some(create_mesh(ctx, &desc)?);

        program.bind(ctx);
        program.set_vec3(ctx, "lightColor", LIGHT_COLOR);
        program.set_vec3(ctx, "lightDirection", LIGHT_DIRECTION);
        program.set_mat4(ctx, "perspectiveMatrix", &perspective(surface.size().aspect()));
        ctx.enable(Capability::DepthTest);
        Ok(())
    }

    fn resize(&mut self, ctx: &C, surface: &Surface) {
        if let Some(program) = &mut self.program {
            program.bind(ctx);
            program.set_mat4(ctx, "perspectiveMatrix", &perspective(surface.size().aspect()));
        }
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
        ctx.disable(Capability::DepthTest);
    }
}
