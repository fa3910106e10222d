//! Graphics context abstraction
//!
//! [`GraphicsContext`] is the slice of the GL API the sketches and the render
//! helpers rely on. It is implemented for `glow::Context` and for the
//! CPU-side [`HeadlessContext`] used by tests and `--headless` runs.

pub mod glow_backend;
pub mod headless;
pub mod types;

use std::fmt::Debug;

pub use headless::HeadlessContext;
pub use types::{
    BlendFactor, BufferTarget, BufferUsage, Capability, ClearFlags, ComponentType, GlError,
    IndexType, Primitive, ShaderStage,
};

/// Single-threaded graphics context with GL object semantics.
///
/// Handles are plain copyable names; ownership and release are the caller's
/// responsibility. Creation calls return `Err` with the driver's message when
/// the object cannot be allocated.
pub trait GraphicsContext {
    type Shader: Copy + Debug;
    type Program: Copy + Debug;
    type Buffer: Copy + Debug;
    type VertexArray: Copy + Debug;
    type UniformLocation: Clone + Debug;

    fn backend_name(&self) -> &'static str;

    // Shaders
    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    // Programs
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    // Uniforms, applied to the program currently in use
    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32);
    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32);
    fn uniform_3_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32);
    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    );
    fn uniform_matrix_3_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 9]);
    fn uniform_matrix_4_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 16]);

    // Buffers
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&self, target: BufferTarget, offset: i32, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    // Vertex arrays
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);
    fn enable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        component_type: ComponentType,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_1_f32(&self, index: u32, x: f32);

    // Fixed-function state and drawing
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, flags: ClearFlags);
    fn enable(&self, capability: Capability);
    fn disable(&self, capability: Capability);
    fn blend_func(&self, src: BlendFactor, dst: BlendFactor);
    fn draw_arrays(&self, primitive: Primitive, first: i32, count: i32);
    fn draw_elements(&self, primitive: Primitive, count: i32, index_type: IndexType, offset: i32);

    /// Returns and clears the sticky error flag.
    fn get_error(&self) -> GlError;
}
