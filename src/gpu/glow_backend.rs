use glow::HasContext;

use super::{
    BlendFactor, BufferTarget, BufferUsage, Capability, ClearFlags, ComponentType, GlError,
    GraphicsContext, IndexType, Primitive, ShaderStage,
};

/// Maps the crate's typed enums onto GL enumerants.
trait GlEnum {
    fn gl(self) -> u32;
}

impl GlEnum for ShaderStage {
    fn gl(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl GlEnum for BufferTarget {
    fn gl(self) -> u32 {
        match self {
            Self::Array => glow::ARRAY_BUFFER,
            Self::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        }
    }
}

impl GlEnum for BufferUsage {
    fn gl(self) -> u32 {
        match self {
            Self::Static => glow::STATIC_DRAW,
            Self::Dynamic => glow::DYNAMIC_DRAW,
        }
    }
}

impl GlEnum for ComponentType {
    fn gl(self) -> u32 {
        match self {
            Self::Float => glow::FLOAT,
            Self::Byte => glow::BYTE,
            Self::UnsignedByte => glow::UNSIGNED_BYTE,
            Self::Short => glow::SHORT,
            Self::UnsignedShort => glow::UNSIGNED_SHORT,
        }
    }
}

impl GlEnum for IndexType {
    fn gl(self) -> u32 {
        match self {
            Self::U16 => glow::UNSIGNED_SHORT,
            Self::U32 => glow::UNSIGNED_INT,
        }
    }
}

impl GlEnum for Primitive {
    fn gl(self) -> u32 {
        match self {
            Self::Points => glow::POINTS,
            Self::Lines => glow::LINES,
            Self::LineStrip => glow::LINE_STRIP,
            Self::LineLoop => glow::LINE_LOOP,
            Self::Triangles => glow::TRIANGLES,
            Self::TriangleStrip => glow::TRIANGLE_STRIP,
            Self::TriangleFan => glow::TRIANGLE_FAN,
        }
    }
}

impl GlEnum for Capability {
    fn gl(self) -> u32 {
        match self {
            Self::Blend => glow::BLEND,
            Self::DepthTest => glow::DEPTH_TEST,
            Self::CullFace => glow::CULL_FACE,
        }
    }
}

impl GlEnum for BlendFactor {
    fn gl(self) -> u32 {
        match self {
            Self::Zero => glow::ZERO,
            Self::One => glow::ONE,
            Self::SrcAlpha => glow::SRC_ALPHA,
            Self::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        }
    }
}

impl GlEnum for ClearFlags {
    fn gl(self) -> u32 {
        let mut mask = 0;
        if self.contains(ClearFlags::COLOR) {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if self.contains(ClearFlags::DEPTH) {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if self.contains(ClearFlags::STENCIL) {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        mask
    }
}

fn gl_error(code: u32) -> GlError {
    match code {
        glow::NO_ERROR => GlError::NoError,
        glow::INVALID_ENUM => GlError::InvalidEnum,
        glow::INVALID_VALUE => GlError::InvalidValue,
        glow::INVALID_OPERATION => GlError::InvalidOperation,
        glow::INVALID_FRAMEBUFFER_OPERATION => GlError::InvalidFramebufferOperation,
        glow::OUT_OF_MEMORY => GlError::OutOfMemory,
        other => GlError::Other(other),
    }
}

// Every call below forwards to the loaded GL entry points. The context must be
// current on the calling thread, which the window runtime guarantees for the
// lifetime of the event loop.
impl GraphicsContext for glow::Context {
    type Shader = glow::NativeShader;
    type Program = glow::NativeProgram;
    type Buffer = glow::NativeBuffer;
    type VertexArray = glow::NativeVertexArray;
    type UniformLocation = glow::NativeUniformLocation;

    fn backend_name(&self) -> &'static str {
        "OpenGL (glow)"
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { HasContext::create_shader(self, stage.gl()) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32) {
        unsafe { HasContext::uniform_1_f32(self, location, x) }
    }

    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        unsafe { HasContext::uniform_2_f32(self, location, x, y) }
    }

    fn uniform_3_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32) {
        unsafe { HasContext::uniform_3_f32(self, location, x, y, z) }
    }

    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        unsafe { HasContext::uniform_4_f32(self, location, x, y, z, w) }
    }

    fn uniform_matrix_3_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 9]) {
        unsafe { self.uniform_matrix_3_f32_slice(location, false, values) }
    }

    fn uniform_matrix_4_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 16]) {
        unsafe { self.uniform_matrix_4_f32_slice(location, false, values) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target.gl(), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        unsafe { self.buffer_data_u8_slice(target.gl(), data, usage.gl()) }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: i32, data: &[u8]) {
        unsafe { self.buffer_sub_data_u8_slice(target.gl(), offset, data) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        component_type: ComponentType,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.vertex_attrib_pointer_f32(
                index,
                size,
                component_type.gl(),
                normalized,
                stride,
                offset,
            )
        }
    }

    fn vertex_attrib_1_f32(&self, index: u32, x: f32) {
        unsafe { HasContext::vertex_attrib_1_f32(self, index, x) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { HasContext::clear_color(self, r, g, b, a) }
    }

    fn clear(&self, flags: ClearFlags) {
        unsafe { HasContext::clear(self, flags.gl()) }
    }

    fn enable(&self, capability: Capability) {
        unsafe { HasContext::enable(self, capability.gl()) }
    }

    fn disable(&self, capability: Capability) {
        unsafe { HasContext::disable(self, capability.gl()) }
    }

    fn blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        unsafe { HasContext::blend_func(self, src.gl(), dst.gl()) }
    }

    fn draw_arrays(&self, primitive: Primitive, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, primitive.gl(), first, count) }
    }

    fn draw_elements(&self, primitive: Primitive, count: i32, index_type: IndexType, offset: i32) {
        unsafe { HasContext::draw_elements(self, primitive.gl(), count, index_type.gl(), offset) }
    }

    fn get_error(&self) -> GlError {
        gl_error(unsafe { HasContext::get_error(self) })
    }
}
