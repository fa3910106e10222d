//! CPU-side graphics context.
//!
//! `HeadlessContext` keeps the bookkeeping a GL driver would: object names,
//! bind points, the vertex array state and a sticky error flag. Shaders are
//! checked by [`glsl::check`] and programs are linked by matching stage
//! interfaces. Draw calls are validated against the bound buffers and recorded
//! instead of rasterized, which lets sketches run without a window.

pub mod glsl;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use log::trace;

use self::glsl::{DeclKind, ShaderInterface};
use super::{
    BlendFactor, BufferTarget, BufferUsage, Capability, ClearFlags, ComponentType, GlError,
    GraphicsContext, IndexType, Primitive, ShaderStage,
};

/// Number of generic vertex attribute slots.
pub const MAX_VERTEX_ATTRIBS: u32 = 16;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(HeadlessShader);
handle!(HeadlessProgram);
handle!(HeadlessBuffer);
handle!(HeadlessVertexArray);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadlessUniformLocation {
    program: u32,
    index: usize,
}

/// Last value written to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl UniformValue {
    fn glsl_type(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::Mat3(_) => "mat3",
            Self::Mat4(_) => "mat4",
        }
    }
}

/// A validated draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub primitive: Primitive,
    pub first: i32,
    pub count: i32,
    pub index_type: Option<IndexType>,
    pub program: HeadlessProgram,
    pub vertex_array: Option<HeadlessVertexArray>,
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    interface: Option<ShaderInterface>,
    info_log: String,
    attachments: u32,
    delete_pending: bool,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: bool,
    info_log: String,
    attributes: HashMap<String, u32>,
    uniforms: Vec<(String, String)>,
    values: HashMap<usize, UniformValue>,
}

struct BufferObject {
    data: Vec<u8>,
    usage: BufferUsage,
}

#[derive(Debug, Clone, Copy)]
struct AttribPointer {
    buffer: u32,
    size: i32,
    component_type: ComponentType,
    stride: i32,
    offset: i32,
}

#[derive(Default)]
struct VertexArrayObject {
    element_buffer: Option<u32>,
    pointers: HashMap<u32, AttribPointer>,
    enabled: HashSet<u32>,
}

struct State {
    next_id: u32,
    allocation_budget: Option<usize>,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, BufferObject>,
    // Key 0 is the default vertex array.
    vertex_arrays: HashMap<u32, VertexArrayObject>,
    array_buffer: Option<u32>,
    vertex_array: u32,
    current_program: Option<u32>,
    generic_attributes: [[f32; 4]; MAX_VERTEX_ATTRIBS as usize],
    viewport: [i32; 4],
    clear_color: [f32; 4],
    clears: usize,
    capabilities: HashSet<Capability>,
    blend: (BlendFactor, BlendFactor),
    draw_calls: Vec<DrawCall>,
    error: GlError,
}

impl State {
    fn new() -> Self {
        let mut vertex_arrays = HashMap::new();
        vertex_arrays.insert(0, VertexArrayObject::default());
        Self {
            next_id: 1,
            allocation_budget: None,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays,
            array_buffer: None,
            vertex_array: 0,
            current_program: None,
            generic_attributes: [[0.0, 0.0, 0.0, 1.0]; MAX_VERTEX_ATTRIBS as usize],
            viewport: [0; 4],
            clear_color: [0.0; 4],
            clears: 0,
            capabilities: HashSet::new(),
            blend: (BlendFactor::One, BlendFactor::Zero),
            draw_calls: Vec::new(),
            error: GlError::NoError,
        }
    }

    /// Records `error` unless an earlier one is still pending.
    fn flag(&mut self, error: GlError, what: &str) {
        trace!("headless: {error} in {what}");
        if !self.error.is_error() {
            self.error = error;
        }
    }

    fn allocate(&mut self, kind: &str) -> Result<u32, String> {
        if let Some(budget) = self.allocation_budget.as_mut() {
            if *budget == 0 {
                return Err(format!("out of memory while creating {kind}"));
            }
            *budget -= 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        trace!("headless: create {kind} {id}");
        Ok(id)
    }

    fn release_shader_if_orphaned(&mut self, id: u32) {
        let orphaned = self
            .shaders
            .get(&id)
            .is_some_and(|s| s.delete_pending && s.attachments == 0);
        if orphaned {
            self.shaders.remove(&id);
            trace!("headless: shader {id} released");
        }
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<u32> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self
                .vertex_arrays
                .get(&self.vertex_array)
                .and_then(|vao| vao.element_buffer),
        }
    }

    fn linked_current_program(&mut self, what: &str) -> Option<u32> {
        match self.current_program {
            Some(id) if self.programs.get(&id).is_some_and(|p| p.linked) => Some(id),
            _ => {
                self.flag(GlError::InvalidOperation, what);
                None
            }
        }
    }

    /// Checks that every enabled attribute can supply `vertices` vertices.
    fn attributes_cover(&self, vertices: u64) -> bool {
        if vertices == 0 {
            return true;
        }
        let Some(vao) = self.vertex_arrays.get(&self.vertex_array) else {
            return false;
        };
        vao.enabled.iter().all(|index| {
            let Some(pointer) = vao.pointers.get(index) else {
                return false;
            };
            let Some(buffer) = self.buffers.get(&pointer.buffer) else {
                return false;
            };
            let element = (pointer.size * pointer.component_type.size_bytes()) as u64;
            let stride = if pointer.stride == 0 {
                element
            } else {
                pointer.stride as u64
            };
            pointer.offset as u64 + (vertices - 1) * stride + element <= buffer.data.len() as u64
        })
    }

    fn set_uniform(&mut self, location: Option<&HeadlessUniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let Some(program_id) = self.linked_current_program("uniform") else {
            return;
        };
        if location.program != program_id {
            self.flag(GlError::InvalidOperation, "uniform (location of another program)");
            return;
        }
        let Some(program) = self.programs.get_mut(&program_id) else {
            return;
        };
        let declared = program.uniforms.get(location.index).map(|(_, ty)| ty.as_str());
        if declared != Some(value.glsl_type()) {
            self.flag(GlError::InvalidOperation, "uniform (type mismatch)");
            return;
        }
        program.values.insert(location.index, value);
    }
}

/// Graphics context without a GPU.
///
/// Interior mutability keeps the `&self` signatures of [`GraphicsContext`];
/// the context is single-threaded like a real GL context.
pub struct HeadlessContext {
    state: RefCell<State>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
        }
    }

    /// Lets the next `n` object creations succeed and fails every one after.
    pub fn limit_allocations(&self, n: usize) {
        self.state.borrow_mut().allocation_budget = Some(n);
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len() - 1
    }

    pub fn live_objects(&self) -> usize {
        self.live_shaders() + self.live_programs() + self.live_buffers() + self.live_vertex_arrays()
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draw_calls.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    pub fn current_viewport(&self) -> [i32; 4] {
        self.state.borrow().viewport
    }

    pub fn current_clear_color(&self) -> [f32; 4] {
        self.state.borrow().clear_color
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.state.borrow().capabilities.contains(&capability)
    }

    pub fn current_blend_func(&self) -> (BlendFactor, BlendFactor) {
        self.state.borrow().blend
    }

    pub fn current_program(&self) -> Option<HeadlessProgram> {
        self.state.borrow().current_program.map(HeadlessProgram)
    }

    pub fn buffer_contents(&self, buffer: HeadlessBuffer) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer.0).map(|b| b.data.clone())
    }

    pub fn buffer_usage(&self, buffer: HeadlessBuffer) -> Option<BufferUsage> {
        self.state.borrow().buffers.get(&buffer.0).map(|b| b.usage)
    }

    pub fn generic_attribute(&self, index: u32) -> Option<[f32; 4]> {
        self.state
            .borrow()
            .generic_attributes
            .get(index as usize)
            .copied()
    }

    /// Last value written to the named uniform of `program`.
    pub fn uniform_value(&self, program: HeadlessProgram, name: &str) -> Option<UniformValue> {
        let state = self.state.borrow();
        let program = state.programs.get(&program.0)?;
        let index = program.uniforms.iter().position(|(n, _)| n == name)?;
        program.values.get(&index).copied()
    }
}

/// Resolves the attribute slots and uniform table of a vertex/fragment pair.
fn link_interfaces(
    vertex: &ShaderInterface,
    fragment: &ShaderInterface,
) -> Result<(HashMap<String, u32>, Vec<(String, String)>), String> {
    if vertex.version != fragment.version {
        return Err(format!(
            "ERROR: Versions of linked shaders differ ({} and {}).",
            vertex.version, fragment.version
        ));
    }

    for input in fragment.of_kind(DeclKind::Input) {
        match vertex.of_kind(DeclKind::Output).find(|o| o.name == input.name) {
            None => {
                return Err(format!(
                    "ERROR: Fragment input '{}' is not written by the vertex shader.",
                    input.name
                ))
            }
            Some(output) if output.ty != input.ty => {
                return Err(format!(
                    "ERROR: Type of '{}' differs between shaders ({} and {}).",
                    input.name, output.ty, input.ty
                ))
            }
            Some(_) => {}
        }
    }

    let mut uniforms: Vec<(String, String)> = Vec::new();
    for uniform in vertex
        .of_kind(DeclKind::Uniform)
        .chain(fragment.of_kind(DeclKind::Uniform))
    {
        match uniforms.iter().find(|(name, _)| *name == uniform.name) {
            Some((_, ty)) if *ty != uniform.ty => {
                return Err(format!(
                    "ERROR: Uniform '{}' declared with different types ({} and {}).",
                    uniform.name, ty, uniform.ty
                ))
            }
            Some(_) => {}
            None => uniforms.push((uniform.name.clone(), uniform.ty.clone())),
        }
    }

    let mut used = [false; MAX_VERTEX_ATTRIBS as usize];
    let mut attributes = HashMap::new();
    let (explicit, implicit): (Vec<_>, Vec<_>) = vertex
        .of_kind(DeclKind::Attribute)
        .partition(|a| a.location.is_some());

    for attribute in explicit {
        let start = attribute.location.unwrap_or_default();
        let slots = glsl::attribute_slots(&attribute.ty);
        if start + slots > MAX_VERTEX_ATTRIBS {
            return Err(format!(
                "ERROR: Attribute '{}' location {start} exceeds the {MAX_VERTEX_ATTRIBS} available slots.",
                attribute.name
            ));
        }
        for slot in start..start + slots {
            if std::mem::replace(&mut used[slot as usize], true) {
                return Err(format!(
                    "ERROR: Attribute '{}' overlaps location {slot}.",
                    attribute.name
                ));
            }
        }
        attributes.insert(attribute.name.clone(), start);
    }

    for attribute in implicit {
        let slots = glsl::attribute_slots(&attribute.ty) as usize;
        let start = (0..=used.len().saturating_sub(slots))
            .find(|&s| used[s..s + slots].iter().all(|u| !u))
            .ok_or_else(|| {
                format!(
                    "ERROR: Too many vertex attributes, '{}' does not fit.",
                    attribute.name
                )
            })?;
        used[start..start + slots].iter_mut().for_each(|u| *u = true);
        attributes.insert(attribute.name.clone(), start as u32);
    }

    Ok((attributes, uniforms))
}

fn read_indices(bytes: &[u8], index_type: IndexType) -> impl Iterator<Item = u32> + '_ {
    let width = index_type.size_bytes() as usize;
    bytes.chunks_exact(width).map(move |chunk| match index_type {
        IndexType::U16 => u16::from_le_bytes([chunk[0], chunk[1]]) as u32,
        IndexType::U32 => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
    })
}

impl GraphicsContext for HeadlessContext {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type VertexArray = HeadlessVertexArray;
    type UniformLocation = HeadlessUniformLocation;

    fn backend_name(&self) -> &'static str {
        "headless"
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate("shader")?;
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                interface: None,
                info_log: String::new(),
                attachments: 0,
                delete_pending: false,
            },
        );
        Ok(HeadlessShader(id))
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        let mut state = self.state.borrow_mut();
        match state.shaders.get_mut(&shader.0) {
            Some(object) => object.source = source.to_string(),
            None => state.flag(GlError::InvalidValue, "shader_source"),
        }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader.0) else {
            state.flag(GlError::InvalidValue, "compile_shader");
            return;
        };
        match glsl::check(object.stage, &object.source) {
            Ok(interface) => {
                trace!(
                    "headless: {} shader {} compiled ({} declarations)",
                    object.stage,
                    shader.0,
                    interface.declarations.len()
                );
                object.interface = Some(interface);
                object.info_log.clear();
            }
            Err(diagnostics) => {
                object.interface = None;
                object.info_log = diagnostics.iter().map(|d| format!("{d}\n")).collect();
            }
        }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader.0) {
            Some(object) => object.interface.is_some(),
            None => {
                state.flag(GlError::InvalidValue, "shader_compile_status");
                false
            }
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader.0) {
            Some(object) => object.info_log.clone(),
            None => {
                state.flag(GlError::InvalidValue, "shader_info_log");
                String::new()
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        match state.shaders.get_mut(&shader.0) {
            Some(object) => object.delete_pending = true,
            None => return state.flag(GlError::InvalidValue, "delete_shader"),
        }
        state.release_shader_if_orphaned(shader.0);
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate("program")?;
        state.programs.insert(id, ProgramObject::default());
        Ok(HeadlessProgram(id))
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader.0) {
            return state.flag(GlError::InvalidValue, "attach_shader");
        }
        let Some(object) = state.programs.get_mut(&program.0) else {
            return state.flag(GlError::InvalidValue, "attach_shader");
        };
        if object.attached.contains(&shader.0) {
            return state.flag(GlError::InvalidOperation, "attach_shader (already attached)");
        }
        object.attached.push(shader.0);
        if let Some(shader) = state.shaders.get_mut(&shader.0) {
            shader.attachments += 1;
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.programs.get_mut(&program.0) else {
            return state.flag(GlError::InvalidValue, "detach_shader");
        };
        let Some(pos) = object.attached.iter().position(|&s| s == shader.0) else {
            return state.flag(GlError::InvalidOperation, "detach_shader (not attached)");
        };
        object.attached.remove(pos);
        if let Some(shader) = state.shaders.get_mut(&shader.0) {
            shader.attachments -= 1;
        }
        state.release_shader_if_orphaned(shader.0);
    }

    fn link_program(&self, program: Self::Program) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.programs.get(&program.0) else {
            return state.flag(GlError::InvalidValue, "link_program");
        };

        let mut vertex = Vec::new();
        let mut fragment = Vec::new();
        let mut log = String::new();
        for id in &object.attached {
            let Some(shader) = state.shaders.get(id) else {
                continue;
            };
            match (&shader.interface, shader.stage) {
                (None, stage) => {
                    log.push_str(&format!("ERROR: Attached {stage} shader is not compiled.\n"))
                }
                (Some(iface), ShaderStage::Vertex) => vertex.push(iface),
                (Some(iface), ShaderStage::Fragment) => fragment.push(iface),
            }
        }

        let outcome = if !log.is_empty() {
            Err(log)
        } else {
            match (vertex.as_slice(), fragment.as_slice()) {
                ([vs], [fs]) => link_interfaces(vs, fs),
                ([], _) => Err("ERROR: Missing vertex shader.\n".to_string()),
                (_, []) => Err("ERROR: Missing fragment shader.\n".to_string()),
                _ => Err("ERROR: More than one shader attached per stage.\n".to_string()),
            }
        };

        let Some(object) = state.programs.get_mut(&program.0) else {
            return;
        };
        object.values.clear();
        match outcome {
            Ok((attributes, uniforms)) => {
                trace!(
                    "headless: program {} linked ({} attributes, {} uniforms)",
                    program.0,
                    attributes.len(),
                    uniforms.len()
                );
                object.linked = true;
                object.info_log.clear();
                object.attributes = attributes;
                object.uniforms = uniforms;
            }
            Err(message) => {
                object.linked = false;
                object.info_log = if message.ends_with('\n') {
                    message
                } else {
                    format!("{message}\n")
                };
                object.attributes.clear();
                object.uniforms.clear();
            }
        }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program.0) {
            Some(object) => object.linked,
            None => {
                state.flag(GlError::InvalidValue, "program_link_status");
                false
            }
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program.0) {
            Some(object) => object.info_log.clone(),
            None => {
                state.flag(GlError::InvalidValue, "program_info_log");
                String::new()
            }
        }
    }

    fn delete_program(&self, program: Self::Program) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.programs.remove(&program.0) else {
            return state.flag(GlError::InvalidValue, "delete_program");
        };
        for id in object.attached {
            if let Some(shader) = state.shaders.get_mut(&id) {
                shader.attachments -= 1;
            }
            state.release_shader_if_orphaned(id);
        }
        if state.current_program == Some(program.0) {
            state.current_program = None;
        }
        trace!("headless: program {} deleted", program.0);
    }

    fn use_program(&self, program: Option<Self::Program>) {
        let mut state = self.state.borrow_mut();
        match program {
            None => state.current_program = None,
            Some(p) => match state.programs.get(&p.0) {
                Some(object) if object.linked => state.current_program = Some(p.0),
                Some(_) => state.flag(GlError::InvalidOperation, "use_program (not linked)"),
                None => state.flag(GlError::InvalidValue, "use_program"),
            },
        }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program.0) {
            Some(object) if object.linked => object.attributes.get(name).copied(),
            Some(_) => {
                state.flag(GlError::InvalidOperation, "attrib_location (not linked)");
                None
            }
            None => {
                state.flag(GlError::InvalidValue, "attrib_location");
                None
            }
        }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program.0) {
            Some(object) if object.linked => {
                let name = name.strip_suffix("[0]").unwrap_or(name);
                object
                    .uniforms
                    .iter()
                    .position(|(n, _)| n == name)
                    .map(|index| HeadlessUniformLocation {
                        program: program.0,
                        index,
                    })
            }
            Some(_) => {
                state.flag(GlError::InvalidOperation, "uniform_location (not linked)");
                None
            }
            None => {
                state.flag(GlError::InvalidValue, "uniform_location");
                None
            }
        }
    }

    fn uniform_1_f32(&self, location: Option<&Self::UniformLocation>, x: f32) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Float(x));
    }

    fn uniform_2_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Vec2([x, y]));
    }

    fn uniform_3_f32(&self, location: Option<&Self::UniformLocation>, x: f32, y: f32, z: f32) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Vec3([x, y, z]));
    }

    fn uniform_4_f32(
        &self,
        location: Option<&Self::UniformLocation>,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Vec4([x, y, z, w]));
    }

    fn uniform_matrix_3_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 9]) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Mat3(*values));
    }

    fn uniform_matrix_4_f32(&self, location: Option<&Self::UniformLocation>, values: &[f32; 16]) {
        self.state
            .borrow_mut()
            .set_uniform(location, UniformValue::Mat4(*values));
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate("buffer")?;
        state.buffers.insert(
            id,
            BufferObject {
                data: Vec::new(),
                usage: BufferUsage::Static,
            },
        );
        Ok(HeadlessBuffer(id))
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        let mut state = self.state.borrow_mut();
        if let Some(b) = buffer {
            if !state.buffers.contains_key(&b.0) {
                return state.flag(GlError::InvalidOperation, "bind_buffer");
            }
        }
        let id = buffer.map(|b| b.0);
        match target {
            BufferTarget::Array => state.array_buffer = id,
            BufferTarget::ElementArray => {
                let current = state.vertex_array;
                if let Some(vao) = state.vertex_arrays.get_mut(&current) {
                    vao.element_buffer = id;
                }
            }
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        let Some(id) = state.bound_buffer(target) else {
            return state.flag(GlError::InvalidOperation, "buffer_data (no buffer bound)");
        };
        match state.buffers.get_mut(&id) {
            Some(buffer) => {
                buffer.data = data.to_vec();
                buffer.usage = usage;
            }
            None => state.flag(GlError::InvalidValue, "buffer_data"),
        }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: i32, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let Some(id) = state.bound_buffer(target) else {
            return state.flag(GlError::InvalidOperation, "buffer_sub_data (no buffer bound)");
        };
        let Some(buffer) = state.buffers.get_mut(&id) else {
            return state.flag(GlError::InvalidValue, "buffer_sub_data");
        };
        let start = usize::try_from(offset).ok();
        match start.filter(|&s| s + data.len() <= buffer.data.len()) {
            Some(start) => buffer.data[start..start + data.len()].copy_from_slice(data),
            None => state.flag(GlError::InvalidValue, "buffer_sub_data (out of range)"),
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&buffer.0).is_none() {
            return state.flag(GlError::InvalidValue, "delete_buffer");
        }
        if state.array_buffer == Some(buffer.0) {
            state.array_buffer = None;
        }
        let current = state.vertex_array;
        if let Some(vao) = state.vertex_arrays.get_mut(&current) {
            if vao.element_buffer == Some(buffer.0) {
                vao.element_buffer = None;
            }
        }
        trace!("headless: buffer {} deleted", buffer.0);
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate("vertex array")?;
        state.vertex_arrays.insert(id, VertexArrayObject::default());
        Ok(HeadlessVertexArray(id))
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        let mut state = self.state.borrow_mut();
        let id = vertex_array.map(|v| v.0).unwrap_or(0);
        if state.vertex_arrays.contains_key(&id) {
            state.vertex_array = id;
        } else {
            state.flag(GlError::InvalidOperation, "bind_vertex_array");
        }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        let mut state = self.state.borrow_mut();
        if vertex_array.0 == 0 || state.vertex_arrays.remove(&vertex_array.0).is_none() {
            return state.flag(GlError::InvalidValue, "delete_vertex_array");
        }
        if state.vertex_array == vertex_array.0 {
            state.vertex_array = 0;
        }
        trace!("headless: vertex array {} deleted", vertex_array.0);
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        let mut state = self.state.borrow_mut();
        if index >= MAX_VERTEX_ATTRIBS {
            return state.flag(GlError::InvalidValue, "enable_vertex_attrib_array");
        }
        let current = state.vertex_array;
        if let Some(vao) = state.vertex_arrays.get_mut(&current) {
            vao.enabled.insert(index);
        }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        component_type: ComponentType,
        _normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        let mut state = self.state.borrow_mut();
        if index >= MAX_VERTEX_ATTRIBS || !(1..=4).contains(&size) || stride < 0 || offset < 0 {
            return state.flag(GlError::InvalidValue, "vertex_attrib_pointer");
        }
        let Some(buffer) = state.array_buffer else {
            return state.flag(
                GlError::InvalidOperation,
                "vertex_attrib_pointer (no array buffer bound)",
            );
        };
        let current = state.vertex_array;
        if let Some(vao) = state.vertex_arrays.get_mut(&current) {
            vao.pointers.insert(
                index,
                AttribPointer {
                    buffer,
                    size,
                    component_type,
                    stride,
                    offset,
                },
            );
        }
    }

    fn vertex_attrib_1_f32(&self, index: u32, x: f32) {
        let mut state = self.state.borrow_mut();
        match state.generic_attributes.get_mut(index as usize) {
            Some(value) => *value = [x, 0.0, 0.0, 1.0],
            None => state.flag(GlError::InvalidValue, "vertex_attrib_1_f32"),
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        let mut state = self.state.borrow_mut();
        if width < 0 || height < 0 {
            return state.flag(GlError::InvalidValue, "viewport");
        }
        state.viewport = [x, y, width, height];
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.state.borrow_mut().clear_color = [r, g, b, a];
    }

    fn clear(&self, flags: ClearFlags) {
        let mut state = self.state.borrow_mut();
        if !flags.is_empty() {
            state.clears += 1;
        }
    }

    fn enable(&self, capability: Capability) {
        self.state.borrow_mut().capabilities.insert(capability);
    }

    fn disable(&self, capability: Capability) {
        self.state.borrow_mut().capabilities.remove(&capability);
    }

    fn blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        self.state.borrow_mut().blend = (src, dst);
    }

    fn draw_arrays(&self, primitive: Primitive, first: i32, count: i32) {
        let mut state = self.state.borrow_mut();
        if first < 0 || count < 0 {
            return state.flag(GlError::InvalidValue, "draw_arrays");
        }
        let Some(program) = state.linked_current_program("draw_arrays (no program)") else {
            return;
        };
        let needed = if count == 0 { 0 } else { first as u64 + count as u64 };
        if !state.attributes_cover(needed) {
            return state.flag(
                GlError::InvalidOperation,
                "draw_arrays (attribute out of range)",
            );
        }
        let vertex_array = (state.vertex_array != 0).then_some(HeadlessVertexArray(state.vertex_array));
        state.draw_calls.push(DrawCall {
            primitive,
            first,
            count,
            index_type: None,
            program: HeadlessProgram(program),
            vertex_array,
        });
    }

    fn draw_elements(&self, primitive: Primitive, count: i32, index_type: IndexType, offset: i32) {
        let mut state = self.state.borrow_mut();
        if count < 0 || offset < 0 {
            return state.flag(GlError::InvalidValue, "draw_elements");
        }
        let Some(program) = state.linked_current_program("draw_elements (no program)") else {
            return;
        };
        let width = index_type.size_bytes();
        if offset % width != 0 {
            return state.flag(GlError::InvalidOperation, "draw_elements (misaligned offset)");
        }
        let Some(indices) = state
            .bound_buffer(BufferTarget::ElementArray)
            .and_then(|id| state.buffers.get(&id))
        else {
            return state.flag(
                GlError::InvalidOperation,
                "draw_elements (no element buffer bound)",
            );
        };
        let start = offset as usize;
        let Some(end) = (count as usize)
            .checked_mul(width as usize)
            .and_then(|len| len.checked_add(start))
            .filter(|&end| end <= indices.data.len())
        else {
            return state.flag(
                GlError::InvalidOperation,
                "draw_elements (index buffer too small)",
            );
        };
        let needed = read_indices(&indices.data[start..end], index_type)
            .max()
            .map_or(0, |max| max as u64 + 1);
        if !state.attributes_cover(needed) {
            return state.flag(
                GlError::InvalidOperation,
                "draw_elements (index out of range)",
            );
        }
        let vertex_array = (state.vertex_array != 0).then_some(HeadlessVertexArray(state.vertex_array));
        state.draw_calls.push(DrawCall {
            primitive,
            first: offset / width,
            count,
            index_type: Some(index_type),
            program: HeadlessProgram(program),
            vertex_array,
        });
    }

    fn get_error(&self) -> GlError {
        std::mem::replace(&mut self.state.borrow_mut().error, GlError::NoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "attribute vec2 a_position;\nuniform mat3 u_matrix;\nvarying vec2 v_uv;\nvoid main(){ v_uv = a_position; gl_Position = vec4((u_matrix * vec3(a_position, 1.0)).xy, 0.0, 1.0); }";
    const FS: &str = "precision mediump float;\nuniform vec4 u_color;\nvarying vec2 v_uv;\nvoid main(){ gl_FragColor = u_color * v_uv.x; }";

    fn compile(ctx: &HeadlessContext, stage: ShaderStage, src: &str) -> HeadlessShader {
        let shader = GraphicsContext::create_shader(ctx, stage).unwrap();
        ctx.shader_source(shader, src);
        GraphicsContext::compile_shader(ctx, shader);
        shader
    }

    fn linked(ctx: &HeadlessContext, vs: &str, fs: &str) -> HeadlessProgram {
        let program = GraphicsContext::create_program(ctx).unwrap();
        ctx.attach_shader(program, compile(ctx, ShaderStage::Vertex, vs));
        ctx.attach_shader(program, compile(ctx, ShaderStage::Fragment, fs));
        GraphicsContext::link_program(ctx, program);
        program
    }

    #[test]
    fn test_compile_reports_diagnostics() {
        let ctx = HeadlessContext::new();
        let good = compile(&ctx, ShaderStage::Vertex, VS);
        assert!(ctx.shader_compile_status(good));
        assert!(ctx.shader_info_log(good).is_empty());

        let bad = compile(&ctx, ShaderStage::Vertex, "void main(){ gl_Position = vec4(0.0) }");
        assert!(!ctx.shader_compile_status(bad));
        assert!(ctx.shader_info_log(bad).starts_with("ERROR: 0:1:"));
        assert_eq!(ctx.get_error(), GlError::NoError);
    }

    #[test]
    fn test_link_assigns_locations() {
        let ctx = HeadlessContext::new();
        let program = linked(&ctx, VS, FS);
        assert!(ctx.program_link_status(program));
        assert_eq!(ctx.attrib_location(program, "a_position"), Some(0));
        assert!(ctx.uniform_location(program, "u_matrix").is_some());
        assert!(ctx.uniform_location(program, "u_color").is_some());
        assert_eq!(ctx.attrib_location(program, "a_missing"), None);
        assert!(ctx.uniform_location(program, "u_missing").is_none());
    }

    #[test]
    fn test_link_rejects_unmatched_varying() {
        let ctx = HeadlessContext::new();
        let fs = "precision mediump float;\nvarying vec3 v_other;\nvoid main(){ gl_FragColor = vec4(v_other, 1.0); }";
        let program = linked(&ctx, VS, fs);
        assert!(!ctx.program_link_status(program));
        assert!(ctx.program_info_log(program).contains("v_other"));
    }

    #[test]
    fn test_link_rejects_version_mismatch() {
        let ctx = HeadlessContext::new();
        let fs = "#version 300 es\nprecision mediump float;\nout vec4 color;\nvoid main(){ color = vec4(1.0); }";
        let program = linked(&ctx, "void main(){ gl_Position = vec4(0.0); }", fs);
        assert!(!ctx.program_link_status(program));
        assert!(ctx.program_info_log(program).contains("Versions"));
    }

    #[test]
    fn test_explicit_and_sequential_attribute_slots() {
        let vs = "#version 300 es\nlayout(location = 0) in vec3 a;\nin mat3 m;\nin vec2 b;\nvoid main(){ gl_Position = vec4(m * a, b.x); }";
        let fs = "#version 300 es\nprecision mediump float;\nout vec4 c;\nvoid main(){ c = vec4(1.0); }";
        let ctx = HeadlessContext::new();
        let program = linked(&ctx, vs, fs);
        assert!(ctx.program_link_status(program), "{}", ctx.program_info_log(program));
        assert_eq!(ctx.attrib_location(program, "a"), Some(0));
        assert_eq!(ctx.attrib_location(program, "m"), Some(1));
        assert_eq!(ctx.attrib_location(program, "b"), Some(4));
    }

    #[test]
    fn test_deleted_shader_lives_until_detached() {
        let ctx = HeadlessContext::new();
        let program = GraphicsContext::create_program(&ctx).unwrap();
        let vs = compile(&ctx, ShaderStage::Vertex, VS);
        ctx.attach_shader(program, vs);
        GraphicsContext::delete_shader(&ctx, vs);
        assert_eq!(ctx.live_shaders(), 1);
        ctx.detach_shader(program, vs);
        assert_eq!(ctx.live_shaders(), 0);
        GraphicsContext::delete_program(&ctx, program);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn test_uniform_writes_are_type_checked() {
        let ctx = HeadlessContext::new();
        let program = linked(&ctx, VS, FS);
        let color = ctx.uniform_location(program, "u_color");

        ctx.uniform_4_f32(color.as_ref(), 1.0, 0.0, 0.0, 1.0);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation, "no program in use");

        ctx.use_program(Some(program));
        ctx.uniform_4_f32(color.as_ref(), 1.0, 0.5, 0.0, 1.0);
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert_eq!(
            ctx.uniform_value(program, "u_color"),
            Some(UniformValue::Vec4([1.0, 0.5, 0.0, 1.0]))
        );

        ctx.uniform_1_f32(color.as_ref(), 2.0);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.uniform_2_f32(color.as_ref(), 2.0, 1.0);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);

        // A missing location is silently ignored.
        ctx.uniform_1_f32(None, 2.0);
        assert_eq!(ctx.get_error(), GlError::NoError);
    }

    #[test]
    fn test_draw_validates_buffers() {
        let ctx = HeadlessContext::new();
        let program = linked(&ctx, VS, FS);
        ctx.use_program(Some(program));

        let vao = GraphicsContext::create_vertex_array(&ctx).unwrap();
        ctx.bind_vertex_array(Some(vao));
        let vbo = GraphicsContext::create_buffer(&ctx).unwrap();
        ctx.bind_buffer(BufferTarget::Array, Some(vbo));
        let vertices: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        ctx.buffer_data(BufferTarget::Array, bytemuck::cast_slice(&vertices), BufferUsage::Static);
        ctx.enable_vertex_attrib_array(0);
        ctx.vertex_attrib_pointer(0, 2, ComponentType::Float, false, 8, 0);

        ctx.draw_arrays(Primitive::Triangles, 0, 3);
        assert_eq!(ctx.get_error(), GlError::NoError);
        ctx.draw_arrays(Primitive::Triangles, 0, 4);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);

        ctx.draw_elements(Primitive::Triangles, 3, IndexType::U16, 0);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation, "no element buffer");

        let ebo = GraphicsContext::create_buffer(&ctx).unwrap();
        ctx.bind_buffer(BufferTarget::ElementArray, Some(ebo));
        let indices: [u16; 3] = [0, 1, 2];
        ctx.buffer_data(
            BufferTarget::ElementArray,
            bytemuck::cast_slice(&indices),
            BufferUsage::Static,
        );
        ctx.draw_elements(Primitive::Triangles, 3, IndexType::U16, 0);
        assert_eq!(ctx.get_error(), GlError::NoError);

        let calls = ctx.draw_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].index_type, Some(IndexType::U16));
        assert_eq!(calls[1].vertex_array, Some(vao));

        // Ranges near the i32 limit are rejected, not wrapped.
        ctx.draw_arrays(Primitive::Triangles, i32::MAX, 3);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.draw_elements(Primitive::Triangles, i32::MAX, IndexType::U32, 0);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        ctx.draw_elements(Primitive::Triangles, 3, IndexType::U16, i32::MAX - 1);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);
        assert_eq!(ctx.draw_calls().len(), 2);
    }

    #[test]
    fn test_element_binding_belongs_to_vertex_array() {
        let ctx = HeadlessContext::new();
        let vao = GraphicsContext::create_vertex_array(&ctx).unwrap();
        let ebo = GraphicsContext::create_buffer(&ctx).unwrap();
        ctx.bind_vertex_array(Some(vao));
        ctx.bind_buffer(BufferTarget::ElementArray, Some(ebo));
        ctx.bind_vertex_array(None);
        ctx.buffer_data(BufferTarget::ElementArray, &[0, 0], BufferUsage::Static);
        assert_eq!(ctx.get_error(), GlError::InvalidOperation);

        ctx.bind_vertex_array(Some(vao));
        ctx.buffer_data(BufferTarget::ElementArray, &[0, 0], BufferUsage::Dynamic);
        assert_eq!(ctx.get_error(), GlError::NoError);
        assert_eq!(ctx.buffer_usage(ebo), Some(BufferUsage::Dynamic));
    }

    #[test]
    fn test_errors_are_sticky_until_read() {
        let ctx = HeadlessContext::new();
        ctx.viewport(0, 0, -1, 10);
        ctx.enable_vertex_attrib_array(99);
        assert_eq!(ctx.get_error(), GlError::InvalidValue);
        assert_eq!(ctx.get_error(), GlError::NoError);
    }

    #[test]
    fn test_allocation_limit() {
        let ctx = HeadlessContext::new();
        ctx.limit_allocations(1);
        assert!(GraphicsContext::create_buffer(&ctx).is_ok());
        let err = GraphicsContext::create_buffer(&ctx).unwrap_err();
        assert!(err.contains("out of memory"));
    }
}
