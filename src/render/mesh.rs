use std::fmt;

use log::{debug, warn};

use crate::gpu::{
    BufferTarget, BufferUsage, ComponentType, GraphicsContext, IndexType, Primitive,
};
use crate::utils::error::RenderError;

/// Layout of one vertex attribute inside the vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub slot: u32,
    pub component_count: i32,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// 0 means tightly packed.
    pub stride_bytes: i32,
    pub offset_bytes: i32,
}

impl AttributeDescriptor {
    /// Non-normalized `f32` attribute.
    pub fn float(slot: u32, component_count: i32, stride_bytes: i32, offset_bytes: i32) -> Self {
        Self {
            slot,
            component_count,
            component_type: ComponentType::Float,
            normalized: false,
            stride_bytes,
            offset_bytes,
        }
    }

    pub fn element_size(&self) -> i32 {
        self.component_count * self.component_type.size_bytes()
    }

    pub fn effective_stride(&self) -> i32 {
        if self.stride_bytes == 0 {
            self.element_size()
        } else {
            self.stride_bytes
        }
    }

    /// `offset + element size` must not exceed a non-zero stride.
    pub fn fits_stride(&self) -> bool {
        self.stride_bytes == 0 || self.offset_bytes + self.element_size() <= self.stride_bytes
    }

    /// How many whole vertices this attribute can read from `byte_len` bytes.
    pub fn vertex_capacity(&self, byte_len: usize) -> usize {
        let start = self.offset_bytes.max(0) as usize + self.element_size().max(0) as usize;
        let stride = self.effective_stride().max(1) as usize;
        match byte_len.checked_sub(start) {
            Some(rest) => rest / stride + 1,
            None => 0,
        }
    }
}

/// Index data in either width.
#[derive(Debug, Clone, Copy)]
pub enum Indices<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl<'a> Indices<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::U16(i) => i.len(),
            Self::U32(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    fn as_bytes(&self) -> &'a [u8] {
        match self {
            Self::U16(i) => bytemuck::cast_slice(*i),
            Self::U32(i) => bytemuck::cast_slice(*i),
        }
    }
}

/// Everything `create_mesh` needs to build a drawable.
#[derive(Debug, Clone, Copy)]
pub struct MeshDescriptor<'a> {
    pub vertices: &'a [f32],
    pub indices: Option<Indices<'a>>,
    pub attributes: &'a [AttributeDescriptor],
    pub usage: BufferUsage,
}

impl<'a> MeshDescriptor<'a> {
    pub fn new(vertices: &'a [f32], attributes: &'a [AttributeDescriptor]) -> Self {
        Self {
            vertices,
            indices: None,
            attributes,
            usage: BufferUsage::Static,
        }
    }

    pub fn with_indices(mut self, indices: Indices<'a>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Smallest vertex capacity across the attributes.
    pub fn vertex_count(&self) -> usize {
        let byte_len = std::mem::size_of_val(self.vertices);
        self.attributes
            .iter()
            .map(|a| a.vertex_capacity(byte_len))
            .min()
            .unwrap_or(0)
    }
}

/// Vertex array, vertex buffer and optional index buffer.
pub struct Mesh<C: GraphicsContext> {
    vertex_array: C::VertexArray,
    vertex_buffer: C::Buffer,
    index_buffer: Option<C::Buffer>,
    index_type: Option<IndexType>,
    index_count: usize,
    vertex_count: usize,
    vertex_bytes: usize,
}

impl<C: GraphicsContext> Mesh<C> {
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_type(&self) -> Option<IndexType> {
        self.index_type
    }

    pub fn vertex_array(&self) -> C::VertexArray {
        self.vertex_array
    }

    pub fn vertex_buffer(&self) -> C::Buffer {
        self.vertex_buffer
    }

    /// Draws the whole mesh with the program currently in use.
    pub fn draw(&self, ctx: &C, primitive: Primitive) {
        ctx.bind_vertex_array(Some(self.vertex_array));
        match self.index_type {
            Some(index_type) => {
                ctx.draw_elements(primitive, self.index_count as i32, index_type, 0)
            }
            None => ctx.draw_arrays(primitive, 0, self.vertex_count as i32),
        }
        ctx.bind_vertex_array(None);
    }

    /// Draws `count` vertices starting at vertex `first`. Indexed meshes
    /// draw `count` indices starting at index `first`.
    pub fn draw_range(&self, ctx: &C, primitive: Primitive, first: usize, count: usize) {
        let limit = match self.index_type {
            Some(_) => self.index_count,
            None => self.vertex_count,
        };
        let width = self.index_type.map_or(1, |t| t.size_bytes() as usize);
        let range = first
            .checked_add(count)
            .filter(|&end| end <= limit)
            .and_then(|_| first.checked_mul(width))
            .and_then(|start| Some((i32::try_from(start).ok()?, i32::try_from(count).ok()?)));
        let Some((start, count)) = range else {
            warn!("Draw range {first}+{count} exceeds the {limit} element mesh");
            return;
        };
        ctx.bind_vertex_array(Some(self.vertex_array));
        match self.index_type {
            Some(index_type) => ctx.draw_elements(primitive, count, index_type, start),
            None => ctx.draw_arrays(primitive, start, count),
        }
        ctx.bind_vertex_array(None);
    }

    /// Overwrites vertex data starting at float index `first`.
    pub fn update_vertices(&self, ctx: &C, first: usize, data: &[f32]) {
        let offset = first
            .checked_mul(std::mem::size_of::<f32>())
            .filter(|offset| {
                offset
                    .checked_add(std::mem::size_of_val(data))
                    .is_some_and(|end| end <= self.vertex_bytes)
            })
            .and_then(|offset| i32::try_from(offset).ok());
        let Some(offset) = offset else {
            warn!(
                "Vertex update of {} floats at {} exceeds the {} byte buffer",
                data.len(),
                first,
                self.vertex_bytes
            );
            return;
        };
        ctx.bind_buffer(BufferTarget::Array, Some(self.vertex_buffer));
        ctx.buffer_sub_data(BufferTarget::Array, offset, bytemuck::cast_slice(data));
        ctx.bind_buffer(BufferTarget::Array, None);
    }

    /// Releases the vertex array and both buffers.
    pub fn dispose(self, ctx: &C) {
        debug!("Disposing mesh {:?}", self.vertex_array);
        ctx.delete_vertex_array(self.vertex_array);
        ctx.delete_buffer(self.vertex_buffer);
        if let Some(index_buffer) = self.index_buffer {
            ctx.delete_buffer(index_buffer);
        }
    }
}

impl<C: GraphicsContext> fmt::Debug for Mesh<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("vertex_array", &self.vertex_array)
            .field("index_count", &self.index_count)
            .field("vertex_count", &self.vertex_count)
            .finish()
    }
}

fn creation_error(object: &'static str) -> impl FnOnce(String) -> RenderError {
    move |reason| RenderError::ObjectCreation { object, reason }
}

/// Uploads the descriptor's data and records the attribute layout in a new
/// vertex array.
pub fn create_mesh<C: GraphicsContext>(
    ctx: &C,
    desc: &MeshDescriptor<'_>,
) -> Result<Mesh<C>, RenderError> {
    for attribute in desc.attributes.iter().filter(|a| !a.fits_stride()) {
        warn!(
            "Attribute at slot {} reads {} bytes at offset {} past its {} byte stride",
            attribute.slot,
            attribute.element_size(),
            attribute.offset_bytes,
            attribute.stride_bytes
        );
    }

    let vertex_array = ctx
        .create_vertex_array()
        .map_err(creation_error("vertex array"))?;
    let vertex_buffer = match ctx.create_buffer() {
        Ok(buffer) => buffer,
        Err(reason) => {
            ctx.delete_vertex_array(vertex_array);
            return Err(creation_error("vertex buffer")(reason));
        }
    };
    let index_buffer = match desc.indices.map(|_| ctx.create_buffer()).transpose() {
        Ok(buffer) => buffer,
        Err(reason) => {
            ctx.delete_buffer(vertex_buffer);
            ctx.delete_vertex_array(vertex_array);
            return Err(creation_error("index buffer")(reason));
        }
    };

    ctx.bind_vertex_array(Some(vertex_array));

    ctx.bind_buffer(BufferTarget::Array, Some(vertex_buffer));
    ctx.buffer_data(
        BufferTarget::Array,
        bytemuck::cast_slice(desc.vertices),
        desc.usage,
    );

    if let (Some(buffer), Some(indices)) = (index_buffer, desc.indices) {
        ctx.bind_buffer(BufferTarget::ElementArray, Some(buffer));
        ctx.buffer_data(BufferTarget::ElementArray, indices.as_bytes(), desc.usage);
    }

    for attribute in desc.attributes {
        ctx.enable_vertex_attrib_array(attribute.slot);
        ctx.vertex_attrib_pointer(
            attribute.slot,
            attribute.component_count,
            attribute.component_type,
            attribute.normalized,
            attribute.stride_bytes,
            attribute.offset_bytes,
        );
    }

    ctx.bind_vertex_array(None);
    ctx.bind_buffer(BufferTarget::Array, None);
    ctx.bind_buffer(BufferTarget::ElementArray, None);

    let mesh = Mesh {
        vertex_array,
        vertex_buffer,
        index_buffer,
        index_type: desc.indices.map(|i| i.index_type()),
        index_count: desc.indices.map_or(0, |i| i.len()),
        vertex_count: desc.vertex_count(),
        vertex_bytes: std::mem::size_of_val(desc.vertices),
    };
    debug!("Created {:?}", mesh);
    Ok(mesh)
}
