//! Vertex geometry buffers.
//!
//! A [`VertexArrayObject`] collects one [`VertexBufferData`] stream per
//! attribute, uploads them all in [`VertexArrayObject::create_vao`] and
//! draws them as non-indexed primitives.

use std::sync::Arc;

use log::warn;

use crate::abs::gpu::{GlHandle, Gpu, check_error};
use crate::error::GeometryError;

/// Shader attribute slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeLocation {
    Vertex = 0,
    TexCoord = 1,
    Normal = 2,
    Color = 3,
    InstancedCol0 = 12,
    InstancedCol1 = 13,
    InstancedCol2 = 14,
    InstancedCol3 = 15,
}

impl AttributeLocation {
    pub fn index(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float,
    Int,
    UnsignedInt,
    UnsignedByte,
}

impl ElementType {
    pub fn gl(self) -> u32 {
        match self {
            Self::Float => glow::FLOAT,
            Self::Int => glow::INT,
            Self::UnsignedInt => glow::UNSIGNED_INT,
            Self::UnsignedByte => glow::UNSIGNED_BYTE,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UnsignedInt => 4,
            Self::UnsignedByte => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl PrimitiveType {
    pub fn gl(self) -> u32 {
        match self {
            Self::Triangles => glow::TRIANGLES,
            Self::TriangleStrip => glow::TRIANGLE_STRIP,
            Self::Lines => glow::LINES,
            Self::LineStrip => glow::LINE_STRIP,
            Self::Points => glow::POINTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    #[default]
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

impl BufferUsage {
    pub fn gl(self) -> u32 {
        match self {
            Self::StaticDraw => glow::STATIC_DRAW,
            Self::DynamicDraw => glow::DYNAMIC_DRAW,
            Self::StreamDraw => glow::STREAM_DRAW,
        }
    }
}

/// One attribute stream: which slot it feeds, how its elements are laid
/// out, and the raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferData {
    pub attribute: AttributeLocation,
    pub element_type: ElementType,
    /// Components per vertex (1 to 4).
    pub elements_per_attribute: u32,
    pub data: Vec<u8>,
}

impl VertexBufferData {
    pub fn from_f32(attribute: AttributeLocation, elements_per_attribute: u32, data: &[f32]) -> Self {
        Self {
            attribute,
            element_type: ElementType::Float,
            elements_per_attribute,
            data: bytemuck::cast_slice(data).to_vec(),
        }
    }

    /// Total number of scalar elements in the stream.
    pub fn num_elements(&self) -> usize {
        self.data.len() / self.element_type.size()
    }

    pub fn num_vertices(&self) -> usize {
        self.num_elements() / self.elements_per_attribute.max(1) as usize
    }

    /// Size in bytes of one vertex worth of this attribute.
    pub fn stride(&self) -> usize {
        self.elements_per_attribute as usize * self.element_type.size()
    }
}

/// Represents a vertex array and its attribute buffers on the GPU side.
pub struct VertexArrayObject {
    gpu: Arc<dyn Gpu>,
    vao: Option<GlHandle>,
    primitive: PrimitiveType,
    usage: BufferUsage,
    streams: Vec<VertexBufferData>,
    vbos: Vec<GlHandle>,
}

impl VertexArrayObject {
    pub fn new(gpu: &Arc<dyn Gpu>) -> Self {
        Self::with_primitive(gpu, PrimitiveType::Triangles)
    }

    pub fn with_primitive(gpu: &Arc<dyn Gpu>, primitive: PrimitiveType) -> Self {
        Self {
            gpu: Arc::clone(gpu),
            vao: None,
            primitive,
            usage: BufferUsage::StaticDraw,
            streams: Vec::new(),
            vbos: Vec::new(),
        }
    }

    /// Registers an attribute stream. Returns its index.
    pub fn add_vbo(&mut self, descriptor: VertexBufferData) -> Result<usize, GeometryError> {
        if self.vao.is_some() {
            return Err(GeometryError::AlreadyCreated);
        }
        let location = descriptor.attribute.index();
        if self.streams.iter().any(|s| s.attribute == descriptor.attribute) {
            return Err(GeometryError::DuplicateAttribute { location });
        }
        let stride = descriptor.stride();
        if stride == 0 || descriptor.data.len() % stride != 0 {
            return Err(GeometryError::Misaligned {
                location,
                len: descriptor.data.len(),
                stride,
            });
        }
        self.streams.push(descriptor);
        Ok(self.streams.len() - 1)
    }

    /// Uploads every registered stream and records the attribute layout.
    pub fn create_vao(&mut self, usage: BufferUsage) -> Result<(), GeometryError> {
        if self.vao.is_some() {
            return Err(GeometryError::AlreadyCreated);
        }
        if self.streams.is_empty() {
            return Err(GeometryError::Empty);
        }
        self.usage = usage;

        let vao = self.gpu.create_vertex_array()?;
        self.vao = Some(vao);
        self.gpu.bind_vertex_array(Some(vao));
        let mut failure = None;
        for stream in &self.streams {
            let vbo = match self.gpu.create_buffer() {
                Ok(vbo) => vbo,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };
            self.vbos.push(vbo);
            let index = stream.attribute.index();
            self.gpu.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gpu
                .buffer_data(glow::ARRAY_BUFFER, &stream.data, usage.gl());
            self.gpu.enable_vertex_attrib_array(index);
            self.gpu.vertex_attrib_pointer(
                index,
                stream.elements_per_attribute as i32,
                stream.element_type.gl(),
                false,
                0,
                0,
            );
        }
        self.gpu.bind_vertex_array(None);
        self.gpu.bind_buffer(glow::ARRAY_BUFFER, None);

        if let Some(err) = failure {
            self.destroy();
            return Err(err.into());
        }
        if let Err(err) = check_error(self.gpu.as_ref(), "uploading vertex buffers") {
            self.destroy();
            return Err(err.into());
        }
        Ok(())
    }

    /// Uploads the current contents of every stream again.
    pub fn reupload_vao(&self) -> Result<(), GeometryError> {
        if self.vao.is_none() {
            return Err(GeometryError::NotCreated);
        }
        for (stream, &vbo) in self.streams.iter().zip(&self.vbos) {
            self.gpu.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gpu
                .buffer_data(glow::ARRAY_BUFFER, &stream.data, self.usage.gl());
        }
        self.gpu.bind_buffer(glow::ARRAY_BUFFER, None);
        check_error(self.gpu.as_ref(), "re-uploading vertex buffers")?;
        Ok(())
    }

    /// Issues the draw call for every vertex.
    pub fn draw(&self) {
        let Some(vao) = self.vao else {
            warn!("Drawing a vertex array that was never created");
            return;
        };
        self.gpu.bind_vertex_array(Some(vao));
        self.gpu
            .draw_arrays(self.primitive.gl(), 0, self.vertex_count() as i32);
        self.gpu.bind_vertex_array(None);
    }

    pub fn bind(&self) {
        self.gpu.bind_vertex_array(self.vao);
    }

    pub fn unbind(&self) {
        self.gpu.bind_vertex_array(None);
    }

    /// Vertices drawn per call: the shortest stream decides.
    pub fn vertex_count(&self) -> usize {
        self.streams
            .iter()
            .map(VertexBufferData::num_vertices)
            .min()
            .unwrap_or(0)
    }

    pub fn vbo_data(&self, location: AttributeLocation) -> Option<&VertexBufferData> {
        self.streams.iter().find(|s| s.attribute == location)
    }

    /// Mutable access to a stream's data, e.g. before [`Self::reupload_vao`].
    pub fn vbo_data_mut(&mut self, location: AttributeLocation) -> Option<&mut VertexBufferData> {
        self.streams.iter_mut().find(|s| s.attribute == location)
    }

    pub fn vbo_handle(&self, location: AttributeLocation) -> Option<GlHandle> {
        let index = self.streams.iter().position(|s| s.attribute == location)?;
        self.vbos.get(index).copied()
    }

    pub fn vao_handle(&self) -> Option<GlHandle> {
        self.vao
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    /// Releases the vertex array and its buffers. The CPU-side streams are kept.
    pub fn destroy(&mut self) {
        for vbo in self.vbos.drain(..) {
            self.gpu.delete_buffer(vbo);
        }
        if let Some(vao) = self.vao.take() {
            self.gpu.delete_vertex_array(vao);
        }
    }
}

impl Drop for VertexArrayObject {
    fn drop(&mut self) {
        self.destroy();
    }
}
