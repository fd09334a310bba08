//! Render state shared by every framebuffer.
//!
//! [`RenderContext`] is built once after the GL context exists. It owns the
//! full-screen quad used for compositing and the hardware limits that
//! framebuffers validate against, and is passed by reference to every
//! framebuffer operation that needs them.

use std::sync::Arc;

use log::info;

use crate::abs::gpu::Gpu;
use crate::abs::vertex::{AttributeLocation, BufferUsage, VertexArrayObject, VertexBufferData};
use crate::error::GeometryError;

const QUAD_VERTICES: usize = 6;

/// Two screen-space triangles (xyz) followed by their UVs (uv).
///
/// Each triangle maps onto its own half of the UV square.
#[rustfmt::skip]
pub const FULL_SCREEN_QUAD: [f32; QUAD_VERTICES * 5] = [
    -1.0, -1.0, 0.0,
     1.0, -1.0, 0.0,
    -1.0,  1.0, 0.0,

     1.0,  1.0, 0.0,
    -1.0,  1.0, 0.0,
     1.0, -1.0, 0.0,

    0.0, 0.0,
    1.0, 0.0,
    0.0, 1.0,

    1.0, 1.0,
    0.0, 1.0,
    1.0, 0.0,
];

pub struct RenderContext {
    gpu: Arc<dyn Gpu>,
    full_screen_quad: VertexArrayObject,
    max_color_attachments: u32,
}

impl RenderContext {
    /// Uploads the full-screen quad and queries the color attachment limit.
    pub fn new(gpu: &Arc<dyn Gpu>) -> Result<Self, GeometryError> {
        let (positions, uvs) = FULL_SCREEN_QUAD.split_at(QUAD_VERTICES * 3);

        let mut full_screen_quad = VertexArrayObject::new(gpu);
        full_screen_quad.add_vbo(VertexBufferData::from_f32(
            AttributeLocation::Vertex,
            3,
            positions,
        ))?;
        full_screen_quad.add_vbo(VertexBufferData::from_f32(
            AttributeLocation::TexCoord,
            2,
            uvs,
        ))?;
        full_screen_quad.create_vao(BufferUsage::StaticDraw)?;

        let max_color_attachments =
            u32::try_from(gpu.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS)).unwrap_or(0);
        info!("Render context ready, {max_color_attachments} color attachments available");

        Ok(Self {
            gpu: Arc::clone(gpu),
            full_screen_quad,
            max_color_attachments,
        })
    }

    pub fn gpu(&self) -> &Arc<dyn Gpu> {
        &self.gpu
    }

    pub fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    pub fn full_screen_quad(&self) -> &VertexArrayObject {
        &self.full_screen_quad
    }

    /// Draws the full-screen quad into whatever framebuffer is bound.
    pub fn draw_fsq(&self) {
        self.full_screen_quad.draw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abs::mock::MockGpu;

    #[test]
    fn builds_quad_and_reads_limit() {
        let mock = MockGpu::with_max_color_attachments(4);
        let gpu: Arc<dyn Gpu> = mock.clone();
        let ctx = RenderContext::new(&gpu).unwrap();

        assert_eq!(ctx.max_color_attachments(), 4);
        let quad = ctx.full_screen_quad();
        assert_eq!(quad.vertex_count(), 6);
        let uvs = quad.vbo_data(AttributeLocation::TexCoord).unwrap();
        assert_eq!(uvs.elements_per_attribute, 2);
        assert_eq!(uvs.num_elements(), 12);
        let uv_values: Vec<f32> = uvs
            .data
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(&uv_values[..2], &[0.0, 0.0]);
        assert_eq!(&uv_values[6..8], &[1.0, 1.0]);
    }

    #[test]
    fn draw_fsq_reuses_geometry() {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        let ctx = RenderContext::new(&gpu).unwrap();
        ctx.draw_fsq();
        ctx.draw_fsq();

        let state = mock.state();
        assert_eq!(state.vertex_arrays_created, 1);
        assert_eq!(state.draws.len(), 2);
        assert!(state.draws.iter().all(|d| d.count == 6));
    }
}
