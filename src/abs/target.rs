//! Images owned by a framebuffer as attachments.
//!
//! Neither target allocates anything by itself: the owning
//! [`Framebuffer`](crate::abs::Framebuffer) decides formats and sampling
//! policy and hands the created images over. The targets only own and
//! release them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::abs::gpu::{GlHandle, Gpu};

/// Internal format of a color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    Rgb8,
    Rgba8,
    R32F,
    Rg16F,
    Rgb16F,
    Rgba16F,
    Rgba32F,
}

impl ColorFormat {
    pub fn internal_format(self) -> u32 {
        match self {
            Self::Rgb8 => glow::RGB8,
            Self::Rgba8 => glow::RGBA8,
            Self::R32F => glow::R32F,
            Self::Rg16F => glow::RG16F,
            Self::Rgb16F => glow::RGB16F,
            Self::Rgba16F => glow::RGBA16F,
            Self::Rgba32F => glow::RGBA32F,
        }
    }
}

/// Internal format of every depth attachment.
pub const DEPTH_FORMAT: u32 = glow::DEPTH_COMPONENT24;

/// The single depth image of a framebuffer.
///
/// Always nearest-filtered and clamped to edge.
pub struct DepthTarget {
    gpu: Arc<dyn Gpu>,
    pub(super) texture: Option<GlHandle>,
}

impl DepthTarget {
    pub(super) fn new(gpu: &Arc<dyn Gpu>) -> Self {
        Self {
            gpu: Arc::clone(gpu),
            texture: None,
        }
    }

    /// Releases the depth image. Safe to call repeatedly.
    pub fn unload(&mut self) -> bool {
        match self.texture.take() {
            Some(texture) => {
                self.gpu.delete_texture(texture);
                true
            }
            None => false,
        }
    }

    pub fn handle(&self) -> Option<GlHandle> {
        self.texture
    }

    pub(super) fn bind(&self, unit: u32) {
        self.gpu.active_texture(unit);
        self.gpu.bind_texture(glow::TEXTURE_2D, self.texture);
    }
}

impl Drop for DepthTarget {
    fn drop(&mut self) {
        self.unload();
    }
}

/// The ordered color images of a framebuffer.
///
/// Declaration order is attachment order: the `i`th format declared is
/// attached at `COLOR_ATTACHMENT0 + i`.
pub struct ColorTarget {
    gpu: Arc<dyn Gpu>,
    formats: Vec<ColorFormat>,
    buffers: Vec<u32>,
    pub(super) textures: Vec<GlHandle>,
}

impl ColorTarget {
    pub(super) fn new(gpu: &Arc<dyn Gpu>) -> Self {
        Self {
            gpu: Arc::clone(gpu),
            formats: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, format: ColorFormat) {
        self.buffers
            .push(glow::COLOR_ATTACHMENT0 + self.formats.len() as u32);
        self.formats.push(format);
    }

    /// Releases every attachment image in one batch.
    pub fn unload(&mut self) -> bool {
        if self.textures.is_empty() {
            return false;
        }
        debug_assert_eq!(
            self.textures.len(),
            self.formats.len(),
            "color attachment count changed while allocated"
        );
        self.gpu.delete_textures(&self.textures);
        self.textures.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn formats(&self) -> &[ColorFormat] {
        &self.formats
    }

    /// The draw-buffer list, one `COLOR_ATTACHMENTi` per declared format.
    pub fn buffers(&self) -> &[u32] {
        &self.buffers
    }

    pub fn handles(&self) -> &[GlHandle] {
        &self.textures
    }

    pub(super) fn bind(&self, index: usize, unit: u32) {
        self.gpu.active_texture(unit);
        self.gpu
            .bind_texture(glow::TEXTURE_2D, self.textures.get(index).copied());
    }
}

impl Drop for ColorTarget {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abs::mock::MockGpu;

    #[test]
    fn draw_buffers_follow_declaration_order() {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        let mut color = ColorTarget::new(&gpu);
        color.push(ColorFormat::Rgb8);
        color.push(ColorFormat::Rgba16F);
        color.push(ColorFormat::R32F);

        assert_eq!(color.len(), 3);
        assert_eq!(
            color.buffers(),
            &[
                glow::COLOR_ATTACHMENT0,
                glow::COLOR_ATTACHMENT1,
                glow::COLOR_ATTACHMENT2
            ]
        );
        assert_eq!(
            color.formats(),
            &[ColorFormat::Rgb8, ColorFormat::Rgba16F, ColorFormat::R32F]
        );
    }

    #[test]
    fn unload_releases_batch_once() {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        let mut color = ColorTarget::new(&gpu);
        color.push(ColorFormat::Rgba8);
        color.push(ColorFormat::Rgba8);
        color.textures = vec![gpu.create_texture().unwrap(), gpu.create_texture().unwrap()];

        assert!(color.unload());
        assert!(!color.unload());
        assert_eq!(mock.live_textures(), 0);
        assert_eq!(mock.state().invalid_deletes, 0);
        assert_eq!(color.len(), 2);
    }

    #[test]
    fn depth_unload_is_repeatable() {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        let mut depth = DepthTarget::new(&gpu);
        assert!(!depth.unload());
        depth.texture = Some(gpu.create_texture().unwrap());
        assert!(depth.unload());
        assert!(!depth.unload());
        assert_eq!(mock.live_textures(), 0);
    }
}
