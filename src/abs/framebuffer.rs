//! Module to work with OpenGL framebuffers.
//!
//! A [`Framebuffer`] is declared first (an optional depth target plus any
//! number of color targets), then allocated on the GPU with
//! [`Framebuffer::init`]. Declarations survive [`Framebuffer::reshape`] and
//! [`Framebuffer::unload`]; the GPU objects do not.
//!
//! ```text
//! Unconfigured --add_*_target--> Configured --init--> Initialized
//!                                    ^                     |
//!                                    +--------unload-------+
//! ```

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::abs::context::RenderContext;
use crate::abs::gpu::{GlHandle, Gpu, check_error};
use crate::abs::target::{ColorFormat, ColorTarget, DEPTH_FORMAT, DepthTarget};
use crate::abs::texture::{TextureFilter, TextureWrap};
use crate::error::FramebufferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferState {
    /// Nothing declared yet.
    Unconfigured,
    /// Attachments declared, nothing allocated.
    Configured,
    /// GPU-resident with every attachment bound.
    Initialized,
}

/// Represents an OpenGL framebuffer and the images attached to it.
pub struct Framebuffer {
    gpu: Arc<dyn Gpu>,
    fbo: Option<GlHandle>,
    width: u32,
    height: u32,
    depth_active: bool,
    depth: DepthTarget,
    color: ColorTarget,
    clear_mask: u32,
    filter: TextureFilter,
    wrap: TextureWrap,
}

impl Framebuffer {
    /// Creates an empty framebuffer. Color attachments default to nearest
    /// filtering and clamp-to-edge wrapping.
    pub fn new(ctx: &RenderContext) -> Self {
        let gpu = ctx.gpu();
        Self {
            gpu: Arc::clone(gpu),
            fbo: None,
            width: 0,
            height: 0,
            depth_active: false,
            depth: DepthTarget::new(gpu),
            color: ColorTarget::new(gpu),
            clear_mask: 0,
            filter: TextureFilter::Nearest,
            wrap: TextureWrap::ClampToEdge,
        }
    }

    pub fn state(&self) -> FramebufferState {
        if self.fbo.is_some() {
            FramebufferState::Initialized
        } else if self.depth_active || !self.color.is_empty() {
            FramebufferState::Configured
        } else {
            FramebufferState::Unconfigured
        }
    }

    /// Declares the depth attachment.
    pub fn add_depth_target(&mut self) -> Result<(), FramebufferError> {
        if self.is_initialized() {
            return Err(FramebufferError::AlreadyInitialized);
        }
        if self.depth_active {
            return Err(FramebufferError::DepthTargetExists);
        }
        self.depth.unload();
        self.depth_active = true;
        Ok(())
    }

    /// Declares the next color attachment. The attachment layout is frozen
    /// once the framebuffer is initialized.
    pub fn add_color_target(&mut self, format: ColorFormat) -> Result<(), FramebufferError> {
        if self.is_initialized() {
            return Err(FramebufferError::AlreadyInitialized);
        }
        self.color.push(format);
        Ok(())
    }

    /// Sets the dimensions used by the next [`Framebuffer::init`].
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Filter applied to color attachments on the next allocation.
    pub fn set_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
    }

    /// Wrap mode applied to color attachments on the next allocation.
    pub fn set_wrap(&mut self, wrap: TextureWrap) {
        self.wrap = wrap;
    }

    pub fn init_with_size(
        &mut self,
        ctx: &RenderContext,
        width: u32,
        height: u32,
    ) -> Result<(), FramebufferError> {
        self.set_size(width, height);
        self.init(ctx)
    }

    /// Allocates the framebuffer and every declared attachment, then
    /// validates completeness.
    ///
    /// On error every GPU object created along the way is released and the
    /// framebuffer is left in the [`FramebufferState::Configured`] state.
    pub fn init(&mut self, ctx: &RenderContext) -> Result<(), FramebufferError> {
        self.validate(ctx, self.width, self.height)?;
        if self.is_initialized() {
            return Err(FramebufferError::AlreadyInitialized);
        }

        let fbo = self.gpu.create_framebuffer()?;
        self.fbo = Some(fbo);
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));

        if let Err(err) = self.allocate_attachments() {
            error!("Failed to allocate framebuffer attachments: {err}");
            self.gpu.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.unload();
            return Err(err);
        }

        let status = self.gpu.check_framebuffer_status(glow::FRAMEBUFFER);
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, None);
        if status != glow::FRAMEBUFFER_COMPLETE {
            error!("Framebuffer incomplete after init: status 0x{status:04X}");
            self.unload();
            return Err(FramebufferError::Incomplete { status });
        }

        info!(
            "Framebuffer initialized: {} x {}, {} depth, {} color attachment(s)",
            self.width,
            self.height,
            u32::from(self.depth_active),
            self.color.len()
        );
        Ok(())
    }

    /// Checks that the declared layout can be allocated at `width` x `height`
    /// without touching the GPU.
    fn validate(
        &self,
        ctx: &RenderContext,
        width: u32,
        height: u32,
    ) -> Result<(), FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::ZeroSize { width, height });
        }
        if !self.depth_active && self.color.is_empty() {
            return Err(FramebufferError::NoAttachments);
        }
        let max = ctx.max_color_attachments();
        if self.color.len() > max as usize {
            return Err(FramebufferError::TooManyColorAttachments {
                requested: self.color.len(),
                max,
            });
        }
        Ok(())
    }

    /// Creates and attaches the declared images to the bound framebuffer.
    fn allocate_attachments(&mut self) -> Result<(), FramebufferError> {
        let (width, height) = (self.width, self.height);
        let gpu = Arc::clone(&self.gpu);
        self.clear_mask = 0;

        if self.depth_active {
            self.clear_mask |= glow::DEPTH_BUFFER_BIT;
            let texture = gpu.create_texture()?;
            self.depth.texture = Some(texture);
            gpu.bind_texture(glow::TEXTURE_2D, Some(texture));
            gpu.tex_storage_2d(glow::TEXTURE_2D, 1, DEPTH_FORMAT, width, height);
            set_sampling(gpu.as_ref(), TextureFilter::Nearest, TextureWrap::ClampToEdge);
            gpu.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            debug!("\t1 depth attachment");
        }

        if !self.color.is_empty() {
            self.clear_mask |= glow::COLOR_BUFFER_BIT;
            let formats = self.color.formats().to_vec();
            for (i, format) in formats.iter().enumerate() {
                let texture = gpu.create_texture()?;
                self.color.textures.push(texture);
                gpu.bind_texture(glow::TEXTURE_2D, Some(texture));
                gpu.tex_storage_2d(glow::TEXTURE_2D, 1, format.internal_format(), width, height);
                set_sampling(gpu.as_ref(), self.filter, self.wrap);
                gpu.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0 + i as u32,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
            }
            debug!("\t{} color attachment(s)", formats.len());
        }

        gpu.bind_texture(glow::TEXTURE_2D, None);
        check_error(gpu.as_ref(), "allocating framebuffer attachments")?;
        Ok(())
    }

    /// Reallocates everything at a new size, keeping the declared attachments.
    ///
    /// A size or layout that cannot be allocated is rejected before anything
    /// is released, so the current allocation stays usable.
    pub fn reshape(
        &mut self,
        ctx: &RenderContext,
        width: u32,
        height: u32,
    ) -> Result<(), FramebufferError> {
        if !self.is_initialized() {
            return Err(FramebufferError::NotInitialized);
        }
        self.validate(ctx, width, height)?;
        self.set_size(width, height);
        self.unload();
        self.init(ctx)
    }

    /// Releases the framebuffer object and every attachment image.
    ///
    /// Returns whether anything was released; calling it again is a no-op.
    pub fn unload(&mut self) -> bool {
        let framebuffer = match self.fbo.take() {
            Some(fbo) => {
                self.gpu.delete_framebuffer(fbo);
                true
            }
            None => false,
        };
        let depth = self.depth.unload();
        let color = self.color.unload();
        framebuffer || depth || color
    }

    /// Queries completeness of the allocated framebuffer.
    pub fn check_fbo(&self) -> bool {
        let Some(fbo) = self.fbo else {
            error!("Completeness check on a framebuffer that is not initialized");
            return false;
        };
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        let status = self.gpu.check_framebuffer_status(glow::FRAMEBUFFER);
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, None);
        if status != glow::FRAMEBUFFER_COMPLETE {
            error!("Framebuffer not complete: status 0x{status:04X}");
            return false;
        }
        true
    }

    /// Binds the framebuffer for rendering and declares its draw buffers.
    pub fn bind(&self) {
        let Some(fbo) = self.fbo else {
            warn!("Binding a framebuffer that is not initialized");
            return;
        };
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        if !self.color.is_empty() {
            self.gpu.draw_buffers(self.color.buffers());
        }
    }

    /// Unbinds the framebuffer, reverting to the default framebuffer.
    pub fn unbind(&self) {
        self.gpu.bind_framebuffer(glow::FRAMEBUFFER, None);
    }

    pub fn set_viewport(&self) {
        self.gpu.viewport(0, 0, self.width as i32, self.height as i32);
    }

    /// Draws the full-screen quad into this framebuffer.
    pub fn render_to_fsq(&self, ctx: &RenderContext) -> Result<(), FramebufferError> {
        if !self.is_initialized() {
            return Err(FramebufferError::NotInitialized);
        }
        self.set_viewport();
        self.bind();
        ctx.draw_fsq();
        self.unbind();
        Ok(())
    }

    /// Blits the color content straight to the default framebuffer.
    pub fn backbuffer(&self) {
        let Some(fbo) = self.fbo else {
            warn!("Resolving a framebuffer that is not initialized");
            return;
        };
        let rect = [0, 0, self.width as i32, self.height as i32];
        self.gpu.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(fbo));
        self.gpu.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        self.gpu
            .blit_framebuffer(rect, rect, glow::COLOR_BUFFER_BIT, glow::NEAREST);
        self.gpu.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
    }

    /// Exposes a color attachment for sampling on texture unit `slot`.
    pub fn bind_color_as_texture(&self, index: usize, slot: u32) -> Result<(), FramebufferError> {
        if !self.is_initialized() {
            return Err(FramebufferError::NotInitialized);
        }
        if index >= self.color.len() {
            return Err(FramebufferError::ColorIndexOutOfRange {
                index,
                count: self.color.len(),
            });
        }
        self.color.bind(index, slot);
        Ok(())
    }

    /// Exposes the depth attachment for sampling on texture unit `slot`.
    pub fn bind_depth_as_texture(&self, slot: u32) -> Result<(), FramebufferError> {
        if !self.is_initialized() {
            return Err(FramebufferError::NotInitialized);
        }
        if !self.depth_active {
            return Err(FramebufferError::NoDepthTarget);
        }
        self.depth.bind(slot);
        Ok(())
    }

    pub fn unbind_texture(&self, slot: u32) {
        self.gpu.active_texture(slot);
        self.gpu.bind_texture(glow::TEXTURE_2D, None);
    }

    /// Clears every attachment kind present.
    pub fn clear(&self) {
        if !self.is_initialized() {
            warn!("Clearing a framebuffer that is not initialized");
            return;
        }
        self.bind();
        self.gpu.clear(self.clear_mask);
        self.unbind();
    }

    pub fn is_initialized(&self) -> bool {
        self.fbo.is_some()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn handle(&self) -> Option<GlHandle> {
        self.fbo
    }

    pub fn depth_enabled(&self) -> bool {
        self.depth_active
    }

    pub fn depth_handle(&self) -> Option<GlHandle> {
        self.depth.handle()
    }

    pub fn color_attachment_count(&self) -> usize {
        self.color.len()
    }

    pub fn color_formats(&self) -> &[ColorFormat] {
        self.color.formats()
    }

    pub fn color_handle(&self, index: usize) -> Option<GlHandle> {
        self.color.handles().get(index).copied()
    }

    pub fn draw_buffers(&self) -> &[u32] {
        self.color.buffers()
    }

    /// Bitwise OR of the clear bits for the attachment kinds present.
    pub fn clear_mask(&self) -> u32 {
        self.clear_mask
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn wrap(&self) -> TextureWrap {
        self.wrap
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Attachments have a single level, so mipmapped filters fall back to their
/// base-level counterpart.
fn set_sampling(gpu: &dyn Gpu, filter: TextureFilter, wrap: TextureWrap) {
    let filter = filter.without_mipmaps();
    gpu.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter.gl() as i32);
    gpu.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter.gl() as i32);
    gpu.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap.gl() as i32);
    gpu.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap.gl() as i32);
}
