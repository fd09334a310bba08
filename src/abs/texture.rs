//! Structs and functions for handling textures.
//!
//! The module provides the [`Texture`] struct which is a CPU representation of a GPU texture,
//! together with the sampling enums shared with render targets.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::abs::gpu::{GlHandle, Gpu, TEXTURE_MAX_ANISOTROPY, check_error};
use crate::error::TextureError;

/// Minification/magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl TextureFilter {
    pub const ALL: [Self; 6] = [
        Self::Nearest,
        Self::Linear,
        Self::NearestMipmapNearest,
        Self::LinearMipmapNearest,
        Self::NearestMipmapLinear,
        Self::LinearMipmapLinear,
    ];

    pub fn gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
            Self::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
            Self::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
            Self::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
            Self::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
        }
    }

    /// Whether sampling with this filter reads more than the base level.
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }

    /// The filter to fall back to when only the base level exists.
    pub fn without_mipmaps(self) -> Self {
        match self {
            Self::Nearest | Self::NearestMipmapNearest | Self::NearestMipmapLinear => Self::Nearest,
            Self::Linear | Self::LinearMipmapNearest | Self::LinearMipmapLinear => Self::Linear,
        }
    }
}

/// Edge behaviour outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureWrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl TextureWrap {
    pub fn gl(self) -> u32 {
        match self {
            Self::Repeat => glow::REPEAT,
            Self::MirroredRepeat => glow::MIRRORED_REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
            Self::ClampToBorder => glow::CLAMP_TO_BORDER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    /// Volumetric image, used for colour lookup tables.
    Texture3D,
}

impl TextureTarget {
    pub fn gl(self) -> u32 {
        match self {
            Self::Texture2D => glow::TEXTURE_2D,
            Self::Texture3D => glow::TEXTURE_3D,
        }
    }
}

/// Parameters for [`Texture::create_texture`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub target: TextureTarget,
    /// Used for both minification and magnification.
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    pub internal_format: u32,
    pub format: u32,
    pub data_type: u32,
}

impl TextureDesc {
    /// An RGBA8 image with linear filtering and clamped edges.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            target: TextureTarget::Texture2D,
            filter: TextureFilter::Linear,
            wrap: TextureWrap::ClampToEdge,
            internal_format: glow::RGBA8,
            format: glow::RGBA,
            data_type: glow::UNSIGNED_BYTE,
        }
    }
}

/// Represents a texture stored on the GPU side.
///
/// The GL handle is `None` until the texture is loaded or created, and a
/// texture holding a handle always has its storage and sampling parameters
/// fully applied.
pub struct Texture {
    gpu: Arc<dyn Gpu>,
    handle: Option<GlHandle>,
    target: TextureTarget,
    width: u32,
    height: u32,
    depth: u32,
    channels: u32,
    internal_format: u32,
    mag_filter: TextureFilter,
    min_filter: TextureFilter,
    wrap: [TextureWrap; 3],
    levels: u32,
    anisotropy: f32,
    path: Option<PathBuf>,
}

impl Texture {
    /// Creates an empty texture. Nothing is allocated on the GPU until
    /// [`Texture::load`] or [`Texture::create_texture`] is called.
    pub fn new(gpu: &Arc<dyn Gpu>) -> Self {
        Self {
            gpu: Arc::clone(gpu),
            handle: None,
            target: TextureTarget::Texture2D,
            width: 0,
            height: 0,
            depth: 0,
            channels: 0,
            internal_format: glow::RGBA8,
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::LinearMipmapLinear,
            wrap: [TextureWrap::Repeat; 3],
            levels: 0,
            anisotropy: 16.0,
            path: None,
        }
    }

    /// Creates a texture and immediately loads the image at `path`.
    pub fn from_file(
        gpu: &Arc<dyn Gpu>,
        path: impl AsRef<Path>,
        mipmaps: bool,
    ) -> Result<Self, TextureError> {
        let mut texture = Self::new(gpu);
        texture.load(path, mipmaps)?;
        Ok(texture)
    }

    /// Decodes the image file at `path` and uploads it as RGBA8.
    ///
    /// Any storage this texture held before is released first. On failure
    /// the texture is left unallocated.
    pub fn load(&mut self, path: impl AsRef<Path>, mipmaps: bool) -> Result<(), TextureError> {
        let path = path.as_ref();
        self.path = Some(path.to_path_buf());
        let image = image::open(path).map_err(|source| {
            error!("Failed to decode texture {}: {source}", path.display());
            self.unload();
            TextureError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.load_image(&image, mipmaps)
    }

    /// Uploads an already decoded image as RGBA8.
    pub fn load_image(&mut self, image: &DynamicImage, mipmaps: bool) -> Result<(), TextureError> {
        let (width, height) = image.dimensions();
        let channels = u32::from(image.color().channel_count());
        if width == 0 || height == 0 || channels == 0 {
            let path = self.path.clone().unwrap_or_default();
            error!("Texture {} decoded to an empty image", path.display());
            self.unload();
            return Err(TextureError::Empty {
                path,
                width,
                height,
            });
        }

        self.unload();
        self.target = TextureTarget::Texture2D;
        self.internal_format = glow::RGBA8;
        self.width = width;
        self.height = height;
        self.depth = 1;
        self.channels = channels;
        let levels = self.count_mip_map_levels(mipmaps);
        if levels == 1 && self.min_filter.uses_mipmaps() {
            debug!(
                "Texture has no mip chain, sampling with {:?} instead of {:?}",
                self.min_filter.without_mipmaps(),
                self.min_filter
            );
        }

        let pixels = image.to_rgba8();
        let handle = self.gpu.create_texture()?;
        let gl = self.target.gl();
        self.gpu.bind_texture(gl, Some(handle));
        self.gpu
            .tex_storage_2d(gl, levels, self.internal_format, width, height);
        self.gpu.tex_sub_image_2d(
            gl,
            0,
            width,
            height,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            pixels.as_raw(),
        );
        if mipmaps {
            self.gpu.generate_mipmap(gl);
            self.gpu
                .tex_parameter_f32(gl, TEXTURE_MAX_ANISOTROPY, self.anisotropy);
        }
        self.apply_parameters(levels);
        self.gpu.bind_texture(gl, None);

        self.finish(handle, levels, "uploading texture")
    }

    /// Parses a `.cube` colour lookup table and uploads it as a volumetric texture.
    pub fn load_lut(&mut self, path: impl AsRef<Path>) -> Result<(), TextureError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TextureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let lut: CubeLut = source.parse()?;

        self.unload();
        self.path = Some(path.to_path_buf());
        self.target = TextureTarget::Texture3D;
        self.internal_format = glow::RGB32F;
        self.width = lut.size;
        self.height = lut.size;
        self.depth = lut.size;
        self.channels = 3;
        self.mag_filter = TextureFilter::Linear;
        self.min_filter = TextureFilter::Linear;
        self.wrap = [TextureWrap::Repeat; 3];

        let handle = self.gpu.create_texture()?;
        let gl = self.target.gl();
        self.gpu.bind_texture(gl, Some(handle));
        self.apply_parameters(1);
        self.gpu.tex_image_3d(
            gl,
            self.internal_format,
            lut.size,
            lut.size,
            lut.size,
            glow::RGB,
            glow::FLOAT,
            Some(bytemuck::cast_slice(&lut.entries)),
        );
        self.gpu.bind_texture(gl, None);

        self.finish(handle, 1, "uploading colour lookup table")
    }

    /// Allocates mutable storage for a procedurally filled or render-only image.
    ///
    /// `data` may be `None`, in which case the storage is left uninitialised.
    pub fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<&[u8]>,
    ) -> Result<(), TextureError> {
        self.unload();
        self.width = desc.width;
        self.height = desc.height;
        self.depth = 1;
        self.target = desc.target;
        self.internal_format = desc.internal_format;
        self.mag_filter = desc.filter;
        self.min_filter = desc.filter;
        self.wrap = [desc.wrap; 3];

        let handle = self.gpu.create_texture()?;
        let gl = self.target.gl();
        self.gpu.bind_texture(gl, Some(handle));
        self.apply_parameters(1);
        self.gpu.tex_image_2d(
            gl,
            desc.internal_format,
            desc.width,
            desc.height,
            desc.format,
            desc.data_type,
            data,
        );
        self.gpu.bind_texture(gl, None);

        self.finish(handle, 1, "creating texture")
    }

    /// Takes ownership of `handle` if GL reported no error, otherwise releases it.
    fn finish(
        &mut self,
        handle: GlHandle,
        levels: u32,
        during: &'static str,
    ) -> Result<(), TextureError> {
        if let Err(err) = check_error(self.gpu.as_ref(), during) {
            error!("{err}");
            self.gpu.delete_texture(handle);
            return Err(err.into());
        }
        self.handle = Some(handle);
        self.levels = levels;
        Ok(())
    }

    /// Number of mip levels for the current dimensions: a full chain down
    /// to 1x1 when `enabled`, otherwise just the base level.
    pub fn count_mip_map_levels(&self, enabled: bool) -> u32 {
        if !enabled {
            return 1;
        }
        1 + self.width.max(self.height).max(1).ilog2()
    }

    /// Regenerates the mip chain from the base level and applies anisotropic filtering.
    pub fn generate_mip_maps(&self) -> Result<(), TextureError> {
        let handle = self.handle.ok_or(TextureError::Unallocated)?;
        let gl = self.target.gl();
        self.gpu.bind_texture(gl, Some(handle));
        self.gpu.generate_mipmap(gl);
        self.gpu
            .tex_parameter_f32(gl, TEXTURE_MAX_ANISOTROPY, self.anisotropy);
        self.gpu.bind_texture(gl, None);
        Ok(())
    }

    /// Sets the filters used by the next upload or [`Texture::send_tex_parameters`].
    pub fn set_filter_parameters(&mut self, mag: TextureFilter, min: TextureFilter) {
        self.mag_filter = mag;
        self.min_filter = min;
    }

    /// Sets the wrap mode on all three axes.
    pub fn set_wrap_parameters(&mut self, wrap: TextureWrap) {
        self.wrap = [wrap; 3];
    }

    pub fn set_anisotropy(&mut self, amount: f32) {
        self.anisotropy = amount;
    }

    /// Re-applies the filter and wrap parameters to the live image.
    pub fn send_tex_parameters(&self) -> Result<(), TextureError> {
        let handle = self.handle.ok_or(TextureError::Unallocated)?;
        let gl = self.target.gl();
        self.gpu.bind_texture(gl, Some(handle));
        self.apply_parameters(self.levels);
        self.gpu.bind_texture(gl, None);
        Ok(())
    }

    /// Writes the sampling state for an image with `levels` mip levels. A
    /// single-level image samples with the base-level counterpart of the
    /// configured min filter.
    fn apply_parameters(&self, levels: u32) {
        let gl = self.target.gl();
        let gpu = &self.gpu;
        let min_filter = if levels > 1 {
            self.min_filter
        } else {
            self.min_filter.without_mipmaps()
        };
        gpu.tex_parameter_i32(gl, glow::TEXTURE_MIN_FILTER, min_filter.gl() as i32);
        gpu.tex_parameter_i32(gl, glow::TEXTURE_MAG_FILTER, self.mag_filter.gl() as i32);
        gpu.tex_parameter_i32(gl, glow::TEXTURE_WRAP_S, self.wrap[0].gl() as i32);
        gpu.tex_parameter_i32(gl, glow::TEXTURE_WRAP_T, self.wrap[1].gl() as i32);
        if self.target == TextureTarget::Texture3D {
            gpu.tex_parameter_i32(gl, glow::TEXTURE_WRAP_R, self.wrap[2].gl() as i32);
        }
    }

    /// Binds the texture to the currently active texture unit.
    pub fn bind(&self) {
        self.gpu.bind_texture(self.target.gl(), self.handle);
    }

    /// Binds the texture to the specified texture unit.
    pub fn bind_to_unit(&self, unit: u32) {
        self.gpu.active_texture(unit);
        self.bind();
    }

    pub fn unbind(&self) {
        self.gpu.bind_texture(self.target.gl(), None);
    }

    pub fn unbind_from_unit(&self, unit: u32) {
        self.gpu.active_texture(unit);
        self.unbind();
    }

    /// Releases the GPU image. Returns whether anything was released.
    pub fn unload(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                self.gpu.delete_texture(handle);
                self.levels = 0;
                true
            }
            None => false,
        }
    }

    pub fn handle(&self) -> Option<GlHandle> {
        self.handle
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    /// Returns the width of the texture.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the texture.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Channel count of the source image (uploads are always RGBA).
    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn internal_format(&self) -> u32 {
        self.internal_format
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn filters(&self) -> (TextureFilter, TextureFilter) {
        (self.mag_filter, self.min_filter)
    }

    pub fn wrap(&self) -> [TextureWrap; 3] {
        self.wrap
    }

    pub fn anisotropy(&self) -> f32 {
        self.anisotropy
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.unload();
    }
}

/// A cubic colour lookup table in `.cube` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeLut {
    pub size: u32,
    pub entries: Vec<[f32; 3]>,
}

impl FromStr for CubeLut {
    type Err = TextureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut declared = None;
        let mut entries = Vec::new();

        for (number, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(size) = line.strip_prefix("LUT_3D_SIZE") {
                let size = size.trim().parse::<u32>().map_err(|_| {
                    TextureError::InvalidLut(format!("bad LUT_3D_SIZE on line {}", number + 1))
                })?;
                declared = Some(size);
                continue;
            }
            if line.starts_with(|c: char| c.is_ascii_alphabetic()) {
                // TITLE, DOMAIN_MIN, DOMAIN_MAX
                continue;
            }

            let values = line
                .split_whitespace()
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| {
                    TextureError::InvalidLut(format!("bad entry on line {}", number + 1))
                })?;
            match values.as_slice() {
                &[r, g, b] => entries.push([r, g, b]),
                _ => {
                    return Err(TextureError::InvalidLut(format!(
                        "expected 3 values on line {}, found {}",
                        number + 1,
                        values.len()
                    )));
                }
            }
        }

        let count = entries.len();
        let size = match declared {
            Some(size) => size,
            None => (count as f64).cbrt().round() as u32,
        };
        if size == 0 || (size as usize).checked_pow(3) != Some(count) {
            return Err(TextureError::InvalidLut(format!(
                "{count} entries do not form a {size}^3 cube"
            )));
        }

        Ok(Self { size, entries })
    }
}
