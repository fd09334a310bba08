//! Error types shared by the GPU abstractions.
//!
//! Every fallible operation in [`crate::abs`] returns one of the enums below.
//! The crate-level [`Error`] wraps them all so callers can use `?` freely.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A GL object could not be created or filled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    /// The driver refused to hand out a new object name.
    #[error("failed to create GL {kind}: {message}")]
    Create { kind: &'static str, message: String },
    /// `glGetError` reported a failure after an allocation or upload.
    #[error("GL error 0x{code:04X} while {during}")]
    Allocation { code: u32, during: &'static str },
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} decoded to an empty buffer ({width}x{height})")]
    Empty {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid colour lookup table: {0}")]
    InvalidLut(String),
    #[error("texture has no GPU storage")]
    Unallocated,
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Misuse of a [`crate::abs::Framebuffer`] or a failure while allocating it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramebufferError {
    #[error("framebuffer size not set ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },
    #[error("framebuffer already initialized")]
    AlreadyInitialized,
    #[error("framebuffer not initialized")]
    NotInitialized,
    #[error("depth target already added")]
    DepthTargetExists,
    #[error("framebuffer has no depth target")]
    NoDepthTarget,
    #[error("framebuffer has no attachments")]
    NoAttachments,
    #[error("{requested} color attachments requested but the hardware supports {max}")]
    TooManyColorAttachments { requested: usize, max: u32 },
    #[error("color attachment {index} out of range ({count} attachments)")]
    ColorIndexOutOfRange { index: usize, count: usize },
    #[error("framebuffer incomplete: status 0x{status:04X}")]
    Incomplete { status: u32 },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("vertex array already created")]
    AlreadyCreated,
    #[error("vertex array not created")]
    NotCreated,
    #[error("no vertex streams registered")]
    Empty,
    #[error("stream for attribute {location} registered twice")]
    DuplicateAttribute { location: u32 },
    #[error("stream for attribute {location} has {len} bytes, not a multiple of {stride}")]
    Misaligned { location: u32, len: usize, stride: usize },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader compilation failed: {0}")]
    Compile(String),
    #[error("shader link failed: {0}")]
    Link(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no platform config directory")]
    NoConfigDir,
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Framebuffer(#[from] FramebufferError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Log(#[from] log::SetLoggerError),
    /// Window or GL context creation failed.
    #[error("window setup failed: {0}")]
    Window(String),
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
