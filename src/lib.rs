//! GPU resource lifecycle and render-target framework on top of `glow`.
//!
//! [`abs`] holds the resource objects (textures, framebuffers, geometry,
//! uniform buffers, shader programs). The remaining modules carry the
//! configuration, logging, lighting and shading state that drive them.

pub mod abs;
pub mod config;
pub mod error;
pub mod light;
pub mod logging;
pub mod shading;

pub use error::{Error, Result};
