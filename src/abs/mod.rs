//! This module contains the GPU resource abstractions: textures, render
//! targets, framebuffers, vertex geometry, uniform buffers and shader
//! programs, all issued through the [`Gpu`] seam.

pub mod context;
pub mod framebuffer;
pub mod gpu;
pub mod shader;
pub mod target;
pub mod texture;
pub mod uniform;
pub mod vertex;

#[cfg(test)]
pub mod mock;

pub use context::*;
pub use framebuffer::*;
pub use gpu::*;
pub use shader::*;
pub use target::*;
pub use texture::*;
pub use uniform::*;
pub use vertex::*;
