//! OpenGL shader programs.
//!
//! Only what the compositing passes need: compile and link a vertex and
//! fragment pair, bind it, and point sampler uniforms at texture units.

use std::path::Path;
use std::sync::Arc;

use log::{debug, error};

use crate::abs::gpu::{GlHandle, Gpu};
use crate::error::ShaderError;

/// A linked vertex + fragment program.
pub struct ShaderProgram {
    gpu: Arc<dyn Gpu>,
    id: GlHandle,
}

impl ShaderProgram {
    /// Compiles and links a program from source strings.
    pub fn new(gpu: &Arc<dyn Gpu>, vertex: &str, fragment: &str) -> Result<Self, ShaderError> {
        let id = gpu.create_program(vertex, fragment).inspect_err(|e| {
            error!("Failed to build shader program: {e}");
        })?;
        Ok(Self {
            gpu: Arc::clone(gpu),
            id,
        })
    }

    /// Reads both stages from disk and builds the program.
    pub fn from_files(
        gpu: &Arc<dyn Gpu>,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> Result<Self, ShaderError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        let vertex = read(vertex_path.as_ref())?;
        let fragment = read(fragment_path.as_ref())?;
        debug!(
            "Building shader program from {} and {}",
            vertex_path.as_ref().display(),
            fragment_path.as_ref().display()
        );
        Self::new(gpu, &vertex, &fragment)
    }

    pub fn bind(&self) {
        self.gpu.use_program(Some(self.id));
    }

    pub fn unbind(&self) {
        self.gpu.use_program(None);
    }

    /// Sets an `int` uniform, typically a sampler's texture unit. The
    /// program must be bound.
    pub fn set_i32(&self, name: &str, value: i32) {
        self.gpu.uniform_i32(self.id, name, value);
    }

    /// Points the uniform block `block` at binding point `slot`.
    pub fn bind_block(&self, block: &str, slot: u32) {
        self.gpu.uniform_block_binding(self.id, block, slot);
    }

    pub fn id(&self) -> GlHandle {
        self.id
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.gpu.delete_program(self.id);
    }
}
