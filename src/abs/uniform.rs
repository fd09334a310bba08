//! Uniform buffer objects.
//!
//! Values are written with std140 layout in mind: a `bool` occupies four
//! bytes, a `vec3` is written as three floats and the caller keeps it
//! 16-byte aligned.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use log::warn;

use crate::abs::gpu::{GlHandle, Gpu, check_error};
use crate::error::GpuError;

pub struct UniformBuffer {
    gpu: Arc<dyn Gpu>,
    handle: Option<GlHandle>,
    size: usize,
}

impl UniformBuffer {
    pub fn new(gpu: &Arc<dyn Gpu>) -> Self {
        Self {
            gpu: Arc::clone(gpu),
            handle: None,
            size: 0,
        }
    }

    /// Creates a buffer with `size` zeroed bytes of storage.
    pub fn with_size(gpu: &Arc<dyn Gpu>, size: usize) -> Result<Self, GpuError> {
        let mut buffer = Self::new(gpu);
        buffer.allocate_memory(size)?;
        Ok(buffer)
    }

    /// (Re)allocates the storage, discarding previous contents.
    pub fn allocate_memory(&mut self, size: usize) -> Result<(), GpuError> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = self.gpu.create_buffer()?;
                self.handle = Some(handle);
                handle
            }
        };

        self.gpu.bind_buffer(glow::UNIFORM_BUFFER, Some(handle));
        self.gpu
            .buffer_data_size(glow::UNIFORM_BUFFER, size, glow::DYNAMIC_DRAW);
        self.gpu.bind_buffer(glow::UNIFORM_BUFFER, None);

        if let Err(err) = check_error(self.gpu.as_ref(), "allocating a uniform buffer") {
            self.unload();
            return Err(err);
        }
        self.size = size;
        Ok(())
    }

    /// Binds the buffer to uniform binding point `slot`.
    pub fn bind(&self, slot: u32) {
        if self.handle.is_none() {
            warn!("Binding a uniform buffer with no storage to slot {slot}");
            return;
        }
        self.gpu
            .bind_buffer_base(glow::UNIFORM_BUFFER, slot, self.handle);
    }

    /// Writes `data` at byte `offset`. Writes past the end are dropped.
    pub fn send_data(&self, data: &[u8], offset: usize) {
        let Some(handle) = self.handle else {
            warn!("Writing to a uniform buffer with no storage");
            return;
        };
        if offset + data.len() > self.size {
            warn!(
                "Uniform write of {} bytes at {offset} exceeds buffer size {}",
                data.len(),
                self.size
            );
            return;
        }
        self.gpu.bind_buffer(glow::UNIFORM_BUFFER, Some(handle));
        self.gpu.buffer_sub_data(glow::UNIFORM_BUFFER, offset, data);
        self.gpu.bind_buffer(glow::UNIFORM_BUFFER, None);
    }

    pub fn send_bool(&self, value: bool, offset: usize) {
        self.send_data(bytemuck::bytes_of(&u32::from(value)), offset);
    }

    pub fn send_f32(&self, value: f32, offset: usize) {
        self.send_data(bytemuck::bytes_of(&value), offset);
    }

    pub fn send_vec3(&self, value: Vec3, offset: usize) {
        self.send_data(bytemuck::bytes_of(&value), offset);
    }

    pub fn send_vec4(&self, value: Vec4, offset: usize) {
        self.send_data(bytemuck::bytes_of(&value), offset);
    }

    pub fn send_mat4(&self, value: &Mat4, offset: usize) {
        self.send_data(bytemuck::bytes_of(value), offset);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn handle(&self) -> Option<GlHandle> {
        self.handle
    }

    pub fn unload(&mut self) -> bool {
        self.size = 0;
        match self.handle.take() {
            Some(handle) => {
                self.gpu.delete_buffer(handle);
                true
            }
            None => false,
        }
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abs::mock::MockGpu;

    fn setup() -> (Arc<MockGpu>, Arc<dyn Gpu>) {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        (mock, gpu)
    }

    #[test]
    fn writes_land_at_offset() {
        let (mock, gpu) = setup();
        let ubo = UniformBuffer::with_size(&gpu, 32).unwrap();
        ubo.send_vec4(Vec4::new(1.0, 2.0, 3.0, 4.0), 0);
        ubo.send_bool(true, 16);
        ubo.send_f32(0.5, 20);

        let state = mock.state();
        let store = &state.buffers[&ubo.handle().unwrap()];
        assert_eq!(store.len(), 32);
        assert_eq!(&store[4..8], &2.0f32.to_ne_bytes());
        assert_eq!(&store[16..20], &1u32.to_ne_bytes());
        assert_eq!(&store[20..24], &0.5f32.to_ne_bytes());
        assert!(!state.bound_buffers.contains_key(&glow::UNIFORM_BUFFER));
    }

    #[test]
    fn out_of_range_write_is_dropped() {
        let (mock, gpu) = setup();
        let ubo = UniformBuffer::with_size(&gpu, 4).unwrap();
        ubo.send_mat4(&Mat4::IDENTITY, 0);

        assert_eq!(mock.state().pending_error, glow::NO_ERROR);
        assert!(!mock.state().calls.contains(&"buffer_sub_data"));
    }

    #[test]
    fn bind_targets_slot() {
        let (mock, gpu) = setup();
        let ubo = UniformBuffer::with_size(&gpu, 4).unwrap();
        ubo.bind(6);
        assert_eq!(mock.state().uniform_bindings.get(&6).copied(), ubo.handle());
    }

    #[test]
    fn drop_deletes_buffer() {
        let (mock, gpu) = setup();
        let mut ubo = UniformBuffer::with_size(&gpu, 16).unwrap();
        ubo.allocate_memory(64).unwrap();
        assert_eq!(ubo.size(), 64);
        assert_eq!(mock.state().buffers.len(), 1);
        drop(ubo);
        assert!(mock.state().buffers.is_empty());
        assert_eq!(mock.state().invalid_deletes, 0);
    }
}
