//! Mock GPU for unit tests (no GL context required).
//!
//! [`MockGpu`] hands out object names, tracks which ones are alive, and
//! keeps just enough state (attachments, bindings, storage sizes) to answer
//! completeness queries the way a driver would.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::abs::gpu::{GlHandle, Gpu};
use crate::error::{GpuError, ShaderError};

#[derive(Debug, Clone, Default)]
pub struct MockTexture {
    pub target: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub levels: u32,
    pub internal_format: u32,
    pub immutable: bool,
    pub params: HashMap<u32, i32>,
    pub params_f32: HashMap<u32, f32>,
    pub uploaded: usize,
    pub mipmaps_generated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockFramebuffer {
    pub attachments: BTreeMap<u32, GlHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_array: Option<GlHandle>,
    pub framebuffer: Option<GlHandle>,
    pub mode: u32,
    pub first: i32,
    pub count: i32,
}

#[derive(Debug, Default)]
pub struct MockState {
    next_name: u32,
    pub max_color_attachments: i32,
    pub textures: HashMap<GlHandle, MockTexture>,
    pub framebuffers: HashMap<GlHandle, MockFramebuffer>,
    pub buffers: HashMap<GlHandle, Vec<u8>>,
    pub vertex_arrays: HashMap<GlHandle, Vec<(u32, i32, u32, i32, i32)>>,
    pub programs: HashMap<GlHandle, HashMap<String, i32>>,
    pub block_bindings: HashMap<(GlHandle, String), u32>,
    pub bound_textures: HashMap<(u32, u32), GlHandle>,
    pub active_unit: u32,
    pub draw_framebuffer: Option<GlHandle>,
    pub read_framebuffer: Option<GlHandle>,
    pub bound_buffers: HashMap<u32, GlHandle>,
    pub uniform_bindings: HashMap<u32, GlHandle>,
    pub bound_vertex_array: Option<GlHandle>,
    pub program: Option<GlHandle>,
    pub draw_buffers: Vec<u32>,
    pub viewport: [i32; 4],
    pub clears: Vec<(Option<GlHandle>, u32)>,
    pub blits: Vec<(Option<GlHandle>, Option<GlHandle>, [i32; 4], [i32; 4], u32)>,
    pub draws: Vec<DrawCall>,
    pub vertex_arrays_created: usize,
    pub invalid_deletes: usize,
    pub pending_error: u32,
    /// Error raised by the next storage allocation.
    pub fail_next_storage: Option<u32>,
    pub calls: Vec<&'static str>,
}

/// Recording stand-in for a GL context.
#[derive(Debug)]
pub struct MockGpu {
    state: Mutex<MockState>,
}

impl MockGpu {
    pub fn new() -> Arc<Self> {
        Self::with_max_color_attachments(8)
    }

    pub fn with_max_color_attachments(max: i32) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                max_color_attachments: max,
                ..MockState::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state().framebuffers.len()
    }

    pub fn texture(&self, handle: GlHandle) -> Option<MockTexture> {
        self.state().textures.get(&handle).cloned()
    }

    /// Makes the next `tex_storage_2d`/`tex_image_*` call fail with `code`.
    pub fn fail_next_storage(&self, code: u32) {
        self.state().fail_next_storage = Some(code);
    }

    fn record(&self, call: &'static str) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

impl MockState {
    fn name(&mut self) -> GlHandle {
        self.next_name += 1;
        NonZeroU32::new(self.next_name).unwrap()
    }

    fn bound_texture_mut(&mut self, target: u32) -> Option<&mut MockTexture> {
        let handle = *self.bound_textures.get(&(self.active_unit, target))?;
        self.textures.get_mut(&handle)
    }

    fn allocate(&mut self) -> bool {
        match self.fail_next_storage.take() {
            Some(code) => {
                self.pending_error = code;
                false
            }
            None => true,
        }
    }

    fn bound_framebuffer(&self, target: u32) -> Option<GlHandle> {
        if target == glow::READ_FRAMEBUFFER {
            self.read_framebuffer
        } else {
            self.draw_framebuffer
        }
    }

    fn completeness(&self, framebuffer: GlHandle) -> u32 {
        let Some(fb) = self.framebuffers.get(&framebuffer) else {
            return glow::FRAMEBUFFER_UNDEFINED;
        };
        if fb.attachments.is_empty() {
            return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut size = None;
        for (&attachment, handle) in &fb.attachments {
            let Some(texture) = self.textures.get(handle) else {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            if texture.width == 0 || texture.height == 0 {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            let is_depth = texture.internal_format == glow::DEPTH_COMPONENT24
                || texture.internal_format == glow::DEPTH_COMPONENT32F;
            if (attachment == glow::DEPTH_ATTACHMENT) != is_depth {
                return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match size {
                None => size = Some((texture.width, texture.height)),
                Some(s) if s != (texture.width, texture.height) => {
                    return glow::FRAMEBUFFER_UNSUPPORTED;
                }
                Some(_) => {}
            }
        }
        glow::FRAMEBUFFER_COMPLETE
    }
}

impl Gpu for MockGpu {
    fn create_texture(&self) -> Result<GlHandle, GpuError> {
        let mut state = self.record("create_texture");
        let name = state.name();
        state.textures.insert(name, MockTexture::default());
        Ok(name)
    }

    fn delete_texture(&self, texture: GlHandle) {
        let mut state = self.record("delete_texture");
        if state.textures.remove(&texture).is_none() {
            state.invalid_deletes += 1;
        }
        state.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn active_texture(&self, unit: u32) {
        self.record("active_texture").active_unit = unit;
    }

    fn bind_texture(&self, target: u32, texture: Option<GlHandle>) {
        let mut state = self.record("bind_texture");
        let key = (state.active_unit, target);
        match texture {
            Some(handle) => {
                if let Some(t) = state.textures.get_mut(&handle) {
                    t.target = target;
                }
                state.bound_textures.insert(key, handle);
            }
            None => {
                state.bound_textures.remove(&key);
            }
        }
    }

    fn tex_storage_2d(&self, target: u32, levels: u32, internal_format: u32, width: u32, height: u32) {
        let mut state = self.record("tex_storage_2d");
        if !state.allocate() {
            return;
        }
        if let Some(t) = state.bound_texture_mut(target) {
            t.levels = levels;
            t.internal_format = internal_format;
            t.width = width;
            t.height = height;
            t.depth = 1;
            t.immutable = true;
        }
    }

    fn tex_sub_image_2d(
        &self,
        target: u32,
        _level: u32,
        _width: u32,
        _height: u32,
        _format: u32,
        _ty: u32,
        pixels: &[u8],
    ) {
        let mut state = self.record("tex_sub_image_2d");
        if let Some(t) = state.bound_texture_mut(target) {
            t.uploaded += pixels.len();
        }
    }

    fn tex_image_2d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let mut state = self.record("tex_image_2d");
        if !state.allocate() {
            return;
        }
        if let Some(t) = state.bound_texture_mut(target) {
            t.levels = 1;
            t.internal_format = internal_format;
            t.width = width;
            t.height = height;
            t.depth = 1;
            t.uploaded = pixels.map_or(0, <[u8]>::len);
        }
    }

    fn tex_image_3d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let mut state = self.record("tex_image_3d");
        if !state.allocate() {
            return;
        }
        if let Some(t) = state.bound_texture_mut(target) {
            t.levels = 1;
            t.internal_format = internal_format;
            t.width = width;
            t.height = height;
            t.depth = depth;
            t.uploaded = pixels.map_or(0, <[u8]>::len);
        }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        let mut state = self.record("tex_parameter_i32");
        if let Some(t) = state.bound_texture_mut(target) {
            t.params.insert(parameter, value);
        }
    }

    fn tex_parameter_f32(&self, target: u32, parameter: u32, value: f32) {
        let mut state = self.record("tex_parameter_f32");
        if let Some(t) = state.bound_texture_mut(target) {
            t.params_f32.insert(parameter, value);
        }
    }

    fn generate_mipmap(&self, target: u32) {
        let mut state = self.record("generate_mipmap");
        if let Some(t) = state.bound_texture_mut(target) {
            t.mipmaps_generated = true;
        }
    }

    fn create_framebuffer(&self) -> Result<GlHandle, GpuError> {
        let mut state = self.record("create_framebuffer");
        let name = state.name();
        state.framebuffers.insert(name, MockFramebuffer::default());
        Ok(name)
    }

    fn delete_framebuffer(&self, framebuffer: GlHandle) {
        let mut state = self.record("delete_framebuffer");
        if state.framebuffers.remove(&framebuffer).is_none() {
            state.invalid_deletes += 1;
        }
        if state.draw_framebuffer == Some(framebuffer) {
            state.draw_framebuffer = None;
        }
        if state.read_framebuffer == Some(framebuffer) {
            state.read_framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<GlHandle>) {
        let mut state = self.record("bind_framebuffer");
        match target {
            glow::READ_FRAMEBUFFER => state.read_framebuffer = framebuffer,
            glow::DRAW_FRAMEBUFFER => state.draw_framebuffer = framebuffer,
            _ => {
                state.read_framebuffer = framebuffer;
                state.draw_framebuffer = framebuffer;
            }
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        _texture_target: u32,
        texture: Option<GlHandle>,
        _level: i32,
    ) {
        let mut state = self.record("framebuffer_texture_2d");
        let Some(bound) = state.bound_framebuffer(target) else {
            state.pending_error = glow::INVALID_OPERATION;
            return;
        };
        if let Some(fb) = state.framebuffers.get_mut(&bound) {
            match texture {
                Some(handle) => {
                    fb.attachments.insert(attachment, handle);
                }
                None => {
                    fb.attachments.remove(&attachment);
                }
            }
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        let state = self.record("check_framebuffer_status");
        match state.bound_framebuffer(target) {
            Some(framebuffer) => state.completeness(framebuffer),
            None => glow::FRAMEBUFFER_COMPLETE,
        }
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        self.record("draw_buffers").draw_buffers = buffers.to_vec();
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, _filter: u32) {
        let mut state = self.record("blit_framebuffer");
        let (read, draw) = (state.read_framebuffer, state.draw_framebuffer);
        state.blits.push((read, draw, src, dst, mask));
    }

    fn create_buffer(&self) -> Result<GlHandle, GpuError> {
        let mut state = self.record("create_buffer");
        let name = state.name();
        state.buffers.insert(name, Vec::new());
        Ok(name)
    }

    fn delete_buffer(&self, buffer: GlHandle) {
        let mut state = self.record("delete_buffer");
        if state.buffers.remove(&buffer).is_none() {
            state.invalid_deletes += 1;
        }
        state.bound_buffers.retain(|_, bound| *bound != buffer);
    }

    fn bind_buffer(&self, target: u32, buffer: Option<GlHandle>) {
        let mut state = self.record("bind_buffer");
        match buffer {
            Some(handle) => {
                state.bound_buffers.insert(target, handle);
            }
            None => {
                state.bound_buffers.remove(&target);
            }
        }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<GlHandle>) {
        let mut state = self.record("bind_buffer_base");
        match buffer {
            Some(handle) => {
                state.uniform_bindings.insert(index, handle);
                state.bound_buffers.insert(target, handle);
            }
            None => {
                state.uniform_bindings.remove(&index);
            }
        }
    }

    fn buffer_data(&self, target: u32, data: &[u8], _usage: u32) {
        let mut state = self.record("buffer_data");
        if let Some(handle) = state.bound_buffers.get(&target).copied() {
            state.buffers.insert(handle, data.to_vec());
        }
    }

    fn buffer_data_size(&self, target: u32, size: usize, _usage: u32) {
        let mut state = self.record("buffer_data_size");
        if let Some(handle) = state.bound_buffers.get(&target).copied() {
            state.buffers.insert(handle, vec![0; size]);
        }
    }

    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]) {
        let mut state = self.record("buffer_sub_data");
        let Some(handle) = state.bound_buffers.get(&target).copied() else {
            state.pending_error = glow::INVALID_OPERATION;
            return;
        };
        let len = state.buffers.get(&handle).map_or(0, Vec::len);
        if offset + data.len() > len {
            state.pending_error = glow::INVALID_VALUE;
            return;
        }
        if let Some(store) = state.buffers.get_mut(&handle) {
            store[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    fn create_vertex_array(&self) -> Result<GlHandle, GpuError> {
        let mut state = self.record("create_vertex_array");
        let name = state.name();
        state.vertex_arrays.insert(name, Vec::new());
        state.vertex_arrays_created += 1;
        Ok(name)
    }

    fn delete_vertex_array(&self, vertex_array: GlHandle) {
        let mut state = self.record("delete_vertex_array");
        if state.vertex_arrays.remove(&vertex_array).is_none() {
            state.invalid_deletes += 1;
        }
        if state.bound_vertex_array == Some(vertex_array) {
            state.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<GlHandle>) {
        self.record("bind_vertex_array").bound_vertex_array = vertex_array;
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {
        self.record("enable_vertex_attrib_array");
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        _normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        let mut state = self.record("vertex_attrib_pointer");
        if let Some(vao) = state.bound_vertex_array {
            if let Some(layout) = state.vertex_arrays.get_mut(&vao) {
                layout.push((index, size, data_type, stride, offset));
            }
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut state = self.record("draw_arrays");
        let call = DrawCall {
            vertex_array: state.bound_vertex_array,
            framebuffer: state.draw_framebuffer,
            mode,
            first,
            count,
        };
        state.draws.push(call);
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<GlHandle, ShaderError> {
        let mut state = self.record("create_program");
        if vertex.trim().is_empty() {
            return Err(ShaderError::Compile("empty vertex shader".to_string()));
        }
        if fragment.trim().is_empty() {
            return Err(ShaderError::Compile("empty fragment shader".to_string()));
        }
        let name = state.name();
        state.programs.insert(name, HashMap::new());
        Ok(name)
    }

    fn delete_program(&self, program: GlHandle) {
        let mut state = self.record("delete_program");
        if state.programs.remove(&program).is_none() {
            state.invalid_deletes += 1;
        }
    }

    fn use_program(&self, program: Option<GlHandle>) {
        self.record("use_program").program = program;
    }

    fn uniform_i32(&self, program: GlHandle, name: &str, value: i32) {
        let mut state = self.record("uniform_i32");
        if let Some(uniforms) = state.programs.get_mut(&program) {
            uniforms.insert(name.to_string(), value);
        }
    }

    fn uniform_block_binding(&self, program: GlHandle, block: &str, binding: u32) {
        let mut state = self.record("uniform_block_binding");
        if state.programs.contains_key(&program) {
            state
                .block_bindings
                .insert((program, block.to_string()), binding);
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record("viewport").viewport = [x, y, width, height];
    }

    fn clear(&self, mask: u32) {
        let mut state = self.record("clear");
        let target = state.draw_framebuffer;
        state.clears.push((target, mask));
    }

    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        let state = self.record("get_parameter_i32");
        match parameter {
            glow::MAX_COLOR_ATTACHMENTS => state.max_color_attachments,
            _ => 0,
        }
    }

    fn get_error(&self) -> u32 {
        let mut state = self.record("get_error");
        std::mem::replace(&mut state.pending_error, glow::NO_ERROR)
    }
}
