//! The GL entry points used by the framework.
//!
//! Resource types never talk to [`glow`] directly. They hold an
//! `Arc<dyn Gpu>` and issue calls through the [`Gpu`] trait, which is
//! implemented for [`glow::Context`]. Object names are plain
//! [`GlHandle`]s; `None` stands for the null object (GL name 0).

use std::num::NonZeroU32;

use glow::HasContext;

use crate::error::{GpuError, ShaderError};

/// Name of a live GL object.
pub type GlHandle = NonZeroU32;

/// `GL_TEXTURE_MAX_ANISOTROPY_EXT`.
pub const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

/// The subset of OpenGL the framework needs.
///
/// Calls must be made from the thread that owns the GL context.
pub trait Gpu {
    fn create_texture(&self) -> Result<GlHandle, GpuError>;
    fn delete_texture(&self, texture: GlHandle);
    /// Releases several textures at once.
    fn delete_textures(&self, textures: &[GlHandle]) {
        for &texture in textures {
            self.delete_texture(texture);
        }
    }
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<GlHandle>);
    /// Allocates immutable storage for `levels` mip levels.
    fn tex_storage_2d(&self, target: u32, levels: u32, internal_format: u32, width: u32, height: u32);
    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    /// Allocates mutable storage for the base level.
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_image_3d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    fn tex_parameter_f32(&self, target: u32, parameter: u32, value: f32);
    fn generate_mipmap(&self, target: u32);

    fn create_framebuffer(&self) -> Result<GlHandle, GpuError>;
    fn delete_framebuffer(&self, framebuffer: GlHandle);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<GlHandle>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<GlHandle>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn draw_buffers(&self, buffers: &[u32]);
    /// Copies `src` (x0, y0, x1, y1) of the read framebuffer into `dst` of the draw framebuffer.
    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32);

    fn create_buffer(&self) -> Result<GlHandle, GpuError>;
    fn delete_buffer(&self, buffer: GlHandle);
    fn bind_buffer(&self, target: u32, buffer: Option<GlHandle>);
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<GlHandle>);
    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);
    fn buffer_data_size(&self, target: u32, size: usize, usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]);

    fn create_vertex_array(&self) -> Result<GlHandle, GpuError>;
    fn delete_vertex_array(&self, vertex_array: GlHandle);
    fn bind_vertex_array(&self, vertex_array: Option<GlHandle>);
    fn enable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    /// Compiles and links a vertex/fragment pair.
    fn create_program(&self, vertex: &str, fragment: &str) -> Result<GlHandle, ShaderError>;
    fn delete_program(&self, program: GlHandle);
    fn use_program(&self, program: Option<GlHandle>);
    fn uniform_i32(&self, program: GlHandle, name: &str, value: i32);
    /// Routes the named uniform block to a buffer binding point.
    fn uniform_block_binding(&self, program: GlHandle, block: &str, binding: u32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear(&self, mask: u32);
    fn get_parameter_i32(&self, parameter: u32) -> i32;
    fn get_error(&self) -> u32;
}

/// Returns `Err` if GL reported an error since the last check.
pub fn check_error(gpu: &dyn Gpu, during: &'static str) -> Result<(), GpuError> {
    match gpu.get_error() {
        glow::NO_ERROR => Ok(()),
        code => Err(GpuError::Allocation { code, during }),
    }
}

fn created(kind: &'static str) -> impl FnOnce(String) -> GpuError {
    move |message| GpuError::Create { kind, message }
}

impl Gpu for glow::Context {
    fn create_texture(&self) -> Result<GlHandle, GpuError> {
        unsafe { HasContext::create_texture(self).map(|t| t.0).map_err(created("texture")) }
    }

    fn delete_texture(&self, texture: GlHandle) {
        unsafe { HasContext::delete_texture(self, glow::NativeTexture(texture)) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: u32, texture: Option<GlHandle>) {
        unsafe { HasContext::bind_texture(self, target, texture.map(glow::NativeTexture)) }
    }

    fn tex_storage_2d(&self, target: u32, levels: u32, internal_format: u32, width: u32, height: u32) {
        unsafe {
            HasContext::tex_storage_2d(
                self,
                target,
                levels as i32,
                internal_format,
                width as i32,
                height as i32,
            )
        }
    }

    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) {
        unsafe {
            HasContext::tex_sub_image_2d(
                self,
                target,
                level as i32,
                0,
                0,
                width as i32,
                height as i32,
                format,
                ty,
                glow::PixelUnpackData::Slice(Some(pixels)),
            )
        }
    }

    fn tex_image_2d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        unsafe {
            HasContext::tex_image_2d(
                self,
                target,
                0,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(pixels),
            )
        }
    }

    fn tex_image_3d(
        &self,
        target: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        unsafe {
            HasContext::tex_image_3d(
                self,
                target,
                0,
                internal_format as i32,
                width as i32,
                height as i32,
                depth as i32,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(pixels),
            )
        }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { HasContext::tex_parameter_i32(self, target, parameter, value) }
    }

    fn tex_parameter_f32(&self, target: u32, parameter: u32, value: f32) {
        unsafe { HasContext::tex_parameter_f32(self, target, parameter, value) }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { HasContext::generate_mipmap(self, target) }
    }

    fn create_framebuffer(&self) -> Result<GlHandle, GpuError> {
        unsafe {
            HasContext::create_framebuffer(self)
                .map(|f| f.0)
                .map_err(created("framebuffer"))
        }
    }

    fn delete_framebuffer(&self, framebuffer: GlHandle) {
        unsafe { HasContext::delete_framebuffer(self, glow::NativeFramebuffer(framebuffer)) }
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<GlHandle>) {
        unsafe {
            HasContext::bind_framebuffer(self, target, framebuffer.map(glow::NativeFramebuffer))
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<GlHandle>,
        level: i32,
    ) {
        unsafe {
            HasContext::framebuffer_texture_2d(
                self,
                target,
                attachment,
                texture_target,
                texture.map(glow::NativeTexture),
                level,
            )
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { HasContext::check_framebuffer_status(self, target) }
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        unsafe { HasContext::draw_buffers(self, buffers) }
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        unsafe {
            HasContext::blit_framebuffer(
                self, src[0], src[1], src[2], src[3], dst[0], dst[1], dst[2], dst[3], mask, filter,
            )
        }
    }

    fn create_buffer(&self) -> Result<GlHandle, GpuError> {
        unsafe { HasContext::create_buffer(self).map(|b| b.0).map_err(created("buffer")) }
    }

    fn delete_buffer(&self, buffer: GlHandle) {
        unsafe { HasContext::delete_buffer(self, glow::NativeBuffer(buffer)) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<GlHandle>) {
        unsafe { HasContext::bind_buffer(self, target, buffer.map(glow::NativeBuffer)) }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<GlHandle>) {
        unsafe {
            HasContext::bind_buffer_base(self, target, index, buffer.map(glow::NativeBuffer))
        }
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        unsafe { HasContext::buffer_data_u8_slice(self, target, data, usage) }
    }

    fn buffer_data_size(&self, target: u32, size: usize, usage: u32) {
        unsafe { HasContext::buffer_data_size(self, target, size as i32, usage) }
    }

    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]) {
        unsafe { HasContext::buffer_sub_data_u8_slice(self, target, offset as i32, data) }
    }

    fn create_vertex_array(&self) -> Result<GlHandle, GpuError> {
        unsafe {
            HasContext::create_vertex_array(self)
                .map(|v| v.0)
                .map_err(created("vertex array"))
        }
    }

    fn delete_vertex_array(&self, vertex_array: GlHandle) {
        unsafe { HasContext::delete_vertex_array(self, glow::NativeVertexArray(vertex_array)) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<GlHandle>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array.map(glow::NativeVertexArray)) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self, index, size, data_type, normalized, stride, offset,
            )
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, mode, first, count) }
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<GlHandle, ShaderError> {
        unsafe {
            let mut shaders = Vec::with_capacity(2);
            for (kind, source) in [(glow::VERTEX_SHADER, vertex), (glow::FRAGMENT_SHADER, fragment)] {
                let shader = HasContext::create_shader(self, kind).map_err(ShaderError::Compile)?;
                self.shader_source(shader, source);
                self.compile_shader(shader);
                if !self.get_shader_compile_status(shader) {
                    let log = self.get_shader_info_log(shader);
                    self.delete_shader(shader);
                    for shader in shaders {
                        self.delete_shader(shader);
                    }
                    return Err(ShaderError::Compile(log));
                }
                shaders.push(shader);
            }

            let program = HasContext::create_program(self).map_err(ShaderError::Link)?;
            for &shader in &shaders {
                self.attach_shader(program, shader);
            }
            self.link_program(program);
            for shader in shaders {
                self.detach_shader(program, shader);
                self.delete_shader(shader);
            }

            if !self.get_program_link_status(program) {
                let log = self.get_program_info_log(program);
                HasContext::delete_program(self, program);
                return Err(ShaderError::Link(log));
            }

            Ok(program.0)
        }
    }

    fn delete_program(&self, program: GlHandle) {
        unsafe { HasContext::delete_program(self, glow::NativeProgram(program)) }
    }

    fn use_program(&self, program: Option<GlHandle>) {
        unsafe { HasContext::use_program(self, program.map(glow::NativeProgram)) }
    }

    fn uniform_i32(&self, program: GlHandle, name: &str, value: i32) {
        unsafe {
            if let Some(location) =
                HasContext::get_uniform_location(self, glow::NativeProgram(program), name)
            {
                HasContext::uniform_1_i32(self, Some(&location), value);
            }
        }
    }

    fn uniform_block_binding(&self, program: GlHandle, block: &str, binding: u32) {
        unsafe {
            let program = glow::NativeProgram(program);
            if let Some(index) = HasContext::get_uniform_block_index(self, program, block) {
                HasContext::uniform_block_binding(self, program, index, binding);
            }
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear(&self, mask: u32) {
        unsafe { HasContext::clear(self, mask) }
    }

    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        unsafe { HasContext::get_parameter_i32(self, parameter) }
    }

    fn get_error(&self) -> u32 {
        unsafe { HasContext::get_error(self) }
    }
}
