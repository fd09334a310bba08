//! Light sources and their uniform-buffer layout.

use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::abs::{Gpu, UniformBuffer};
use crate::error::GpuError;

/// Luminance below which a light no longer contributes.
const MIN_LUMINANCE: f32 = 0.05;
const LUMA: Vec3 = Vec3::new(0.3, 0.59, 0.11);

/// Byte size of one light in a uniform block: three `vec4` then four floats.
pub const LIGHT_UNIFORM_SIZE: usize = 3 * 16 + 4 * 4;

/// Local position, euler rotation (degrees) and scale, with the derived
/// local-to-world matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    local_to_world: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            local_to_world: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn update(&mut self, _dt: f32) {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        self.local_to_world =
            Mat4::from_scale_rotation_translation(self.scale, rotation, self.position);
    }

    pub fn local_to_world(&self) -> Mat4 {
        self.local_to_world
    }

    pub fn world_position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// The local -Z axis in world space.
    pub fn forward(&self) -> Vec3 {
        -self.local_to_world.z_axis.truncate().normalize_or_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Directional,
    #[default]
    Point,
    Spotlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub transform: Transform,
    pub kind: LightKind,
    pub position: Vec4,
    pub color: Vec4,
    pub direction: Vec4,
    pub atten_constant: f32,
    pub atten_linear: f32,
    pub atten_quadratic: f32,
    radius: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            kind: LightKind::Point,
            position: Vec4::ZERO,
            color: Vec4::ONE,
            direction: Vec4::ZERO,
            atten_constant: 1.0,
            atten_linear: 1.0,
            atten_quadratic: 1.0,
            radius: 0.0,
        }
    }
}

impl Light {
    pub fn update(&mut self, dt: f32) {
        self.transform.update(dt);
        self.calculate_radius();
    }

    /// Distance at which attenuation brings the light's luminance down to
    /// the visibility threshold.
    pub fn calculate_radius(&mut self) -> f32 {
        let luminance = (self.color.truncate() / self.color.w).dot(LUMA);
        let (c, l, q) = (
            self.atten_constant,
            self.atten_linear,
            self.atten_quadratic,
        );
        self.radius =
            (-l + (l * l - 4.0 * q * (c - luminance / MIN_LUMINANCE)).sqrt()) / (2.0 * q);
        self.radius
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// The std140 block for this light.
    pub fn uniform_bytes(&self) -> [u8; LIGHT_UNIFORM_SIZE] {
        let mut bytes = [0; LIGHT_UNIFORM_SIZE];
        let floats = [
            self.atten_constant,
            self.atten_linear,
            self.atten_quadratic,
            self.radius,
        ];
        bytes[0..16].copy_from_slice(bytemuck::bytes_of(&self.position));
        bytes[16..32].copy_from_slice(bytemuck::bytes_of(&self.color));
        bytes[32..48].copy_from_slice(bytemuck::bytes_of(&self.direction));
        bytes[48..].copy_from_slice(bytemuck::cast_slice(&floats));
        bytes
    }

    /// Allocates a uniform buffer sized for one light.
    pub fn create_buffer(gpu: &Arc<dyn Gpu>) -> Result<UniformBuffer, GpuError> {
        UniformBuffer::with_size(gpu, LIGHT_UNIFORM_SIZE)
    }

    pub fn upload(&self, buffer: &UniformBuffer) {
        buffer.send_data(&self.uniform_bytes(), 0);
    }
}
