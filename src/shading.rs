//! Shading feature switches and the uniform buffers that expose them to
//! the lighting shaders.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::abs::{Gpu, UniformBuffer};
use crate::error::GpuError;

pub const TOON_SLOT: u32 = 5;
pub const RIM_SLOT: u32 = 6;
pub const AMBIENT_SLOT: u32 = 7;
pub const SPECULAR_SLOT: u32 = 8;

/// Texture unit the active toon ramp is sampled from.
pub const TOON_RAMP_UNIT: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingToggles {
    pub toon: bool,
    pub rim: bool,
    pub ambient: bool,
    pub specular: bool,
    /// Index of the selected toon ramp texture.
    pub toon_ramp: usize,
}

impl ShadingToggles {
    /// Applies the preset bound to number key `key`. Returns `false` for
    /// keys without a preset.
    pub fn apply_preset(&mut self, key: u8) -> bool {
        match key {
            1 => self.set_terms(false, false, false),
            2 => self.set_terms(false, true, false),
            3 => self.set_terms(false, false, true),
            4 => self.set_terms(true, false, true),
            5 => self.set_terms(true, true, true),
            6 => {
                self.toon = !self.toon;
                self.ambient = !self.ambient;
            }
            7 => {
                self.toon = !self.toon;
                self.specular = !self.specular;
            }
            _ => return false,
        }
        true
    }

    fn set_terms(&mut self, rim: bool, ambient: bool, specular: bool) {
        self.rim = rim;
        self.ambient = ambient;
        self.specular = specular;
    }

    /// Moves to the next of `count` toon ramps, wrapping around.
    pub fn cycle_toon_ramp(&mut self, count: usize) {
        if count > 0 {
            self.toon_ramp = (self.toon_ramp + 1) % count;
        }
    }
}

/// One boolean uniform buffer per toggle, bound at slots 5 to 8.
pub struct ShadingUniforms {
    toon: UniformBuffer,
    rim: UniformBuffer,
    ambient: UniformBuffer,
    specular: UniformBuffer,
    uploaded: ShadingToggles,
}

impl ShadingUniforms {
    /// Allocates the buffers, binds them and uploads all toggles off.
    pub fn new(gpu: &Arc<dyn Gpu>) -> Result<Self, GpuError> {
        let buffer = |slot| -> Result<UniformBuffer, GpuError> {
            let ubo = UniformBuffer::with_size(gpu, size_of::<u32>())?;
            ubo.bind(slot);
            ubo.send_bool(false, 0);
            Ok(ubo)
        };
        Ok(Self {
            toon: buffer(TOON_SLOT)?,
            rim: buffer(RIM_SLOT)?,
            ambient: buffer(AMBIENT_SLOT)?,
            specular: buffer(SPECULAR_SLOT)?,
            uploaded: ShadingToggles::default(),
        })
    }

    /// Uploads the toggles that differ from the last upload. Returns the
    /// number of buffers written.
    pub fn sync(&mut self, toggles: &ShadingToggles) -> usize {
        let pairs = [
            (&self.toon, self.uploaded.toon, toggles.toon),
            (&self.rim, self.uploaded.rim, toggles.rim),
            (&self.ambient, self.uploaded.ambient, toggles.ambient),
            (&self.specular, self.uploaded.specular, toggles.specular),
        ];
        let mut written = 0;
        for (buffer, old, new) in pairs {
            if old != new {
                buffer.send_bool(new, 0);
                written += 1;
            }
        }
        if written > 0 {
            debug!("Shading toggles now {toggles:?}");
        }
        self.uploaded = *toggles;
        written
    }

    /// Re-binds every buffer to its slot.
    pub fn bind(&self) {
        self.toon.bind(TOON_SLOT);
        self.rim.bind(RIM_SLOT);
        self.ambient.bind(AMBIENT_SLOT);
        self.specular.bind(SPECULAR_SLOT);
    }

    pub fn uploaded(&self) -> &ShadingToggles {
        &self.uploaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abs::mock::MockGpu;

    #[test]
    fn presets_set_lighting_terms() {
        let mut t = ShadingToggles::default();
        assert!(t.apply_preset(5));
        assert!(t.rim && t.ambient && t.specular);
        t.apply_preset(2);
        assert_eq!((t.rim, t.ambient, t.specular), (false, true, false));
        t.apply_preset(4);
        assert_eq!((t.rim, t.ambient, t.specular), (true, false, true));
        t.apply_preset(1);
        assert_eq!((t.rim, t.ambient, t.specular), (false, false, false));
        assert!(!t.toon);
    }

    #[test]
    fn flip_presets_toggle_toon() {
        let mut t = ShadingToggles::default();
        t.apply_preset(6);
        assert!(t.toon && t.ambient);
        t.apply_preset(7);
        assert!(!t.toon && t.specular && t.ambient);
        assert!(!t.apply_preset(9));
    }

    #[test]
    fn toon_ramp_wraps() {
        let mut t = ShadingToggles::default();
        t.cycle_toon_ramp(3);
        t.cycle_toon_ramp(3);
        t.cycle_toon_ramp(3);
        assert_eq!(t.toon_ramp, 0);
        t.cycle_toon_ramp(0);
        assert_eq!(t.toon_ramp, 0);
    }

    #[test]
    fn uniforms_bound_and_synced() {
        let mock = MockGpu::new();
        let gpu: Arc<dyn Gpu> = mock.clone();
        let mut uniforms = ShadingUniforms::new(&gpu).unwrap();
        for slot in TOON_SLOT..=SPECULAR_SLOT {
            assert!(mock.state().uniform_bindings.contains_key(&slot));
        }

        let mut t = ShadingToggles::default();
        t.apply_preset(3);
        assert_eq!(uniforms.sync(&t), 1);
        assert_eq!(uniforms.sync(&t), 0);

        let specular = mock.state().uniform_bindings[&SPECULAR_SLOT];
        assert_eq!(mock.state().buffers[&specular], 1u32.to_ne_bytes().to_vec());
        assert_eq!(uniforms.uploaded(), &t);
    }
}
