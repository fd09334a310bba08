//! Framework configuration, read from a JSON file.
//!
//! Every section falls back to its defaults, so a partial file (or no file
//! at all) is valid.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::abs::{Framebuffer, Texture, TextureFilter, TextureWrap};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    pub window: WindowConfig,
    pub textures: TextureConfig,
    pub framebuffer: FramebufferConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub target_fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "satframe".to_string(),
            width: 800,
            height: 432,
            fullscreen: false,
            target_fps: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub asset_dir: PathBuf,
    pub lut_dir: PathBuf,
    pub generate_mipmaps: bool,
    pub anisotropy: f32,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets/textures"),
            lut_dir: PathBuf::from("assets/cube"),
            generate_mipmaps: true,
            anisotropy: 16.0,
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::LinearMipmapLinear,
        }
    }
}

impl TextureConfig {
    pub fn resolve(&self, file: impl AsRef<Path>) -> PathBuf {
        self.asset_dir.join(file)
    }

    pub fn resolve_lut(&self, file: impl AsRef<Path>) -> PathBuf {
        self.lut_dir.join(file)
    }

    /// Applies the default sampling policy to a texture before it loads.
    pub fn apply(&self, texture: &mut Texture) {
        texture.set_filter_parameters(self.mag_filter, self.min_filter);
        texture.set_anisotropy(self.anisotropy);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramebufferConfig {
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Nearest,
            wrap: TextureWrap::ClampToEdge,
        }
    }
}

impl FramebufferConfig {
    pub fn apply(&self, framebuffer: &mut Framebuffer) {
        framebuffer.set_filter(self.filter);
        framebuffer.set_wrap(self.wrap);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl FrameworkConfig {
    /// Loads the config at `path`, or the defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<platform config dir>/satframe/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("satframe").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }
}
