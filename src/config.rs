//! Settings for the window, asset locations and scene parameters.
//!
//! Loaded from `config/settings.json`, which is created with the defaults
//! when it doesn't exist yet.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PATH: &str = "config/settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize the configuration: {0}")]
    Serialize(serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub assets: AssetConfig,
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory with `<name>.vs` / `<name>.fs` shader pairs.
    pub shader_dir: PathBuf,
    /// Directory with the scene's textures.
    pub image_dir: PathBuf,
    /// glTF model drawn in the deferred pass.
    pub model: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Point lights of the deferred composite, at most 32.
    pub point_lights: usize,
    /// Seed for scattering the point lights.
    pub light_seed: u64,
    pub grass_instances: usize,
    /// Hemisphere samples per pixel of the occlusion pass, at most 64.
    pub ssao_samples: usize,
    pub shadow_map_size: u32,
    pub outline_size: f32,
    pub outline_color: [f32; 4],
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "deferred-scene".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        AssetConfig {
            shader_dir: PathBuf::from("shader"),
            image_dir: PathBuf::from("image"),
            model: PathBuf::from("model/backpack.gltf"),
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            point_lights: 32,
            light_seed: 0,
            grass_instances: 10_000,
            ssao_samples: 64,
            shadow_map_size: 1024,
            outline_size: 1.05,
            outline_color: [1.0, 1.0, 0.5, 1.0],
        }
    }
}

impl Config {
    /// Reads the configuration at `path`, or writes the defaults there if
    /// there is no file yet.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            info!("loaded configuration from {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            info!("wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, content).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_written_then_read_back() {
        let dir = std::env::temp_dir().join("deferred-scene-config-defaults");
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);
        let written = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap(), written);
        assert_eq!(written.scene.ssao_samples, 64);
        assert_eq!(written.assets.shader_dir, PathBuf::from("shader"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "scene": { "point_lights": 4 } }"#).unwrap();
        assert_eq!(config.scene.point_lights, 4);
        assert_eq!(config.scene.shadow_map_size, 1024);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn malformed_files_are_parse_errors() {
        let dir = std::env::temp_dir().join("deferred-scene-config-malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
