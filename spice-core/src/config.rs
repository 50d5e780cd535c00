use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::staff::{NOTE_DECIMATION, NOTE_LIFETIME};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SPICE_TUNER_CONFIG";
/// Config file looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "spice-tuner.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Local `.onnx` path or `http(s)` URL of the transform stage.
    #[serde(default = "default_transform_source")]
    pub transform: String,
    /// Local `.onnx` path or `http(s)` URL of the combination stage.
    #[serde(default = "default_combine_source")]
    pub combine: String,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioConfig {
    /// Input device name; empty picks the default device.
    #[serde(default)]
    pub device: String,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_note_lifetime_ms")]
    pub note_lifetime_ms: u64,
    #[serde(default = "default_note_decimation")]
    pub note_decimation: u64,
    #[serde(default = "default_block_size")]
    pub block_size: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            transform: default_transform_source(),
            combine: default_combine_source(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            note_lifetime_ms: default_note_lifetime_ms(),
            note_decimation: default_note_decimation(),
            block_size: default_block_size(),
        }
    }
}

impl AudioConfig {
    pub fn device_name(&self) -> Option<&str> {
        let name = self.device.trim();
        (!name.is_empty()).then_some(name)
    }
}

impl DisplayConfig {
    pub fn note_lifetime(&self) -> Duration {
        Duration::from_millis(self.note_lifetime_ms)
    }
}

fn default_transform_source() -> String { "models/spice_transform.onnx".into() }
fn default_combine_source() -> String { "models/spice_combine.onnx".into() }
fn default_intra_threads() -> usize { 1 }
fn default_note_lifetime_ms() -> u64 { NOTE_LIFETIME.as_millis() as u64 }
fn default_note_decimation() -> u64 { NOTE_DECIMATION }
fn default_block_size() -> f32 { 2.0 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Option<Config> {
    match toml::from_str(content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config: {}", e);
            None
        }
    }
}

/// Path of the config file: `$SPICE_TUNER_CONFIG` or `spice-tuner.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads the config file, falling back to defaults when it is missing or invalid.
pub fn load_or_default() -> Config {
    let path = config_path();
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Config::default();
    }
    match load_config(&path) {
        Some(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        None => {
            log::warn!("Failed to load config from {}, using defaults", path.display());
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.model.transform, "models/spice_transform.onnx");
        assert_eq!(config.model.combine, "models/spice_combine.onnx");
        assert_eq!(config.model.intra_threads, 1);
        assert_eq!(config.audio.device_name(), None);
        assert_eq!(config.display.note_lifetime(), NOTE_LIFETIME);
        assert_eq!(config.display.note_decimation, 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [model]
            transform = "https://example.com/spice_transform.onnx"

            [audio]
            device = "  USB Mic "

            [display]
            note_decimation = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.model.transform, "https://example.com/spice_transform.onnx");
        assert_eq!(config.model.combine, "models/spice_combine.onnx");
        assert_eq!(config.model.intra_threads, 1);
        assert_eq!(config.audio.device_name(), Some("USB Mic"));
        assert_eq!(config.display.note_decimation, 1);
        assert_eq!(config.display.block_size, 2.0);
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(parse_config("[model\nsource = ").is_none());
    }
}
