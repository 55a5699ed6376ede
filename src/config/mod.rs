// SPDX-License-Identifier: MPL-2.0
//! Player configuration, persisted as a `settings.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use framepace::config::{self, PlayerConfig};
//!
//! // Load existing configuration (defaults when absent)
//! let mut config = config::load().unwrap_or_default();
//!
//! // Modify a setting
//! config.keep_aspect = true;
//!
//! // Save the modified configuration
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;

use crate::error::Result;
use crate::video_player::render::ResampleFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "framepace";

/// Toggles the host can persist between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Follow the host widget size instead of the native frame size.
    pub scaled: bool,
    /// Letterbox instead of stretching when the aspect ratios differ.
    pub keep_aspect: bool,
    /// Sleep between frames to match the source frame rate.
    pub consistent_frame_rate: bool,
    /// Explicit display width used when not scaled.
    pub target_width: Option<u32>,
    /// Explicit display height used when not scaled.
    pub target_height: Option<u32>,
    /// Resampling filter used when resizing frames.
    pub resampling: ResampleFilter,
    /// Play the audio track when an audio sink is available.
    pub audio_enabled: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            scaled: defaults::DEFAULT_SCALED,
            keep_aspect: defaults::DEFAULT_KEEP_ASPECT,
            consistent_frame_rate: defaults::DEFAULT_CONSISTENT_FRAME_RATE,
            target_width: None,
            target_height: None,
            resampling: ResampleFilter::default(),
            audio_enabled: true,
        }
    }
}

impl PlayerConfig {
    /// Returns the explicit target size when both dimensions are set.
    #[must_use]
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target_width.zip(self.target_height)
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<PlayerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PlayerConfig::default())
}

pub fn save(config: &PlayerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Reads a config file. Unparsable content yields the defaults.
pub fn load_from_path(path: &Path) -> Result<PlayerConfig> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_else(|err| {
        log::warn!("ignoring invalid config {}: {err}", path.display());
        PlayerConfig::default()
    }))
}

pub fn save_to_path(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip_preserves_toggles() {
        let config = PlayerConfig {
            scaled: false,
            keep_aspect: true,
            consistent_frame_rate: false,
            target_width: Some(640),
            target_height: Some(360),
            resampling: ResampleFilter::Lanczos3,
            audio_enabled: false,
        };
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        save_to_path(&config, &config_path).expect("failed to save config");
        let loaded = load_from_path(&config_path).expect("failed to load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_from_path_returns_default_on_invalid_toml() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "not = valid = toml").expect("failed to write invalid toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded, PlayerConfig::default());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "keep_aspect = true\n").expect("failed to write toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert!(loaded.keep_aspect);
        assert_eq!(loaded.scaled, defaults::DEFAULT_SCALED);
        assert_eq!(loaded.resampling, ResampleFilter::Nearest);
    }

    #[test]
    fn load_from_missing_path_is_an_io_error() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let result = load_from_path(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }

    #[test]
    fn target_size_requires_both_dimensions() {
        let mut config = PlayerConfig {
            target_width: Some(320),
            ..PlayerConfig::default()
        };
        assert_eq!(config.target_size(), None);
        config.target_height = Some(200);
        assert_eq!(config.target_size(), Some((320, 200)));
    }
}
