//! Tool configuration.
//!
//! Persisted as TOML next to the game executable. Missing or malformed
//! files (or individual fields) fall back to the documented defaults and
//! never abort initialization.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub camera: CameraConfig,
    pub track: TrackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// World units per second at full stick/key deflection.
    pub movement_speed: f32,
    /// Radians per second for pitch/yaw.
    pub rotation_speed: f32,
    /// Radians per second for roll.
    pub roll_speed: f32,
    /// Degrees per second for field-of-view changes.
    pub fov_speed: f32,
    /// Re-seed the free camera from the game camera on every enable,
    /// not just the first.
    pub auto_reset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Seconds of playback between two adjacent nodes.
    pub node_time_span: f32,
    /// Take rotation from the track while playing.
    pub lock_rotation: bool,
    /// Take field of view from the track while playing.
    pub lock_field_of_view: bool,
    /// Scrub the track with directional input instead of wall clock.
    pub manual_play: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            movement_speed: 1.0,
            rotation_speed: std::f32::consts::FRAC_PI_4,
            roll_speed: std::f32::consts::FRAC_PI_8,
            fov_speed: 5.0,
            auto_reset: true,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            node_time_span: 3.0,
            lock_rotation: true,
            lock_field_of_view: false,
            manual_play: false,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            track: TrackConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Parse a TOML document, falling back to defaults on any error.
    pub fn from_toml(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}", Error::ConfigParseFailed(e.to_string()));
                Self::default()
            }
        }
    }

    /// Load from disk. A missing file is silent; a malformed file warns.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Could not read config file: {e}, using default settings");
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::ConfigParseFailed(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_toml_falls_back_to_defaults() {
        let config = ToolConfig::from_toml("[camera\nmovement_speed = oops");
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = ToolConfig::from_toml("[camera]\nmovement_speed = 4.5\n");
        assert_eq!(config.camera.movement_speed, 4.5);
        assert_eq!(
            config.camera.rotation_speed,
            CameraConfig::default().rotation_speed
        );
        assert_eq!(config.track, TrackConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let mut config = ToolConfig::default();
        config.camera.movement_speed = 2.25;
        config.track.node_time_span = 1.5;
        config.track.manual_play = true;
        config.save(file.path()).unwrap();

        let loaded = ToolConfig::load(file.path());
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let loaded = ToolConfig::load("/definitely/not/here/cinecam.toml");
        assert_eq!(loaded, ToolConfig::default());
    }
}
