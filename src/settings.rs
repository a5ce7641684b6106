//! Startup configuration
//!
//! Read once from a JSON file before the game starts. Missing fields take
//! their defaults, and a missing or malformed file falls back to
//! [`Settings::default`].

use std::path::Path;
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{PLAYER_ACCEL, SEC_PER_UPDATE};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Byte sizes of the memory stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Long-lived allocations, including the world sub-stack
    pub permanent_bytes: usize,
    /// Per-frame scratch
    pub temporary_bytes: usize,
    /// Carved out of the permanent stack for chunks and entities
    pub world_bytes: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            permanent_bytes: 4 * 1024 * 1024,
            temporary_bytes: 1024 * 1024,
            world_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_name: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub goal_fps: u32,
    /// Render scale from world units to pixels
    pub pixels_per_meter: f32,
    pub memory: MemorySettings,
    /// Acceleration applied while a direction is held (units/s²)
    pub player_accel: f32,
    /// Player start position inside the upper seed room
    pub player_spawn: Vec2,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "proto".to_string(),
            screen_width: 960,
            screen_height: 560,
            goal_fps: 60,
            pixels_per_meter: 100.0,
            memory: MemorySettings::default(),
            player_accel: PLAYER_ACCEL,
            player_spawn: Vec2::new(5.5, 5.5),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read settings from `path`, or fall back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Using default settings ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Simulation tick length
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(SEC_PER_UPDATE)
    }

    /// Target frame length for the host's frame pacing
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.goal_fps.max(1) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.project_name, "proto");
        assert_eq!((settings.screen_width, settings.screen_height), (960, 560));
        assert!(settings.memory.world_bytes < settings.memory.permanent_bytes);
        assert_eq!(settings.tick_duration(), Duration::from_millis(2));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "goal_fps": 30, "memory": { "world_bytes": 65536 } }"#).unwrap();
        assert_eq!(settings.goal_fps, 30);
        assert_eq!(settings.memory.world_bytes, 65536);
        assert_eq!(settings.memory.permanent_bytes, MemorySettings::default().permanent_bytes);
        assert_eq!(settings.player_spawn, Vec2::new(5.5, 5.5));
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = Settings::default();
        settings.player_accel = 100.0;
        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(Settings::from_json("{ nope"), Err(SettingsError::Json(_))));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let settings = Settings::load("/nonexistent/proto-settings.json");
        assert_eq!(settings, Settings::default());
        assert!(matches!(
            Settings::read("/nonexistent/proto-settings.json"),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn test_frame_duration() {
        let settings = Settings::default();
        let frame = settings.frame_duration().as_secs_f64();
        assert!((frame - 1.0 / 60.0).abs() < 1e-6);
    }
}
