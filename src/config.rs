//! Configuration management for test parameters
//!
//! This module provides runtime configuration loading from JSON files so the
//! staircase and playback parameters can be adjusted without recompilation.
//! Missing fields fall back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::gain::{ATTACK_MS, DEFAULT_DURATION_MS, MASTER_VOLUME, REFERENCE_GAIN, RELEASE_MS};
use crate::staircase::StaircaseConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub staircase: StaircaseConfig,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
}

/// Tone shaping and gain staging
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Linear attack ramp in milliseconds
    pub attack_ms: u32,
    /// Linear release ramp in milliseconds
    pub release_ms: u32,
    /// Duration used by requests that don't set one
    pub default_duration_ms: u32,
    /// Linear gain of a 0 dB tone
    pub reference_gain: f32,
    /// Shared master stage; never above 0.5 (see `effective_master_volume`)
    pub master_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            attack_ms: ATTACK_MS,
            release_ms: RELEASE_MS,
            default_duration_ms: DEFAULT_DURATION_MS,
            reference_gain: REFERENCE_GAIN,
            master_volume: MASTER_VOLUME,
        }
    }
}

impl PlaybackConfig {
    /// Master volume actually applied to the output
    pub fn effective_master_volume(&self) -> f32 {
        if self.master_volume.is_finite() {
            self.master_volume.clamp(0.0, MASTER_VOLUME)
        } else {
            MASTER_VOLUME
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capacity of the lock-free voice queue to the audio thread
    pub command_queue_capacity: usize,
    /// Maximum number of simultaneously tracked tones
    pub max_voices: usize,
    /// Sample rate of the device-free backend
    pub offline_sample_rate: u32,
    /// Frames rendered per block by the device-free backend
    pub offline_block_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 32,
            max_voices: 16,
            offline_sample_rate: 48000,
            offline_block_frames: 480,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file can't be read,
    /// isn't valid JSON, or holds an invalid staircase section.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let config: Self = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    return Self::default();
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        if let Err(err) = config.staircase.validate() {
            log::warn!("[Config] {}. Using default staircase.", err);
            return Self {
                staircase: StaircaseConfig::default(),
                ..config
            };
        }
        if config.playback.master_volume > MASTER_VOLUME {
            log::warn!(
                "[Config] master_volume {} above ceiling, clamped to {}",
                config.playback.master_volume,
                MASTER_VOLUME
            );
        }
        config
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/hearing_config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hearing_check_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.staircase.initial_level, -20.0);
        assert_eq!(config.playback.attack_ms, 10);
        assert_eq!(config.playback.release_ms, 50);
        assert_eq!(config.playback.default_duration_ms, 1000);
        assert_eq!(config.playback.reference_gain, 0.3);
        assert_eq!(config.playback.master_volume, 0.5);
        assert_eq!(config.audio.max_voices, 16);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.staircase, config.staircase);
        assert_eq!(parsed.playback, config.playback);
    }

    #[test]
    fn test_master_volume_ceiling() {
        let loud = PlaybackConfig {
            master_volume: 0.9,
            ..PlaybackConfig::default()
        };
        assert_eq!(loud.effective_master_volume(), 0.5);

        let quiet = PlaybackConfig {
            master_volume: 0.2,
            ..PlaybackConfig::default()
        };
        assert_eq!(quiet.effective_master_volume(), 0.2);

        let broken = PlaybackConfig {
            master_volume: f32::NAN,
            ..PlaybackConfig::default()
        };
        assert_eq!(broken.effective_master_volume(), 0.5);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file(temp_path("missing_does_not_exist"));
        assert_eq!(config.staircase, StaircaseConfig::default());
    }

    #[test]
    fn test_partial_file_merges_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"staircase": {"max_reversals": 6}}"#).unwrap();

        let config = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.staircase.max_reversals, 6);
        assert_eq!(config.staircase.step_down, 6.0);
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_invalid_staircase_falls_back() {
        let path = temp_path("invalid");
        fs::write(&path, r#"{"staircase": {"min_level": 5.0, "max_level": -5.0}}"#).unwrap();

        let config = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(config.staircase, StaircaseConfig::default());
    }
}
