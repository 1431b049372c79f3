//! Runtime configuration, validated from settings and command-line flags.

use crate::audio::peak::Sensitivity;
pub use crate::audio::peak::{SENSITIVITY_MAX, SENSITIVITY_MIN, SENSITIVITY_STEP};
use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_DECAY: f32 = 0.95;
pub const DEFAULT_SENSITIVITY: f32 = 1.0;
/// Pause after changing the default source before opening a stream on it.
pub const DEFAULT_SETTLE_MS: u64 = 100;
/// Pause between stop and start when restarting capture.
pub const DEFAULT_RESTART_DELAY_MS: u64 = 100;
pub const DEFAULT_FPS: u32 = 60;
pub const MAX_FPS: u32 = 240;
pub const DEFAULT_SHUFFLE_SECS: u64 = 27;

/// Audio engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub decay: f32,
    pub sensitivity: Sensitivity,
    pub settle: Duration,
    pub restart_delay: Duration,
    /// Use the OS routing side channel (monitor sources, default-source changes).
    pub routing: bool,
    /// Index or name fragment of the device to open first.
    pub preferred_device: Option<String>,
}

impl EngineConfig {
    pub fn new(decay: f32, sensitivity: f32) -> Result<Self, ConfigError> {
        if !(decay > 0.0 && decay < 1.0) {
            return Err(ConfigError::Decay(decay));
        }
        Ok(Self {
            decay,
            sensitivity: Sensitivity::new(sensitivity, SENSITIVITY_MIN, SENSITIVITY_MAX, SENSITIVITY_STEP)?,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            routing: true,
            preferred_device: None,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            sensitivity: Sensitivity::default(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            routing: true,
            preferred_device: None,
        }
    }
}

/// Display / render loop configuration
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub fps: u32,
    pub pattern: Option<String>,
    pub shuffle: bool,
    pub shuffle_every: Duration,
    pub seed: Option<u64>,
}

impl DisplayConfig {
    pub fn new(fps: u32) -> Result<Self, ConfigError> {
        if fps == 0 || fps > MAX_FPS {
            return Err(ConfigError::FrameRate(fps));
        }
        Ok(Self {
            fps,
            pattern: None,
            shuffle: false,
            shuffle_every: Duration::from_secs(DEFAULT_SHUFFLE_SECS),
            seed: None,
        })
    }
}
