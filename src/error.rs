//! Error taxonomy for the capture pipeline and the binary boundary.

use std::io;
use thiserror::Error;

/// Failures reported by the native audio subsystem.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("audio host unavailable: {0}")]
    HostUnavailable(String),

    #[error("failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("configuration rejected: {0}")]
    ConfigRejected(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("audio subsystem not initialized")]
    NotInitialized,
}

/// Engine initialization failed; the process cannot continue.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to initialize audio subsystem: {0}")]
    Backend(#[from] BackendError),

    #[error("no audio input sources found")]
    NoDevices,
}

/// Every configuration in the preference table was rejected by one device.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("could not open {device}: {reason}")]
pub struct DeviceOpenError {
    pub device: String,
    pub reason: String,
}

/// The OS routing side channel failed. Always non-fatal.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("{tool} is not available: {source}")]
    ToolMissing {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("refusing unsafe source name {0:?}")]
    InvalidName(String),

    #[error("routing disabled")]
    Disabled,
}

/// Start (or the start half of Restart) could not begin capture.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("no capture session is open")]
    NoSession,

    #[error("failed to start capture: {0}")]
    Start(BackendError),

    #[error("audio engine not initialized")]
    NotInitialized,
}

/// The target device could not be opened. The previous session was restored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("no devices to cycle through")]
    NoDevices,

    #[error(transparent)]
    Open(#[from] DeviceOpenError),

    #[error("switched device but could not resume capture: {0}")]
    Resume(CaptureError),
}

/// Invalid runtime configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("decay factor must be in (0, 1), got {0}")]
    Decay(f32),

    #[error("sensitivity range [{min}, {max}] is invalid")]
    SensitivityRange { min: f32, max: f32 },

    #[error("frame rate must be between 1 and 240, got {0}")]
    FrameRate(u32),
}

/// Errors that terminate the binary with a non-zero status.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}
