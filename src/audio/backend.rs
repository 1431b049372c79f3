//! Contract between the engine and a native audio subsystem.

use super::device::StreamPreference;
use crate::error::BackendError;
use std::sync::Arc;

/// Receives the peak of each delivered buffer. Runs on the audio thread.
pub type PeakSink = Arc<dyn Fn(f32) + Send + Sync>;

/// A capture-capable device as reported by the native API.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDevice {
    pub name: String,
    pub max_input_channels: u16,
    pub sample_rates: Vec<u32>,
    pub is_default: bool,
}

/// Which device a stream should bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// The n-th device with this native name (names may repeat).
    Named { name: String, occurrence: usize },
    /// Whatever the OS currently considers the default input.
    DefaultInput,
}

/// Native audio subsystem: lifecycle, enumeration and stream opening.
pub trait CaptureBackend: Send {
    fn initialize(&mut self) -> Result<(), BackendError>;

    fn terminate(&mut self);

    fn is_initialized(&self) -> bool;

    fn input_devices(&self) -> Result<Vec<NativeDevice>, BackendError>;

    /// Open a stream in the stopped state with exactly this configuration.
    fn open(
        &mut self,
        target: &StreamTarget,
        preference: &StreamPreference,
        sink: PeakSink,
    ) -> Result<Box<dyn CaptureStream>, BackendError>;
}

/// An open native stream. Dropping or closing it stops callback delivery.
pub trait CaptureStream: Send {
    fn start(&mut self) -> Result<(), BackendError>;

    fn stop(&mut self) -> Result<(), BackendError>;

    /// Stop delivery and wait for any in-flight callback before releasing the stream.
    fn close(self: Box<Self>);
}
