//! A live capture session bound to one device and one stream configuration.

use super::backend::{CaptureBackend, CaptureStream, PeakSink};
use super::device::{DeviceDescriptor, DeviceKind, StreamPreference, STREAM_PREFERENCES};
use super::routing::AudioRouter;
use crate::error::{BackendError, DeviceOpenError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    OpenStopped,
    Running,
}

pub struct CaptureSession {
    device: DeviceDescriptor,
    preference: StreamPreference,
    stream: Option<Box<dyn CaptureStream>>,
    state: SessionState,
}

impl CaptureSession {
    /// Open `device` with the first configuration it accepts.
    ///
    /// Monitor sources can only be reached as "the default input", so the
    /// routing layer is pointed at them first and given `settle` to take effect.
    pub fn open(
        backend: &mut dyn CaptureBackend,
        router: &dyn AudioRouter,
        device: &DeviceDescriptor,
        sink: PeakSink,
        settle: Duration,
    ) -> Result<Self, DeviceOpenError> {
        log::info!("opening {} ({})", device.name, device.id);

        if let DeviceKind::Monitor { source, .. } = &device.kind {
            match router.set_default_source(source) {
                Ok(()) => log::debug!("default source set to {}", source),
                Err(e) => log::warn!("could not set default source to {}: {}", source, e),
            }
            if !settle.is_zero() {
                thread::sleep(settle);
            }
        }

        let target = device.target();
        let mut last_error: Option<BackendError> = None;

        for preference in STREAM_PREFERENCES.iter() {
            if preference.channels > device.channels {
                continue;
            }
            match backend.open(&target, preference, sink.clone()) {
                Ok(stream) => {
                    log::info!("opened {} ({})", device.name, preference);
                    return Ok(Self {
                        device: device.clone(),
                        preference: *preference,
                        stream: Some(stream),
                        state: SessionState::OpenStopped,
                    });
                }
                Err(e) => {
                    log::debug!("{} rejected {}: {}", device.name, preference, e);
                    last_error = Some(e);
                }
            }
        }

        Err(DeviceOpenError {
            device: device.name.clone(),
            reason: match last_error {
                Some(e) => format!("every configuration rejected (last: {})", e),
                None => "no configuration fits the device's channel count".to_string(),
            },
        })
    }

    pub fn start(&mut self) -> Result<(), BackendError> {
        match (&mut self.stream, self.state) {
            (_, SessionState::Running) => Ok(()),
            (Some(stream), _) => {
                stream.start()?;
                self.state = SessionState::Running;
                Ok(())
            }
            (None, _) => Err(BackendError::Stream("session is closed".into())),
        }
    }

    /// Halt delivery. Stopping a session that isn't running is a no-op.
    pub fn stop(&mut self) -> Result<(), BackendError> {
        if self.state != SessionState::Running {
            return Ok(());
        }
        // Count the session as stopped even if the native call complains.
        self.state = SessionState::OpenStopped;
        match &mut self.stream {
            Some(stream) => stream.stop(),
            None => Ok(()),
        }
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if self.state == SessionState::Running {
                if let Err(e) = stream.stop() {
                    log::debug!("stop before close failed: {}", e);
                }
            }
            stream.close();
            log::debug!("closed {} ({})", self.device.name, self.preference);
        }
        self.state = SessionState::Closed;
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    #[cfg(test)]
    pub fn preference(&self) -> StreamPreference {
        self.preference
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
