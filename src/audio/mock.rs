//! Canned backend and router for tests.

use super::backend::{CaptureBackend, CaptureStream, NativeDevice, PeakSink, StreamTarget};
use super::device::StreamPreference;
use super::routing::{AudioRouter, SinkInfo, SourceInfo};
use crate::error::{BackendError, RoutingError};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn native(name: &str, channels: u16, is_default: bool) -> NativeDevice {
    NativeDevice {
        name: name.to_string(),
        max_input_channels: channels,
        sample_rates: vec![44_100, 48_000],
        is_default,
    }
}

#[derive(Default)]
struct MockState {
    events: Vec<String>,
    next_id: usize,
    open: Vec<(usize, String, PeakSink)>,
    running: Vec<usize>,
    terminations: usize,
}

/// Shared view into what a `MockBackend` has been asked to do.
#[derive(Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn events(&self) -> Vec<String> {
        self.0.lock().events.clone()
    }

    pub fn open_streams(&self) -> usize {
        self.0.lock().open.len()
    }

    pub fn running_labels(&self) -> Vec<String> {
        let state = self.0.lock();
        state
            .open
            .iter()
            .filter(|(id, _, _)| state.running.contains(id))
            .map(|(_, label, _)| label.clone())
            .collect()
    }

    pub fn terminations(&self) -> usize {
        self.0.lock().terminations
    }

    /// Deliver one buffer peak to every running stream, as the audio thread would.
    pub fn emit(&self, peak: f32) {
        let sinks: Vec<PeakSink> = {
            let state = self.0.lock();
            state
                .open
                .iter()
                .filter(|(id, _, _)| state.running.contains(id))
                .map(|(_, _, sink)| Arc::clone(sink))
                .collect()
        };
        for sink in sinks {
            sink(peak);
        }
    }
}

pub struct MockBackend {
    devices: Vec<NativeDevice>,
    failing: Vec<String>,
    rejected: Vec<StreamPreference>,
    fail_init: bool,
    fail_start: bool,
    failing_start_on: Vec<String>,
    initialized: bool,
    handle: MockHandle,
}

impl MockBackend {
    pub fn with_devices(names: &[&str]) -> Self {
        Self {
            devices: names.iter().map(|n| native(n, 2, false)).collect(),
            failing: Vec::new(),
            rejected: Vec::new(),
            fail_init: false,
            fail_start: false,
            failing_start_on: Vec::new(),
            initialized: false,
            handle: MockHandle::default(),
        }
    }

    /// Every configuration on this device (or "<default>" for the default input) fails.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn rejecting(mut self, preference: StreamPreference) -> Self {
        self.rejected.push(preference);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Streams on this device open fine but refuse to start.
    pub fn failing_start_on(mut self, name: &str) -> Self {
        self.failing_start_on.push(name.to_string());
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl CaptureBackend for MockBackend {
    fn initialize(&mut self) -> Result<(), BackendError> {
        if self.fail_init {
            return Err(BackendError::HostUnavailable("mock host refused".into()));
        }
        self.initialized = true;
        self.handle.0.lock().events.push("initialize".into());
        Ok(())
    }

    fn terminate(&mut self) {
        if self.initialized {
            self.initialized = false;
            let mut state = self.handle.0.lock();
            state.terminations += 1;
            state.events.push("terminate".into());
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn input_devices(&self) -> Result<Vec<NativeDevice>, BackendError> {
        if !self.initialized {
            return Err(BackendError::NotInitialized);
        }
        Ok(self.devices.clone())
    }

    fn open(
        &mut self,
        target: &StreamTarget,
        preference: &StreamPreference,
        sink: PeakSink,
    ) -> Result<Box<dyn CaptureStream>, BackendError> {
        let label = match target {
            StreamTarget::Named { name, .. } => name.clone(),
            StreamTarget::DefaultInput => "<default>".to_string(),
        };
        let mut state = self.handle.0.lock();
        if self.failing.contains(&label) || self.rejected.contains(preference) {
            state.events.push(format!("reject:{}:{}", label, preference));
            return Err(BackendError::ConfigRejected(preference.to_string()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.open.push((id, label.clone(), sink));
        state.events.push(format!("open:{}:{}", label, preference));
        let fail_start = self.fail_start || self.failing_start_on.contains(&label);
        Ok(Box::new(MockStream {
            id,
            label,
            fail_start,
            state: Arc::clone(&self.handle.0),
        }))
    }
}

struct MockStream {
    id: usize,
    label: String,
    fail_start: bool,
    state: Arc<Mutex<MockState>>,
}

impl CaptureStream for MockStream {
    fn start(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if self.fail_start {
            state.events.push(format!("start-failed:{}", self.label));
            return Err(BackendError::Stream("mock start refused".into()));
        }
        if !state.running.contains(&self.id) {
            state.running.push(self.id);
        }
        state.events.push(format!("start:{}", self.label));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.running.retain(|id| *id != self.id);
        state.events.push(format!("stop:{}", self.label));
        Ok(())
    }

    fn close(self: Box<Self>) {}
}

impl Drop for MockStream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.running.retain(|id| *id != self.id);
        state.open.retain(|(id, _, _)| *id != self.id);
        state.events.push(format!("close:{}", self.label));
    }
}

pub struct MockRouter {
    sinks: Vec<SinkInfo>,
    sources: Vec<SourceInfo>,
    default: Mutex<Option<String>>,
    calls: Arc<Mutex<Vec<String>>>,
    broken: bool,
}

impl MockRouter {
    pub fn new(sinks: Vec<SinkInfo>, sources: Vec<SourceInfo>, default: Option<&str>) -> Self {
        Self {
            sinks,
            sources,
            default: Mutex::new(default.map(str::to_string)),
            calls: Arc::default(),
            broken: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), None)
    }

    pub fn broken() -> Self {
        Self { broken: true, ..Self::empty() }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn fail(&self, command: &str) -> RoutingError {
        RoutingError::CommandFailed {
            command: command.to_string(),
            stderr: "Connection failure: Connection refused".into(),
        }
    }
}

impl AudioRouter for MockRouter {
    fn list_sinks(&self) -> Result<Vec<SinkInfo>, RoutingError> {
        if self.broken {
            return Err(self.fail("pactl list sinks short"));
        }
        Ok(self.sinks.clone())
    }

    fn list_sources(&self) -> Result<Vec<SourceInfo>, RoutingError> {
        if self.broken {
            return Err(self.fail("pactl list sources short"));
        }
        Ok(self.sources.clone())
    }

    fn default_source(&self) -> Result<Option<String>, RoutingError> {
        if self.broken {
            return Err(self.fail("pactl get-default-source"));
        }
        Ok(self.default.lock().clone())
    }

    fn set_default_source(&self, name: &str) -> Result<(), RoutingError> {
        self.calls.lock().push(format!("set-default:{}", name));
        if self.broken {
            return Err(self.fail("pactl set-default-source"));
        }
        *self.default.lock() = Some(name.to_string());
        Ok(())
    }

    fn move_source_outputs(&self, name: &str) -> Result<usize, RoutingError> {
        self.calls.lock().push(format!("move:{}", name));
        if self.broken {
            return Err(self.fail("pactl move-source-output"));
        }
        Ok(0)
    }
}
