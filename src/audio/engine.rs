//! Audio engine: owns the capture session and the loudness envelope.
//!
//! # Threads
//! - The audio callback takes the level write lock for one envelope update.
//! - The render loop takes the level read lock once per frame.
//! - Control calls (start, stop, restart, cycle) serialize on the control
//!   mutex, which is held across the slow native open/close calls and is
//!   never touched from the audio callback.
//!
//! The display snapshot (`EngineStatus`) is kept separately so the render
//! loop can show the device name without waiting on a device switch.

use super::backend::{CaptureBackend, PeakSink};
use super::device::DeviceKind;
use super::peak::{scale_peak, PeakDetector, Sensitivity};
use super::registry::DeviceRegistry;
use super::routing::{AudioRouter, NullRouter, SinkState};
use super::session::CaptureSession;
use crate::config::EngineConfig;
use crate::error::{CaptureError, ConfigError, CycleError, DeviceOpenError, InitError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Raw peaks below this count as silence for the "No Audio" status.
pub const SILENCE_THRESHOLD: f32 = 0.0001;
/// Silence longer than this switches the status to "No Audio".
pub const NO_AUDIO_AFTER: Duration = Duration::from_secs(5);

/// State written by the audio callback.
struct LevelState {
    detector: PeakDetector,
    sensitivity: Sensitivity,
    last_raw: f32,
    last_audio: Instant,
}

/// Snapshot for display; never blocks on device operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    pub device_name: Option<String>,
    pub device_index: usize,
    pub device_count: usize,
    pub capturing: bool,
}

struct Control {
    backend: Box<dyn CaptureBackend>,
    router: Box<dyn AudioRouter>,
    registry: DeviceRegistry,
    session: Option<CaptureSession>,
    /// Default source before we touched routing; restored on cleanup.
    original_source: Option<String>,
    routing_touched: bool,
    initialized: bool,
}

pub struct AudioEngine {
    level: Arc<RwLock<LevelState>>,
    control: Mutex<Control>,
    status: RwLock<EngineStatus>,
    settle: Duration,
    restart_delay: Duration,
    routing: bool,
    preferred_device: Option<String>,
}

impl AudioEngine {
    pub fn new(
        config: &EngineConfig,
        backend: Box<dyn CaptureBackend>,
        router: Box<dyn AudioRouter>,
    ) -> Result<Self, ConfigError> {
        let level = LevelState {
            detector: PeakDetector::new(config.decay)?,
            sensitivity: config.sensitivity,
            last_raw: 0.0,
            last_audio: Instant::now(),
        };
        Ok(Self {
            level: Arc::new(RwLock::new(level)),
            control: Mutex::new(Control {
                backend,
                router,
                registry: DeviceRegistry::default(),
                session: None,
                original_source: None,
                routing_touched: false,
                initialized: false,
            }),
            status: RwLock::new(EngineStatus::default()),
            settle: config.settle,
            restart_delay: config.restart_delay,
            routing: config.routing,
            preferred_device: config.preferred_device.clone(),
        })
    }

    /// Auto-route, bring up the native subsystem, rank devices and open the best one.
    ///
    /// Fails only when the subsystem won't start or no input exists at all.
    /// If every device refuses to open, the engine still initializes without
    /// a session and reports "No Audio".
    pub fn initialize(&self) -> Result<(), InitError> {
        let mut ctrl = self.control.lock();
        if ctrl.initialized {
            return Ok(());
        }

        if self.routing {
            match ctrl.router.default_source() {
                Ok(original) => ctrl.original_source = original,
                Err(e) => log::warn!("could not read default source: {}", e),
            }
            auto_route(&mut ctrl);
        }

        ctrl.backend.initialize()?;

        let registry = DeviceRegistry::discover(self.router(&ctrl), ctrl.backend.as_ref());
        if registry.is_empty() {
            ctrl.backend.terminate();
            return Err(InitError::NoDevices);
        }
        ctrl.registry = registry;
        ctrl.initialized = true;

        let first = self
            .preferred_device
            .as_deref()
            .and_then(|query| {
                let found = ctrl.registry.find(query);
                if found.is_none() {
                    log::warn!("no device matches {:?}, using the top-ranked one", query);
                }
                found
            })
            .unwrap_or(0);

        let count = ctrl.registry.len();
        for index in (0..count).map(|offset| (first + offset) % count) {
            match self.open_index(&mut ctrl, index) {
                Ok(session) => {
                    ctrl.registry.select(index);
                    ctrl.session = Some(session);
                    break;
                }
                Err(e) => log::warn!("{}; trying next device", e),
            }
        }
        if ctrl.session.is_none() {
            log::warn!("no device could be opened; capture unavailable");
        }

        self.publish(&ctrl);
        Ok(())
    }

    /// Begin delivering callbacks. Re-attempts opening the current device once
    /// if no session is open.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut ctrl = self.control.lock();
        let result = self.start_locked(&mut ctrl);
        self.publish(&ctrl);
        result
    }

    /// Halt delivery. Idempotent. An explicit stop clears the envelope so a
    /// stopped engine reads zero.
    pub fn stop(&self) {
        let mut ctrl = self.control.lock();
        if Self::stop_locked(&mut ctrl) {
            self.level.write().detector.reset();
        }
        self.publish(&ctrl);
    }

    /// Stop, settle, start, as one operation with respect to other control calls.
    pub fn restart(&self) -> Result<(), CaptureError> {
        let mut ctrl = self.control.lock();
        if Self::stop_locked(&mut ctrl) {
            self.publish(&ctrl);
            thread::sleep(self.restart_delay);
        }
        let result = self.start_locked(&mut ctrl);
        self.publish(&ctrl);
        result
    }

    /// Switch to the next ranked device, keeping the running/stopped state.
    ///
    /// The previous session stays open (paused) until the new one is up; if
    /// the new device can't be opened or started, the previous session is
    /// resumed and the engine is left exactly as it was.
    pub fn cycle_device(&self) -> Result<(), CycleError> {
        let mut ctrl = self.control.lock();
        let result = self.cycle_locked(&mut ctrl);
        self.publish(&ctrl);
        result
    }

    fn cycle_locked(&self, ctrl: &mut Control) -> Result<(), CycleError> {
        if !ctrl.initialized || ctrl.registry.is_empty() {
            return Err(CycleError::NoDevices);
        }
        if ctrl.registry.len() == 1 && ctrl.session.is_some() {
            log::info!("only one device available; nothing to cycle to");
            return Ok(());
        }
        let Some(target) = ctrl.registry.next_index() else {
            return Err(CycleError::NoDevices);
        };

        let was_running = ctrl.session.as_ref().is_some_and(|s| s.is_running());
        let previous_default = match ctrl.registry.get(target).map(|d| d.is_monitor()) {
            Some(true) if self.routing => ctrl.router.default_source().ok().flatten(),
            _ => None,
        };

        if was_running {
            if let Some(session) = ctrl.session.as_mut() {
                if let Err(e) = session.stop() {
                    log::warn!("pausing current device failed: {}", e);
                }
            }
        }

        let mut opened = match self.open_index(ctrl, target) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("cycle failed: {}; staying on current device", e);
                Self::roll_back(ctrl, previous_default, was_running);
                return Err(CycleError::Open(e));
            }
        };

        // The new device must be running before the old one is let go.
        if was_running {
            if let Err(e) = opened.start() {
                log::warn!("{} opened but would not start: {}; staying on current device", opened.device().name, e);
                opened.close();
                Self::roll_back(ctrl, previous_default, was_running);
                return Err(CycleError::Resume(CaptureError::Start(e)));
            }
            self.level.write().last_audio = Instant::now();
        }

        if let Some(old) = ctrl.session.take() {
            old.close();
        }
        ctrl.registry.select(target);
        if let DeviceKind::Monitor { source, .. } = &opened.device().kind {
            if self.routing {
                ctrl.routing_touched = true;
                if let Err(e) = ctrl.router.move_source_outputs(source) {
                    log::debug!("could not re-target capture streams: {}", e);
                }
            }
        }
        log::info!("switched to {}", opened.device().name);
        ctrl.session = Some(opened);
        Ok(())
    }

    /// Put routing and the previous session back after a failed switch.
    fn roll_back(ctrl: &mut Control, previous_default: Option<String>, was_running: bool) {
        if let Some(name) = previous_default {
            if let Err(e) = ctrl.router.set_default_source(&name) {
                log::warn!("could not restore default source {}: {}", name, e);
            }
        }
        if was_running {
            if let Some(session) = ctrl.session.as_mut() {
                if let Err(e) = session.start() {
                    log::warn!("could not resume previous device: {}", e);
                }
            }
        }
    }

    /// Stop, close the session, shut the native subsystem down and restore
    /// the default source. Safe after a partial or failed initialize, and
    /// safe to call more than once.
    pub fn cleanup(&self) {
        let mut ctrl = self.control.lock();
        Self::stop_locked(&mut ctrl);
        if let Some(session) = ctrl.session.take() {
            session.close();
        }
        if ctrl.backend.is_initialized() {
            ctrl.backend.terminate();
        }
        if ctrl.routing_touched {
            if let Some(original) = ctrl.original_source.take() {
                match ctrl.router.set_default_source(&original) {
                    Ok(()) => log::info!("restored default source {}", original),
                    Err(e) => log::warn!("could not restore default source {}: {}", original, e),
                }
            }
            ctrl.routing_touched = false;
        }
        ctrl.initialized = false;
        self.publish(&ctrl);
    }

    /// Smoothed loudness in `[0, 1]`.
    pub fn loudness(&self) -> f32 {
        self.level.read().detector.read()
    }

    /// Smoothed loudness as a percentage.
    pub fn loudness_percent(&self) -> f32 {
        self.loudness() * 100.0
    }

    /// Last raw buffer peak, before sensitivity and smoothing.
    pub fn raw_peak(&self) -> f32 {
        self.level.read().last_raw
    }

    pub fn sensitivity(&self) -> f32 {
        self.level.read().sensitivity.value()
    }

    pub fn increase_sensitivity(&self) -> f32 {
        self.level.write().sensitivity.increase()
    }

    pub fn decrease_sensitivity(&self) -> f32 {
        self.level.write().sensitivity.decrease()
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.status.read().capturing
    }

    pub fn current_device_name(&self) -> String {
        self.status
            .read()
            .device_name
            .clone()
            .unwrap_or_else(|| "No Audio".to_string())
    }

    pub fn time_since_last_audio(&self) -> Duration {
        self.level.read().last_audio.elapsed()
    }

    /// One-line capture status for the overlay.
    pub fn status_text(&self) -> String {
        let status = self.status();
        if status.device_name.is_none() {
            return "No Audio".to_string();
        }
        if !status.capturing {
            return "Stopped".to_string();
        }
        let silent_for = self.time_since_last_audio();
        if silent_for > NO_AUDIO_AFTER {
            format!("Live - No Audio ({:.0}s)", silent_for.as_secs_f32())
        } else {
            "Live - System Audio".to_string()
        }
    }

    fn start_locked(&self, ctrl: &mut Control) -> Result<(), CaptureError> {
        if !ctrl.initialized {
            return Err(CaptureError::NotInitialized);
        }
        if ctrl.session.is_none() {
            let index = ctrl.registry.current_index();
            match self.open_index(ctrl, index) {
                Ok(session) => ctrl.session = Some(session),
                Err(e) => {
                    log::warn!("{}", e);
                    return Err(CaptureError::NoSession);
                }
            }
        }
        let Some(session) = ctrl.session.as_mut() else {
            return Err(CaptureError::NoSession);
        };
        session.start().map_err(CaptureError::Start)?;
        // Fresh start: don't report the silence from before we were listening.
        self.level.write().last_audio = Instant::now();
        log::info!("capture started on {}", session.device().name);
        Ok(())
    }

    /// Returns whether a running session was stopped.
    fn stop_locked(ctrl: &mut Control) -> bool {
        let Some(session) = ctrl.session.as_mut() else {
            return false;
        };
        if !session.is_running() {
            return false;
        }
        if let Err(e) = session.stop() {
            log::warn!("stopping capture reported: {}", e);
        }
        log::info!("capture stopped");
        true
    }

    fn open_index(&self, ctrl: &mut Control, index: usize) -> Result<CaptureSession, DeviceOpenError> {
        let Some(device) = ctrl.registry.get(index).cloned() else {
            return Err(DeviceOpenError {
                device: format!("#{}", index),
                reason: "no such device".into(),
            });
        };
        let settle = if self.routing { self.settle } else { Duration::ZERO };
        if device.is_monitor() && self.routing {
            ctrl.routing_touched = true;
        }
        let router: &dyn AudioRouter = if self.routing { ctrl.router.as_ref() } else { &NullRouter };
        CaptureSession::open(
            ctrl.backend.as_mut(),
            router,
            &device,
            self.peak_sink(),
            settle,
        )
    }

    fn router<'a>(&self, ctrl: &'a Control) -> &'a dyn AudioRouter {
        if self.routing {
            ctrl.router.as_ref()
        } else {
            &NullRouter
        }
    }

    /// Callback body: scale, clamp, one envelope update. No I/O, no allocation.
    fn peak_sink(&self) -> PeakSink {
        let level = Arc::clone(&self.level);
        Arc::new(move |raw: f32| {
            let mut state = level.write();
            let scaled = scale_peak(raw, state.sensitivity.value());
            state.detector.update(scaled);
            state.last_raw = raw;
            if raw > SILENCE_THRESHOLD {
                state.last_audio = Instant::now();
            }
        })
    }

    fn publish(&self, ctrl: &Control) {
        let status = EngineStatus {
            device_name: ctrl.session.as_ref().map(|s| s.device().name.clone()),
            device_index: ctrl.registry.current_index(),
            device_count: ctrl.registry.len(),
            capturing: ctrl.session.as_ref().is_some_and(|s| s.is_running()),
        };
        *self.status.write() = status;
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Point the default source at the monitor of the first RUNNING sink.
fn auto_route(ctrl: &mut Control) {
    let sinks = match ctrl.router.list_sinks() {
        Ok(sinks) => sinks,
        Err(e) => {
            log::warn!("audio routing unavailable: {}", e);
            return;
        }
    };
    let Some(active) = sinks.iter().find(|s| s.state == SinkState::Running) else {
        log::info!("no output sink is currently playing");
        return;
    };
    let monitor = format!("{}.monitor", active.name);
    match ctrl.router.set_default_source(&monitor) {
        Ok(()) => {
            ctrl.routing_touched = true;
            log::info!("auto-configured source {}", monitor);
        }
        Err(e) => log::warn!("could not select monitor {}: {}", monitor, e),
    }
}
