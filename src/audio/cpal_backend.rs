//! Native capture through cpal.
//!
//! `cpal::Stream` is not `Send` on every platform, so each open stream lives on
//! its own thread and is driven through a command channel. Closing the handle
//! joins that thread; once `close` returns no callback can still be running.

use super::backend::{CaptureBackend, CaptureStream, NativeDevice, PeakSink, StreamTarget};
use super::device::StreamPreference;
use super::peak::buffer_peak;
use crate::error::BackendError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Sample rates reported in device listings when a device supports them.
const COMMON_RATES: [u32; 4] = [44_100, 48_000, 88_200, 96_000];

/// RAII guard that points stderr at /dev/null while ALSA probes devices.
/// ALSA prints probe failures straight to fd 2, which would corrupt the screen.
struct StderrSuppressor {
    saved_fd: i32,
    _dev_null: File,
}

impl StderrSuppressor {
    fn new() -> Option<Self> {
        let dev_null = File::open("/dev/null").ok()?;

        let saved_fd = unsafe { libc::dup(2) };
        if saved_fd < 0 {
            return None;
        }

        if unsafe { libc::dup2(dev_null.as_raw_fd(), 2) } < 0 {
            unsafe {
                libc::close(saved_fd);
            }
            return None;
        }

        Some(Self { saved_fd, _dev_null: dev_null })
    }
}

impl Drop for StderrSuppressor {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, 2);
            libc::close(self.saved_fd);
        }
    }
}

/// cpal host wrapper. The host itself is re-created per call from its id,
/// which keeps this type `Send` on every platform.
pub struct CpalBackend {
    host_id: Option<cpal::HostId>,
    quiet: bool,
}

impl CpalBackend {
    /// `quiet` silences ALSA's stderr chatter during enumeration and opening.
    pub fn new(quiet: bool) -> Self {
        Self { host_id: None, quiet }
    }

    fn host(&self) -> Result<cpal::Host, BackendError> {
        let id = self.host_id.ok_or(BackendError::NotInitialized)?;
        cpal::host_from_id(id).map_err(|e| BackendError::HostUnavailable(e.to_string()))
    }

    fn suppress(&self) -> Option<StderrSuppressor> {
        if self.quiet {
            StderrSuppressor::new()
        } else {
            None
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn initialize(&mut self) -> Result<(), BackendError> {
        let _quiet = self.suppress();
        let host = cpal::default_host();
        // Probing the device list is the closest cpal has to an explicit init.
        host.input_devices()
            .map_err(|e| BackendError::HostUnavailable(e.to_string()))?;
        log::info!("audio host: {:?}", host.id());
        self.host_id = Some(host.id());
        Ok(())
    }

    fn terminate(&mut self) {
        if self.host_id.take().is_some() {
            log::debug!("audio host released");
        }
    }

    fn is_initialized(&self) -> bool {
        self.host_id.is_some()
    }

    fn input_devices(&self) -> Result<Vec<NativeDevice>, BackendError> {
        let _quiet = self.suppress();
        let host = self.host()?;
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| BackendError::Enumeration(e.to_string()))?;

        let mut found = Vec::new();
        for device in devices {
            let Ok(name) = device.name() else { continue };
            let (channels, sample_rates) = describe(&device);
            if channels == 0 {
                continue;
            }
            found.push(NativeDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                max_input_channels: channels,
                sample_rates,
            });
        }
        Ok(found)
    }

    fn open(
        &mut self,
        target: &StreamTarget,
        preference: &StreamPreference,
        sink: PeakSink,
    ) -> Result<Box<dyn CaptureStream>, BackendError> {
        let host_id = self.host_id.ok_or(BackendError::NotInitialized)?;
        let _quiet = self.suppress();
        let target = target.clone();
        let preference = *preference;

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), BackendError>>(1);
        let (command_tx, command_rx) = mpsc::channel::<StreamCommand>();

        let thread = thread::Builder::new()
            .name("milkshaker-capture".into())
            .spawn(move || {
                let stream = match build_stream(host_id, &target, &preference, sink) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Some hosts start delivering as soon as the stream is built.
                let _ = stream.pause();
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StreamCommand::Start(reply) => {
                            let _ = reply.send(
                                stream.play().map_err(|e| BackendError::Stream(e.to_string())),
                            );
                        }
                        StreamCommand::Stop(reply) => {
                            let _ = reply.send(
                                stream.pause().map_err(|e| BackendError::Stream(e.to_string())),
                            );
                        }
                        StreamCommand::Close => break,
                    }
                }
                drop(stream);
            })
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                commands: command_tx,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BackendError::Stream("capture thread exited during open".into()))
            }
        }
    }
}

enum StreamCommand {
    Start(mpsc::SyncSender<Result<(), BackendError>>),
    Stop(mpsc::SyncSender<Result<(), BackendError>>),
    Close,
}

/// Handle to a stream owned by its capture thread.
struct CpalStream {
    commands: mpsc::Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn request(
        &self,
        make: fn(mpsc::SyncSender<Result<(), BackendError>>) -> StreamCommand,
    ) -> Result<(), BackendError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.commands
            .send(make(reply_tx))
            .map_err(|_| BackendError::Stream("capture thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| BackendError::Stream("capture thread is gone".into()))?
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(StreamCommand::Close);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl CaptureStream for CpalStream {
    fn start(&mut self) -> Result<(), BackendError> {
        self.request(StreamCommand::Start)
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.request(StreamCommand::Stop)
    }

    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Max input channels and the common sample rates a device supports.
fn describe(device: &cpal::Device) -> (u16, Vec<u32>) {
    let Ok(ranges) = device.supported_input_configs() else {
        return match device.default_input_config() {
            Ok(config) => (config.channels(), vec![config.sample_rate().0]),
            Err(_) => (0, Vec::new()),
        };
    };

    let mut channels = 0;
    let mut rates = Vec::new();
    for range in ranges {
        channels = channels.max(range.channels());
        for rate in COMMON_RATES {
            if range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0 && !rates.contains(&rate) {
                rates.push(rate);
            }
        }
    }
    rates.sort_unstable();
    (channels, rates)
}

fn find_device(host: &cpal::Host, target: &StreamTarget) -> Result<cpal::Device, BackendError> {
    match target {
        StreamTarget::DefaultInput => host
            .default_input_device()
            .ok_or_else(|| BackendError::DeviceNotFound("default input".into())),
        StreamTarget::Named { name, occurrence } => host
            .input_devices()
            .map_err(|e| BackendError::Enumeration(e.to_string()))?
            .filter(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .nth(*occurrence)
            .ok_or_else(|| BackendError::DeviceNotFound(name.clone())),
    }
}

/// Sample format of the first supported range matching the preference.
fn matching_format(
    device: &cpal::Device,
    preference: &StreamPreference,
) -> Result<SampleFormat, BackendError> {
    let Ok(ranges) = device.supported_input_configs() else {
        // Devices that can't describe themselves get a blind f32 attempt.
        return Ok(SampleFormat::F32);
    };
    let mut matching: Vec<SampleFormat> = ranges
        .filter(|r| {
            r.channels() == preference.channels
                && r.min_sample_rate().0 <= preference.sample_rate
                && preference.sample_rate <= r.max_sample_rate().0
        })
        .map(|r| r.sample_format())
        .collect();
    if matching.is_empty() {
        return Err(BackendError::ConfigRejected(format!("{} not supported", preference)));
    }
    if matching.contains(&SampleFormat::F32) {
        return Ok(SampleFormat::F32);
    }
    Ok(matching.remove(0))
}

fn build_stream(
    host_id: cpal::HostId,
    target: &StreamTarget,
    preference: &StreamPreference,
    sink: PeakSink,
) -> Result<cpal::Stream, BackendError> {
    let host = cpal::host_from_id(host_id).map_err(|e| BackendError::HostUnavailable(e.to_string()))?;
    let device = find_device(&host, target)?;
    let format = matching_format(&device, preference)?;

    let mut config = cpal::StreamConfig {
        channels: preference.channels,
        sample_rate: cpal::SampleRate(preference.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(preference.buffer_size),
    };

    match build_for_format(&device, &config, format, sink.clone()) {
        Ok(stream) => Ok(stream),
        Err(first) => {
            // Plenty of devices accept the rate but not a fixed period size.
            log::debug!("fixed buffer rejected ({}), retrying with device default", first);
            config.buffer_size = cpal::BufferSize::Default;
            build_for_format(&device, &config, format, sink)
        }
    }
}

fn build_for_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: SampleFormat,
    sink: PeakSink,
) -> Result<cpal::Stream, BackendError> {
    match format {
        SampleFormat::F32 => build_typed::<f32>(device, config, sink),
        SampleFormat::F64 => build_typed::<f64>(device, config, sink),
        SampleFormat::I16 => build_typed::<i16>(device, config, sink),
        SampleFormat::I32 => build_typed::<i32>(device, config, sink),
        SampleFormat::U16 => build_typed::<u16>(device, config, sink),
        SampleFormat::I8 => build_typed::<i8>(device, config, sink),
        SampleFormat::U8 => build_typed::<u8>(device, config, sink),
        other => Err(BackendError::ConfigRejected(format!("unsupported sample format {:?}", other))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: PeakSink,
) -> Result<cpal::Stream, BackendError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                sink(buffer_peak(data.iter().map(|&s| f32::from_sample_(s))));
            },
            |err| log::warn!("capture stream error: {}", err),
            None,
        )
        .map_err(|e| BackendError::ConfigRejected(e.to_string()))
}
