//! Device descriptors and the stream configuration preference table.

use super::backend::StreamTarget;
use std::fmt;

/// Where a capture device comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    /// Ordinary capture hardware exposed by the native API; `occurrence`
    /// disambiguates devices that share a native name.
    Native { occurrence: usize },
    /// Loopback source mirroring an output sink, addressed through the routing layer.
    Monitor {
        source: String,
        sink: String,
        sink_running: bool,
    },
}

/// One selectable audio source in a single enumeration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    /// Unique within one snapshot.
    pub id: String,
    pub name: String,
    /// Name the native API reports (used to re-find the device when opening).
    pub native_name: String,
    pub channels: u16,
    pub sample_rates: Vec<u32>,
    pub is_default: bool,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn is_monitor(&self) -> bool {
        matches!(self.kind, DeviceKind::Monitor { .. })
    }

    /// What the native API must open to capture from this device.
    pub fn target(&self) -> StreamTarget {
        match self.kind {
            DeviceKind::Native { occurrence } => StreamTarget::Named {
                name: self.native_name.clone(),
                occurrence,
            },
            DeviceKind::Monitor { .. } => StreamTarget::DefaultInput,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            DeviceKind::Native { .. } => "native",
            DeviceKind::Monitor { .. } => "monitor",
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind_label())
    }
}

/// One (channels, sample rate, buffer size) combination to try when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPreference {
    pub channels: u16,
    pub sample_rate: u32,
    pub buffer_size: u32,
}

impl fmt::Display for StreamPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = if self.channels == 1 { "mono" } else { "stereo" };
        let khz = self.sample_rate as f32 / 1000.0;
        write!(f, "{} {}kHz/{}", layout, khz, self.buffer_size)
    }
}

/// Configurations tried in order; the first one the device accepts wins.
pub const STREAM_PREFERENCES: [StreamPreference; 4] = [
    StreamPreference { channels: 2, sample_rate: 44_100, buffer_size: 1024 },
    StreamPreference { channels: 1, sample_rate: 44_100, buffer_size: 1024 },
    StreamPreference { channels: 2, sample_rate: 48_000, buffer_size: 1024 },
    StreamPreference { channels: 1, sample_rate: 48_000, buffer_size: 512 },
];

/// Readable label for a monitor source.
pub fn monitor_display_name(source: &str) -> String {
    if source.contains("bluez_output") {
        return "Bluetooth Audio Monitor".to_string();
    }
    if source.contains("alsa_output") && source.contains("analog") {
        return "Built-in Audio Monitor".to_string();
    }
    if source.contains("hdmi") {
        return "HDMI Audio Monitor".to_string();
    }
    let base = source.strip_suffix(".monitor").unwrap_or(source);
    if base.chars().count() > 30 {
        format!("{}...", truncate_chars(base, 27))
    } else {
        format!("{} Monitor", base)
    }
}

/// Readable label for a native capture device.
pub fn native_display_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if lower.contains("pipewire") {
        "PipeWire".to_string()
    } else if lower.contains("pulse") {
        "PulseAudio".to_string()
    } else if lower == "default" || lower.starts_with("default:") {
        "Default".to_string()
    } else if name.chars().count() > 25 {
        format!("{}...", truncate_chars(name, 22))
    } else {
        name.to_string()
    }
}

fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
