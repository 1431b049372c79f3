//! Device discovery, ranking and the cycling cursor.
//!
//! # Ranking
//! 1. Monitor sources whose sink is currently RUNNING
//! 2. Other monitor sources
//! 3. Native devices named after a sound server (PipeWire, PulseAudio, JACK)
//! 4. Native devices with a large channel count (usually a system aggregate)
//! 5. The OS default input
//! 6. Every remaining native device
//!
//! Entries in the same tier keep discovery order, so identical snapshots
//! always rank identically.

use super::backend::{CaptureBackend, NativeDevice};
use super::device::{monitor_display_name, native_display_name, DeviceDescriptor, DeviceKind};
use super::routing::{AudioRouter, SinkInfo, SinkState, SourceInfo};

/// Devices with at least this many inputs are treated as system aggregates.
pub const AGGREGATE_CHANNEL_THRESHOLD: u16 = 32;

const SOUND_SERVER_SIGNATURES: [&str; 3] = ["pipewire", "pulse", "jack"];

/// Ranked device snapshot plus the index of the selected entry.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
    current: usize,
}

impl DeviceRegistry {
    /// Enumerate through both the routing layer and the native API.
    /// Routing failures only reduce the choice of devices.
    pub fn discover(router: &dyn AudioRouter, backend: &dyn CaptureBackend) -> Self {
        let sinks = router.list_sinks().unwrap_or_else(|e| {
            log::warn!("could not query output sinks: {}", e);
            Vec::new()
        });
        let sources = router.list_sources().unwrap_or_else(|e| {
            log::warn!("could not query input sources: {}", e);
            Vec::new()
        });
        let natives = backend.input_devices().unwrap_or_else(|e| {
            log::warn!("could not query native input devices: {}", e);
            Vec::new()
        });

        let registry = Self::from_snapshot(&sinks, &sources, &natives);
        log::info!("found {} audio sources", registry.len());
        for (i, device) in registry.devices.iter().enumerate() {
            log::debug!("  [{}] {} id={} ch={}", i, device, device.id, device.channels);
        }
        registry
    }

    pub fn from_snapshot(sinks: &[SinkInfo], sources: &[SourceInfo], natives: &[NativeDevice]) -> Self {
        let mut ranked: Vec<(u8, DeviceDescriptor)> = Vec::new();

        for source in sources {
            let Some(sink) = source.monitor_of() else { continue };
            let running = sinks
                .iter()
                .any(|s| s.name == sink && s.state == SinkState::Running);
            ranked.push((
                if running { 0 } else { 1 },
                DeviceDescriptor {
                    id: format!("monitor:{}", source.name),
                    name: monitor_display_name(&source.name),
                    native_name: String::new(),
                    channels: source.channels,
                    sample_rates: vec![source.sample_rate],
                    is_default: false,
                    kind: DeviceKind::Monitor {
                        source: source.name.clone(),
                        sink: sink.to_string(),
                        sink_running: running,
                    },
                },
            ));
        }

        for (i, native) in natives.iter().enumerate() {
            if native.max_input_channels == 0 {
                continue;
            }
            let occurrence = natives[..i].iter().filter(|n| n.name == native.name).count();
            let id = if occurrence == 0 {
                format!("native:{}", native.name)
            } else {
                format!("native:{}#{}", native.name, occurrence + 1)
            };
            ranked.push((
                native_tier(native),
                DeviceDescriptor {
                    id,
                    name: native_display_name(&native.name),
                    native_name: native.name.clone(),
                    channels: native.max_input_channels,
                    sample_rates: native.sample_rates.clone(),
                    is_default: native.is_default,
                    kind: DeviceKind::Native { occurrence },
                },
            ));
        }

        // Stable: ties keep discovery order.
        ranked.sort_by_key(|(tier, _)| *tier);
        let mut devices: Vec<DeviceDescriptor> = Vec::with_capacity(ranked.len());
        for (_, device) in ranked {
            // Routing can list the same monitor twice; keep the better-ranked one.
            if !devices.iter().any(|d| d.id == device.id) {
                devices.push(device);
            }
        }

        Self { devices, current: 0 }
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&DeviceDescriptor> {
        self.devices.get(self.current)
    }

    pub fn get(&self, index: usize) -> Option<&DeviceDescriptor> {
        self.devices.get(index)
    }

    /// Index after the current one, wrapping.
    pub fn next_index(&self) -> Option<usize> {
        if self.devices.is_empty() {
            None
        } else {
            Some((self.current + 1) % self.devices.len())
        }
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.devices.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Resolve a user query: a ranked index, or a case-insensitive substring
    /// of the display name or id.
    pub fn find(&self, query: &str) -> Option<usize> {
        if let Ok(index) = query.trim().parse::<usize>() {
            return (index < self.devices.len()).then_some(index);
        }
        let needle = query.to_lowercase();
        self.devices.iter().position(|d| {
            d.name.to_lowercase().contains(&needle) || d.id.to_lowercase().contains(&needle)
        })
    }
}

fn native_tier(device: &NativeDevice) -> u8 {
    let lower = device.name.to_lowercase();
    if SOUND_SERVER_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        2
    } else if device.max_input_channels >= AGGREGATE_CHANNEL_THRESHOLD {
        3
    } else if device.is_default {
        4
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{native, MockBackend, MockRouter};

    fn snapshot() -> (Vec<SinkInfo>, Vec<SourceInfo>, Vec<NativeDevice>) {
        let sinks = vec![
            SinkInfo { name: "alsa_output.analog-stereo".into(), state: SinkState::Suspended },
            SinkInfo { name: "alsa_output.hdmi-stereo".into(), state: SinkState::Running },
        ];
        let sources = vec![
            SourceInfo { name: "alsa_output.analog-stereo.monitor".into(), channels: 2, sample_rate: 48_000 },
            SourceInfo { name: "alsa_input.analog-stereo".into(), channels: 2, sample_rate: 48_000 },
            SourceInfo { name: "alsa_output.hdmi-stereo.monitor".into(), channels: 2, sample_rate: 48_000 },
        ];
        let natives = vec![
            native("hw:CARD=PCH,DEV=0", 2, false),
            native("USB Mic", 1, true),
            native("pipewire", 64, false),
            native("Loopback Aggregate", 64, false),
            native("hw:CARD=PCH,DEV=0", 2, false),
        ];
        (sinks, sources, natives)
    }

    #[test]
    fn running_monitor_ranks_first() {
        let (sinks, sources, natives) = snapshot();
        let registry = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        let ids: Vec<&str> = registry.devices().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "monitor:alsa_output.hdmi-stereo.monitor",
                "monitor:alsa_output.analog-stereo.monitor",
                "native:pipewire",
                "native:Loopback Aggregate",
                "native:USB Mic",
                "native:hw:CARD=PCH,DEV=0",
                "native:hw:CARD=PCH,DEV=0#2",
            ]
        );
        assert_eq!(registry.current_index(), 0);
        assert_eq!(registry.current().unwrap().name, "HDMI Audio Monitor");
    }

    #[test]
    fn ranking_is_deterministic() {
        let (sinks, sources, natives) = snapshot();
        let a = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        let b = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        assert_eq!(a.devices(), b.devices());
    }

    #[test]
    fn ids_are_unique() {
        let (sinks, mut sources, natives) = snapshot();
        sources.push(sources[0].clone());
        let registry = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        let mut ids: Vec<&str> = registry.devices().iter().map(|d| d.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn duplicate_native_names_get_occurrence() {
        let (sinks, sources, natives) = snapshot();
        let registry = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        let second = registry
            .devices()
            .iter()
            .find(|d| d.id.ends_with("#2"))
            .unwrap();
        assert_eq!(second.kind, DeviceKind::Native { occurrence: 1 });
    }

    #[test]
    fn fallback_order_without_monitors() {
        let natives = vec![
            native("Webcam", 1, false),
            native("Built-in Mic", 2, true),
            native("Aggregate", 32, false),
        ];
        let registry = DeviceRegistry::from_snapshot(&[], &[], &natives);
        let names: Vec<&str> = registry.devices().iter().map(|d| d.native_name.as_str()).collect();
        assert_eq!(names, vec!["Aggregate", "Built-in Mic", "Webcam"]);
    }

    #[test]
    fn cycling_wraps() {
        let natives = vec![native("a", 1, false), native("b", 1, false), native("c", 1, false)];
        let mut registry = DeviceRegistry::from_snapshot(&[], &[], &natives);
        assert_eq!(registry.next_index(), Some(1));
        assert!(registry.select(2));
        assert_eq!(registry.next_index(), Some(0));
        assert!(!registry.select(3));
        assert_eq!(DeviceRegistry::default().next_index(), None);
    }

    #[test]
    fn find_by_index_or_name() {
        let (sinks, sources, natives) = snapshot();
        let registry = DeviceRegistry::from_snapshot(&sinks, &sources, &natives);
        assert_eq!(registry.find("2"), Some(2));
        assert_eq!(registry.find("99"), None);
        assert_eq!(registry.find("usb"), Some(4));
        assert_eq!(registry.find("hdmi"), Some(0));
    }

    #[test]
    fn discover_survives_routing_failure() {
        let backend = MockBackend::with_devices(&["Mic A", "Mic B"]);
        let router = MockRouter::broken();
        let registry = DeviceRegistry::discover(&router, &backend);
        assert_eq!(registry.len(), 2);
        assert!(registry.devices().iter().all(|d| !d.is_monitor()));
    }
}
