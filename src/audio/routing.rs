//! OS audio-routing side channel.
//!
//! The native capture API can only open "the default input", so monitor
//! sources are selected by changing the sound server's default source first.
//! Everything here is best effort: failures are logged and capture carries on
//! with whatever default the native subsystem reports.

use crate::error::RoutingError;
use std::process::Command;

/// Activity state of an output sink as reported by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Idle,
    Suspended,
    Unknown,
}

impl SinkState {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "RUNNING" => SinkState::Running,
            "IDLE" => SinkState::Idle,
            "SUSPENDED" => SinkState::Suspended,
            _ => SinkState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkInfo {
    pub name: String,
    pub state: SinkState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
}

impl SourceInfo {
    /// Sink this source mirrors, if it is a monitor.
    pub fn monitor_of(&self) -> Option<&str> {
        self.name.strip_suffix(".monitor")
    }
}

/// Routing operations the engine needs. Mocked in tests.
pub trait AudioRouter: Send {
    fn list_sinks(&self) -> Result<Vec<SinkInfo>, RoutingError>;

    fn list_sources(&self) -> Result<Vec<SourceInfo>, RoutingError>;

    fn default_source(&self) -> Result<Option<String>, RoutingError>;

    fn set_default_source(&self, name: &str) -> Result<(), RoutingError>;

    /// Re-target this process's existing capture streams. Returns how many moved.
    fn move_source_outputs(&self, name: &str) -> Result<usize, RoutingError>;
}

/// Router used when routing is disabled or unavailable.
pub struct NullRouter;

impl AudioRouter for NullRouter {
    fn list_sinks(&self) -> Result<Vec<SinkInfo>, RoutingError> {
        Err(RoutingError::Disabled)
    }

    fn list_sources(&self) -> Result<Vec<SourceInfo>, RoutingError> {
        Err(RoutingError::Disabled)
    }

    fn default_source(&self) -> Result<Option<String>, RoutingError> {
        Err(RoutingError::Disabled)
    }

    fn set_default_source(&self, _name: &str) -> Result<(), RoutingError> {
        Err(RoutingError::Disabled)
    }

    fn move_source_outputs(&self, _name: &str) -> Result<usize, RoutingError> {
        Err(RoutingError::Disabled)
    }
}

/// PulseAudio / PipeWire (pipewire-pulse) routing through `pactl`.
pub struct PactlRouter;

impl PactlRouter {
    fn run(&self, args: &[&str]) -> Result<String, RoutingError> {
        let output = Command::new("pactl")
            .args(args)
            .output()
            .map_err(|source| RoutingError::ToolMissing { tool: "pactl", source })?;

        if !output.status.success() {
            return Err(RoutingError::CommandFailed {
                command: format!("pactl {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl AudioRouter for PactlRouter {
    fn list_sinks(&self) -> Result<Vec<SinkInfo>, RoutingError> {
        Ok(parse_sinks(&self.run(&["list", "sinks", "short"])?))
    }

    fn list_sources(&self) -> Result<Vec<SourceInfo>, RoutingError> {
        Ok(parse_sources(&self.run(&["list", "sources", "short"])?))
    }

    fn default_source(&self) -> Result<Option<String>, RoutingError> {
        let name = self.run(&["get-default-source"])?.trim().to_string();
        Ok(Some(name).filter(|n| is_valid_source_name(n)))
    }

    fn set_default_source(&self, name: &str) -> Result<(), RoutingError> {
        if !is_valid_source_name(name) {
            return Err(RoutingError::InvalidName(name.to_string()));
        }
        self.run(&["set-default-source", name])?;
        Ok(())
    }

    fn move_source_outputs(&self, name: &str) -> Result<usize, RoutingError> {
        if !is_valid_source_name(name) {
            return Err(RoutingError::InvalidName(name.to_string()));
        }
        let listing = self.run(&["list", "source-outputs"])?;
        let ours = source_outputs_for_pid(&listing, std::process::id());
        for index in &ours {
            self.run(&["move-source-output", &index.to_string(), name])?;
        }
        Ok(ours.len())
    }
}

/// Source names are passed to a subprocess; allow only the characters sound
/// servers actually use (e.g. `alsa_output.pci-0000_03_00.1.hdmi-stereo.monitor`).
pub fn is_valid_source_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '@'))
}

/// Parse `pactl list sinks short`: `index name driver sample-spec state`.
pub fn parse_sinks(listing: &str) -> Vec<SinkInfo> {
    listing
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let name = fields.get(1)?.trim();
            if name.is_empty() {
                return None;
            }
            let state = fields.last().map(|s| SinkState::parse(s)).unwrap_or(SinkState::Unknown);
            Some(SinkInfo { name: name.to_string(), state })
        })
        .collect()
}

/// Parse `pactl list sources short`: `index name driver sample-spec state`.
pub fn parse_sources(listing: &str) -> Vec<SourceInfo> {
    listing
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let name = fields.get(1)?.trim();
            if name.is_empty() {
                return None;
            }
            let (channels, sample_rate) = fields
                .get(3)
                .map(|spec| parse_sample_spec(spec))
                .unwrap_or((2, 48_000));
            Some(SourceInfo { name: name.to_string(), channels, sample_rate })
        })
        .collect()
}

/// `s16le 2ch 44100Hz` -> `(2, 44100)`, defaulting to stereo 48 kHz.
pub fn parse_sample_spec(spec: &str) -> (u16, u32) {
    let mut channels = 2;
    let mut rate = 48_000;
    for token in spec.split_whitespace() {
        if let Some(n) = token.strip_suffix("ch").and_then(|n| n.parse().ok()) {
            channels = n;
        } else if let Some(n) = token.strip_suffix("Hz").and_then(|n| n.parse().ok()) {
            rate = n;
        }
    }
    (channels, rate)
}

/// Indices of `Source Output #N` blocks owned by `pid` in `pactl list source-outputs`.
pub fn source_outputs_for_pid(listing: &str, pid: u32) -> Vec<u32> {
    let wanted = format!("application.process.id = \"{}\"", pid);
    let mut found = Vec::new();
    let mut current: Option<u32> = None;

    for line in listing.lines() {
        let line = line.trim();
        if let Some(index) = line.strip_prefix("Source Output #") {
            current = index.trim().parse().ok();
        } else if line == wanted {
            if let Some(index) = current.take() {
                found.push(index);
            }
        }
    }
    found
}
