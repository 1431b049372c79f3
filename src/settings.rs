use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of `~/.config/milkshaker/config.toml`. Every key is optional;
/// command-line flags win over anything set here.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    pub sensitivity: Option<f32>,
    pub decay: Option<f32>,
    pub settle_ms: Option<u64>,
    pub restart_delay_ms: Option<u64>,
    /// Set to false to never touch the sound server's default source.
    pub routing: Option<bool>,
    pub preferred_device: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySettings {
    pub fps: Option<u32>,
    pub pattern: Option<String>,
    pub shuffle: Option<bool>,
    pub shuffle_secs: Option<u64>,
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Missing file gives defaults; an unreadable or malformed one is logged
    /// and also gives defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                log::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("milkshaker")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_sections() {
        let settings = Settings::parse(
            r#"
            [audio]
            sensitivity = 1.6
            decay = 0.9
            routing = false
            preferred_device = "HDMI"

            [display]
            fps = 30
            pattern = "Wave"
            shuffle = true
            shuffle_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(settings.audio.sensitivity, Some(1.6));
        assert_eq!(settings.audio.routing, Some(false));
        assert_eq!(settings.audio.preferred_device.as_deref(), Some("HDMI"));
        assert_eq!(settings.audio.settle_ms, None);
        assert_eq!(settings.display.fps, Some(30));
        assert_eq!(settings.display.pattern.as_deref(), Some("Wave"));
        assert_eq!(settings.display.shuffle_secs, Some(10));
    }

    #[test]
    fn empty_and_partial_files_use_defaults() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
        let partial = Settings::parse("[display]\nfps = 24\n").unwrap();
        assert_eq!(partial.audio, AudioSettings::default());
        assert_eq!(partial.display.fps, Some(24));
    }

    #[test]
    fn malformed_file_falls_back() {
        assert!(Settings::parse("[audio]\nsensitivity = \"loud\"\n").is_err());

        let path = std::env::temp_dir().join(format!("milkshaker-settings-{}.toml", std::process::id()));
        fs::write(&path, "not = [valid").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        let _ = fs::remove_file(&path);

        assert_eq!(Settings::load_from(Path::new("/nonexistent/milkshaker.toml")), Settings::default());
    }
}
