//! Interactive visualizer: terminal, engine, input thread and render loop.

use crate::audio::AudioEngine;
use crate::config::DisplayConfig;
use crate::error::AppError;
use crate::help::{key_hint, render_help_overlay, HELP};
use crate::input::{InputActor, UiEvent};
use crate::patterns::manager::DEFAULT_SEED;
use crate::patterns::PatternManager;
use crate::render::{Flow, FrameInfo, RenderLoop, Surface, SystemClock};
use crate::terminal::Terminal;
use crossterm::style::Color;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

/// How long a notice stays on screen, in seconds of render time.
const NOTICE_SECS: f64 = 5.0;

/// Transient UI state owned by the render thread.
#[derive(Debug, Default)]
pub struct Overlay {
    show_help: bool,
    notice: Option<(String, f64)>,
}

impl Overlay {
    pub fn notify(&mut self, text: impl Into<String>, now: f64) {
        self.notice = Some((text.into(), now + NOTICE_SECS));
    }

    pub fn notice(&self, now: f64) -> Option<&str> {
        match &self.notice {
            Some((text, until)) if now < *until => Some(text),
            _ => None,
        }
    }

    pub fn help_visible(&self) -> bool {
        self.show_help
    }

    /// Apply one event from the input thread.
    pub fn apply(&mut self, event: UiEvent, patterns: &mut PatternManager, now: f64) -> Flow {
        match event {
            UiEvent::NextPattern => {
                patterns.next_scene();
                self.notify(scene_notice(patterns), now);
            }
            UiEvent::RandomPattern => {
                patterns.select_random();
                self.notify(scene_notice(patterns), now);
            }
            UiEvent::ToggleShuffle => {
                let on = patterns.toggle_shuffle();
                self.notify(if on { "Shuffle on" } else { "Shuffle off" }, now);
            }
            UiEvent::ToggleLayer(index) => {
                if patterns.toggle_layer(index) {
                    if let Some((name, on)) = patterns.current().and_then(|s| s.layers().get(index).copied()) {
                        self.notify(format!("Layer {}: {}", name, if on { "on" } else { "off" }), now);
                    }
                }
            }
            UiEvent::ToggleHelp => self.show_help = !self.show_help,
            UiEvent::Notice(text) => self.notify(text, now),
            UiEvent::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Drain everything queued since the last frame.
    pub fn drain(&mut self, events: &Receiver<UiEvent>, patterns: &mut PatternManager, now: f64) -> Flow {
        for event in events.try_iter() {
            if self.apply(event, patterns, now) == Flow::Quit {
                return Flow::Quit;
            }
        }
        Flow::Continue
    }
}

fn scene_notice(patterns: &PatternManager) -> String {
    format!(
        "Pattern: {} ({}/{})",
        patterns.scene_name(),
        patterns.current_index() + 1,
        patterns.scene_count()
    )
}

/// Values shown in the status lines.
pub struct StatusView<'a> {
    pub status: &'a str,
    pub loudness_percent: f32,
    pub sensitivity: f32,
    pub device: &'a str,
    pub pattern: &'a str,
    pub shuffle: bool,
    pub capturing: bool,
}

impl StatusView<'_> {
    pub fn headline(&self) -> String {
        if self.shuffle {
            format!("{} | Shuffle", self.status)
        } else {
            self.status.to_string()
        }
    }

    pub fn detail(&self) -> String {
        format!(
            "Peak: {:.0}% | Sensitivity: {:.1}x | Device: {} | Pattern: {}",
            self.loudness_percent, self.sensitivity, self.device, self.pattern
        )
    }
}

pub fn draw_overlay(surface: &mut dyn Surface, view: &StatusView, overlay: &Overlay, info: &FrameInfo) {
    let (width, height) = (info.width, info.height);
    if width == 0 || height == 0 {
        return;
    }
    let status_color = if view.capturing { Color::Green } else { Color::Yellow };
    surface.set_str(1, 0, &view.headline(), Some(status_color), true);
    surface.set_str(1, 1, &view.detail(), Some(Color::Grey), false);

    let bottom = i32::from(height) - 1;
    if let Some(text) = overlay.notice(info.elapsed) {
        surface.set_str(1, bottom - 1, text, Some(Color::Cyan), true);
    }
    surface.set_str(1, bottom, key_hint(view.capturing), Some(Color::DarkGrey), false);

    if overlay.help_visible() {
        render_help_overlay(surface, width, height, HELP);
    }
}

fn build_patterns(display: &DisplayConfig) -> PatternManager {
    let mut patterns = PatternManager::standard(display.seed.unwrap_or(DEFAULT_SEED));
    if let Some(name) = display.pattern.as_deref() {
        if !patterns.select_by_name(name) {
            log::warn!(
                "unknown pattern {:?} (available: {}), starting with {}",
                name,
                patterns.scene_names().join(", "),
                patterns.scene_name()
            );
        }
    }
    patterns.set_shuffle_every(display.shuffle_every);
    patterns.set_shuffle(display.shuffle);
    patterns
}

/// Run the visualizer until the user quits.
///
/// Device discovery happens before the terminal switches to the alternate
/// screen, so a machine with no inputs gets a readable error. A capture
/// start failure is not fatal: the user can pick another device with `d`.
pub fn run(engine: Arc<AudioEngine>, display: &DisplayConfig) -> Result<(), AppError> {
    engine.initialize()?;

    let mut overlay = Overlay::default();
    if let Err(e) = engine.start() {
        log::warn!("initial capture start failed: {}", e);
        overlay.notify(format!("Start failed: {}", e), 0.0);
    }

    let mut patterns = build_patterns(display);
    let mut render = RenderLoop::new(display.fps)?;
    let mut term = Terminal::new(true)?;

    let (tx, rx) = mpsc::channel();
    let input = InputActor::spawn(Arc::clone(&engine), tx)?;
    let mut clock = SystemClock::new();

    let result = render.run(
        &mut term,
        engine.as_ref(),
        &mut patterns,
        &mut clock,
        |term, patterns, info| {
            let flow = overlay.drain(&rx, patterns, info.elapsed);
            let status = engine.status_text();
            let device = engine.current_device_name();
            let view = StatusView {
                status: &status,
                loudness_percent: info.loudness * 100.0,
                sensitivity: engine.sensitivity(),
                device: &device,
                pattern: patterns.scene_name(),
                shuffle: patterns.shuffle_enabled(),
                capturing: engine.is_capturing(),
            };
            draw_overlay(term, &view, &overlay, info);
            flow
        },
    );

    log::info!(
        "render loop ended after {} frames ({} skipped)",
        render.frames_rendered(),
        render.frames_skipped()
    );
    input.shutdown();
    drop(term);
    engine.cleanup();
    result.map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Canvas;

    fn info(width: u16, height: u16, elapsed: f64) -> FrameInfo {
        FrameInfo {
            index: 0,
            elapsed,
            loudness: 0.5,
            width,
            height,
        }
    }

    fn view<'a>(capturing: bool) -> StatusView<'a> {
        StatusView {
            status: "Live - System Audio",
            loudness_percent: 42.0,
            sensitivity: 1.2,
            device: "desk Monitor",
            pattern: "Wave",
            shuffle: false,
            capturing,
        }
    }

    #[test]
    fn detail_line_format() {
        assert_eq!(
            view(true).detail(),
            "Peak: 42% | Sensitivity: 1.2x | Device: desk Monitor | Pattern: Wave"
        );
        let mut shuffled = view(true);
        shuffled.shuffle = true;
        assert_eq!(shuffled.headline(), "Live - System Audio | Shuffle");
    }

    #[test]
    fn notices_expire() {
        let mut overlay = Overlay::default();
        overlay.notify("Capture stopped", 10.0);
        assert_eq!(overlay.notice(12.0), Some("Capture stopped"));
        assert_eq!(overlay.notice(15.0), None);
    }

    #[test]
    fn events_drive_patterns_and_help() {
        let mut patterns = PatternManager::standard(DEFAULT_SEED);
        let mut overlay = Overlay::default();
        let first = patterns.current_index();

        assert_eq!(overlay.apply(UiEvent::NextPattern, &mut patterns, 0.0), Flow::Continue);
        assert_ne!(patterns.current_index(), first);
        assert_eq!(overlay.notice(0.0), Some("Pattern: Starburst (2/8)"));

        overlay.apply(UiEvent::ToggleHelp, &mut patterns, 0.0);
        assert!(overlay.help_visible());
        overlay.apply(UiEvent::ToggleShuffle, &mut patterns, 0.0);
        assert!(patterns.shuffle_enabled());
        assert_eq!(overlay.notice(0.0), Some("Shuffle on"));
        assert_eq!(overlay.apply(UiEvent::Quit, &mut patterns, 0.0), Flow::Quit);
    }

    #[test]
    fn layer_toggles_report_state() {
        let mut patterns = PatternManager::standard(DEFAULT_SEED);
        let mut overlay = Overlay::default();
        assert!(patterns.select_by_name("MixMax"));

        overlay.apply(UiEvent::ToggleLayer(1), &mut patterns, 0.0);
        assert_eq!(overlay.notice(0.0), Some("Layer Fibonacci: off"));
        overlay.apply(UiEvent::ToggleLayer(1), &mut patterns, 0.0);
        assert_eq!(overlay.notice(0.0), Some("Layer Fibonacci: on"));

        // Single-layer scenes keep their only layer.
        let mut overlay = Overlay::default();
        patterns.select_by_name("Wave");
        overlay.apply(UiEvent::ToggleLayer(0), &mut patterns, 0.0);
        overlay.apply(UiEvent::ToggleLayer(5), &mut patterns, 0.0);
        assert_eq!(overlay.notice(0.0), None);
    }

    #[test]
    fn drain_stops_at_quit() {
        let mut patterns = PatternManager::standard(DEFAULT_SEED);
        let mut overlay = Overlay::default();
        let (tx, rx) = mpsc::channel();
        tx.send(UiEvent::Notice("hello".into())).unwrap();
        tx.send(UiEvent::Quit).unwrap();
        tx.send(UiEvent::ToggleHelp).unwrap();

        assert_eq!(overlay.drain(&rx, &mut patterns, 1.0), Flow::Quit);
        assert_eq!(overlay.notice(1.0), Some("hello"));
        assert!(!overlay.help_visible());
    }

    #[test]
    fn overlay_draws_status_hint_and_notice() {
        let mut canvas = Canvas::new(100, 20);
        let mut overlay = Overlay::default();
        overlay.notify("Device: desk Monitor", 0.0);
        draw_overlay(&mut canvas, &view(false), &overlay, &info(100, 20, 1.0));

        assert!(canvas.row_text(0).contains("Live - System Audio"));
        assert!(canvas.row_text(1).contains("Peak: 42%"));
        assert!(canvas.row_text(18).contains("Device: desk Monitor"));
        assert!(canvas.row_text(19).contains("s:start"));
    }

    #[test]
    fn overlay_survives_tiny_screens() {
        let mut canvas = Canvas::new(3, 1);
        let mut overlay = Overlay::default();
        overlay.apply(UiEvent::ToggleHelp, &mut PatternManager::standard(1), 0.0);
        draw_overlay(&mut canvas, &view(true), &overlay, &info(3, 1, 0.0));
        draw_overlay(&mut Canvas::new(0, 0), &view(true), &overlay, &info(0, 0, 0.0));
    }

    #[test]
    fn configured_pattern_and_shuffle_apply() {
        let mut display = DisplayConfig::new(30).unwrap();
        display.pattern = Some("wave".into());
        display.shuffle = true;
        let patterns = build_patterns(&display);
        assert_eq!(patterns.scene_name(), "Wave");
        assert!(patterns.shuffle_enabled());

        display.pattern = Some("nope".into());
        display.shuffle = false;
        let patterns = build_patterns(&display);
        assert!(!patterns.shuffle_enabled());
    }
}
