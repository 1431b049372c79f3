//! Audio-reactive patterns.
//!
//! A pattern is a function of elapsed time and loudness drawn into a
//! [`Surface`]. Patterns keep their animation state (particle pools, phase
//! accumulators) as fields, so every instance is independent.

pub mod field;
pub mod fibonacci;
pub mod geometry;
pub mod logo;
pub mod manager;
pub mod spiral;
pub mod starburst;
pub mod wave;

pub use manager::PatternManager;

use crate::render::Surface;
use crate::terminal::rgb;
use crossterm::style::Color;

/// Terminal cells are roughly twice as tall as they are wide.
pub const CELL_ASPECT: f64 = 2.0;

/// Largest time step fed to particle physics; longer gaps are treated as this.
const MAX_STEP: f64 = 0.1;

pub trait PatternRenderer {
    fn name(&self) -> &str;

    /// Draw one frame.
    ///
    /// `width`/`height` may change between calls and may be zero. `loudness`
    /// is in `[0, 1]` and may stay at zero indefinitely.
    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32);
}

/// Build a pattern by (case-insensitive) name.
pub fn create(name: &str, seed: u64) -> Option<Box<dyn PatternRenderer>> {
    let pattern: Box<dyn PatternRenderer> = match name.to_lowercase().as_str() {
        "logo" | "milkshaker" => Box::new(logo::Logo::new(seed)),
        "starburst" => Box::new(starburst::Starburst::new(seed)),
        "spiral" => Box::new(spiral::Spiral::new()),
        "fibonacci" => Box::new(fibonacci::Fibonacci::new()),
        "wave" => Box::new(wave::Wave::new(seed)),
        "field" => Box::new(field::Field::new()),
        "geometry" => Box::new(geometry::Geometry::new()),
        _ => return None,
    };
    Some(pattern)
}

/// Write a glyph at a floating-point position. Non-finite or off-screen
/// coordinates are dropped.
pub fn plot(surface: &mut dyn Surface, x: f64, y: f64, ch: char, color: Color, bold: bool) {
    if !x.is_finite() || !y.is_finite() {
        return;
    }
    let (xi, yi) = (x.round(), y.round());
    if xi < 0.0 || yi < 0.0 || xi > i32::MAX as f64 || yi > i32::MAX as f64 {
        return;
    }
    surface.set(xi as i32, yi as i32, ch, Some(color), bold);
}

/// HSV to RGB; `h` wraps, `s` and `v` are clamped to `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Color {
    let h = if h.is_finite() { h.rem_euclid(1.0) * 6.0 } else { 0.0 };
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let sector = (h.floor() as i32).rem_euclid(6);
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    rgb((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

/// Pick a glyph from `ramp` by intensity in `[0, 1]`.
pub fn ramp_char(ramp: &[char], intensity: f64) -> char {
    if ramp.is_empty() {
        return ' ';
    }
    let i = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
    ramp[((i * (ramp.len() - 1) as f64).round() as usize).min(ramp.len() - 1)]
}

/// Turns absolute elapsed time into bounded per-frame steps.
#[derive(Debug, Default, Clone)]
pub struct Stepper {
    last: Option<f64>,
}

impl Stepper {
    pub fn step(&mut self, elapsed: f64) -> f64 {
        let dt = match self.last {
            Some(last) if elapsed.is_finite() => (elapsed - last).clamp(0.0, MAX_STEP),
            _ => 0.0,
        };
        if elapsed.is_finite() {
            self.last = Some(elapsed);
        }
        dt
    }
}
