//! Parametric curves: roses, Lissajous figures and epicycloids.

use super::{hsv_to_rgb, plot, PatternRenderer, Stepper, CELL_ASPECT};
use crate::render::Surface;
use std::f64::consts::TAU;

const NEAR: [char; 8] = ['◆', '◇', '◈', '○', '●', '□', '■', '△'];
const FAR: [char; 5] = ['⋅', '·', '˙', '∘', '◦'];

/// Petal counts cycled by the rose layer.
const ROSE_K: [f64; 4] = [3.0, 5.0, 4.0, 7.0];

pub struct Geometry {
    stepper: Stepper,
    phase: f64,
}

impl Geometry {
    pub fn new() -> Self {
        Self {
            stepper: Stepper::default(),
            phase: 0.0,
        }
    }

    /// Sample `curve` over one turn and plot it around the centre.
    #[allow(clippy::too_many_arguments)]
    fn trace<F>(surface: &mut dyn Surface, cx: f64, cy: f64, radius: f64, samples: usize, glyphs: &[char], hue: f32, value: f32, curve: F)
    where
        F: Fn(f64) -> (f64, f64),
    {
        for i in 0..samples {
            let t = i as f64 / samples as f64 * TAU;
            let (x, y) = curve(t);
            let color = hsv_to_rgb((hue + i as f32 / samples as f32 * 0.2).rem_euclid(1.0), 0.7, value);
            let glyph = glyphs[i % glyphs.len()];
            plot(surface, cx + x * radius * CELL_ASPECT, cy + y * radius, glyph, color, false);
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRenderer for Geometry {
    fn name(&self) -> &str {
        "Geometry"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;
        self.phase += dt * (0.4 + peak * 1.6);
        if width == 0 || height == 0 {
            return;
        }

        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let max_radius = (width as f64 / CELL_ASPECT).min(height as f64) / 2.0 * 0.95;
        let phase = self.phase;
        let value = (0.35 + peak * 0.65) as f32;
        let samples = ((max_radius * 24.0) as usize).clamp(32, 1200);

        // Rose: r = cos(k * t), petals swell with loudness.
        let k = ROSE_K[(phase / 8.0) as usize % ROSE_K.len()];
        let rose_radius = max_radius * (0.5 + 0.5 * peak);
        Self::trace(surface, cx, cy, rose_radius, samples, &NEAR, 0.85, value, |t| {
            let r = (k * t + phase * 0.5).cos();
            ((t + phase * 0.2).cos() * r, (t + phase * 0.2).sin() * r)
        });

        // Lissajous: ratio drifts slowly, phase shift follows time.
        let (a, b) = (3.0, 2.0 + (phase * 0.05).sin().abs());
        Self::trace(surface, cx, cy, max_radius * 0.8, samples, &FAR, 0.5, value * 0.8, |t| {
            ((a * t + phase).sin(), (b * t).sin())
        });

        // Epicycloid appears once there is something to listen to.
        if peak > 0.2 {
            let cusps = 3.0 + (peak * 4.0).floor();
            let scale = 1.0 / (cusps + 2.0);
            Self::trace(surface, cx, cy, max_radius * peak, samples, &NEAR, 0.1, value, |t| {
                let t = t + phase * 0.3;
                (
                    ((cusps + 1.0) * t.cos() - ((cusps + 1.0) * t).cos()) * scale,
                    ((cusps + 1.0) * t.sin() - ((cusps + 1.0) * t).sin()) * scale,
                )
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::testing::exercise;
    use crate::terminal::Canvas;

    #[test]
    fn survives_resize_and_silence() {
        let mut geometry = Geometry::new();
        assert!(exercise(&mut geometry) > 0);
    }

    #[test]
    fn epicycloid_only_when_loud() {
        let mut quiet = Canvas::new(80, 24);
        let mut loud = Canvas::new(80, 24);
        Geometry::new().render(&mut quiet, 80, 24, 0.0, 0.1);
        Geometry::new().render(&mut loud, 80, 24, 0.0, 0.9);
        assert!(loud.ink() > quiet.ink());
    }
}
