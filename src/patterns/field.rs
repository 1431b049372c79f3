//! Sparse depth-layered noise field. Mostly background texture for other scenes.

use super::{hsv_to_rgb, ramp_char, PatternRenderer, Stepper};
use crate::render::Surface;

const GLYPHS: [char; 8] = ['⋅', '·', '˙', '∘', '◦', '⁚', '⁛', '⁝'];

pub struct Field {
    stepper: Stepper,
    phase: f64,
}

impl Field {
    pub fn new() -> Self {
        Self {
            stepper: Stepper::default(),
            phase: 0.0,
        }
    }

    /// Three octaves of separable sine noise, roughly in `[-1.75, 1.75]`.
    fn noise(x: f64, y: f64, phase: f64) -> f64 {
        (x + phase * 0.8).sin() * (y + phase * 0.6).cos()
            + 0.5 * (x * 2.0 + phase * 1.2).sin() * (y * 2.0 + phase * 0.9).cos()
            + 0.25 * (x * 4.0 + phase * 1.5).sin() * (y * 4.0 + phase * 1.1).cos()
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRenderer for Field {
    fn name(&self) -> &str {
        "Field"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;
        self.phase += dt * (0.5 + peak);
        if width == 0 || height == 0 {
            return;
        }

        let golden_ratio = (1.0 + 5f64.sqrt()) / 2.0;
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let max_distance = cx.hypot(cy).max(1.0);
        // Even silence leaves a faint texture.
        let energy = 0.25 + peak * 0.75;

        let layers = (3 + (peak * 2.0) as usize).min(5);
        for layer in 0..layers {
            let depth = layer as f64 / layers as f64;
            let phase = self.phase * (0.2 + depth * 0.3);
            let spacing_x = (6.0 + depth * 8.0) as usize;
            let spacing_y = (spacing_x / 2).max(1);
            let offset = layer * 2;

            for y in (offset % spacing_y..height as usize).step_by(spacing_y) {
                for x in (offset % spacing_x..width as usize).step_by(spacing_x) {
                    let (fx, fy) = (x as f64 * 0.05, y as f64 * 0.1);
                    let center = 1.0 - (x as f64 - cx).hypot((y as f64 - cy) * 2.0) / (max_distance * 2.0);
                    let golden = ((fx + fy) * golden_ratio + phase).sin() * 0.3;
                    let strength = (Self::noise(fx, fy, phase) + golden) * center.max(0.0) * (1.0 - depth * 0.3) * energy;

                    if strength.abs() <= 0.1 + depth * 0.1 {
                        continue;
                    }
                    let intensity = (strength.abs() / 1.5).min(1.0);
                    let hue = (0.6 + strength as f32 * 0.1 + depth as f32 * 0.1).rem_euclid(1.0);
                    let color = hsv_to_rgb(hue, 0.4, (0.2 + intensity * 0.5) as f32);
                    surface.set(x as i32, y as i32, ramp_char(&GLYPHS, intensity), Some(color), false);
                }
            }
        }
    }
}
