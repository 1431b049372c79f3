//! Counter-rotating organic flow arms layered by depth.

use super::{hsv_to_rgb, plot, PatternRenderer, Stepper, CELL_ASPECT};
use crate::render::Surface;
use std::f64::consts::PI;

const NEAR: [char; 7] = ['◦', '○', '⋅', '∘', '·', '˙', '∙'];
const MID: [char; 5] = ['⋅', '∘', '◦', '·', '˙'];
const FAR: [char; 3] = ['⋅', '·', '˙'];

pub struct Spiral {
    stepper: Stepper,
    /// Accumulated rotation; advances faster when it's loud.
    phase: f64,
}

impl Spiral {
    pub fn new() -> Self {
        Self {
            stepper: Stepper::default(),
            phase: 0.0,
        }
    }

    fn glyphs(layer: usize) -> &'static [char] {
        match layer {
            0 | 1 => &NEAR,
            2 | 3 => &MID,
            _ => &FAR,
        }
    }
}

impl Default for Spiral {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRenderer for Spiral {
    fn name(&self) -> &str {
        "Spiral"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;
        self.phase += dt * (0.6 + peak * 2.0);
        if width == 0 || height == 0 {
            return;
        }

        let golden_angle = PI * (3.0 - 5f64.sqrt());
        let golden_ratio = (1.0 + 5f64.sqrt()) / 2.0;
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let max_radius = (width as f64 / CELL_ASPECT).hypot(height as f64) / 1.8;

        let layers = (3 + (peak * 2.0) as usize).min(5);
        for layer in (0..layers).rev() {
            let depth = if layers > 1 { layer as f64 / (layers - 1) as f64 } else { 0.0 };
            let scale = 0.5 + depth * 0.7;
            let radius_limit = max_radius * scale;
            let phase = self.phase * (0.4 + depth * 0.5);
            let glyphs = Self::glyphs(layer);
            let arms = (3 + (peak * 2.0) as usize).min(5);

            for arm in 0..arms {
                let personality = arm as f64 * golden_ratio + layer as f64 * 1.3;
                let direction = if arm % 2 == 0 { 1.0 } else { -1.0 };
                let base_angle = personality * golden_angle * 1.7 + phase * (0.15 + arm as f64 * 0.05) * direction;
                let amplitude = (0.2 + peak * 0.6) * scale;
                let steps = (radius_limit / (2.5 + layer as f64 * 0.5)).max(1.0) as usize;
                let min_radius = radius_limit * 0.15;

                for step in 0..steps {
                    let t = step as f64 / steps as f64;
                    let r = min_radius + t * (radius_limit - min_radius) * (0.9 + peak * 0.3);
                    let bend = amplitude * ((r * 0.12 + phase * 1.2 + personality).sin()
                        + 0.6 * (r * 0.2 + phase * 0.9).cos());
                    let angle = base_angle + t * 2.5 * direction + bend;
                    let x = cx + angle.cos() * r * CELL_ASPECT;
                    let y = cy + angle.sin() * r;

                    let fade = (1.0 - t) * (0.35 + 0.65 * peak) * (1.0 - depth * 0.5);
                    let hue = (0.55 + arm as f32 * 0.08 + t as f32 * 0.2 + self.phase as f32 * 0.02).rem_euclid(1.0);
                    let color = hsv_to_rgb(hue, 0.7, (0.25 + fade * 0.75) as f32);
                    let glyph = glyphs[(step + arm) % glyphs.len()];
                    plot(surface, x, y, glyph, color, false);
                }
            }
        }
    }
}
