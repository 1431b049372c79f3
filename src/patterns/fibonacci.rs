//! Golden-angle phyllotaxis that blooms with loudness.

use super::{hsv_to_rgb, plot, ramp_char, PatternRenderer, Stepper, CELL_ASPECT};
use crate::render::Surface;
use std::f64::consts::PI;

const GLYPHS: [char; 6] = ['·', '∙', '•', '◦', '○', '◉'];
const DEPTH: usize = 3;
const MIN_SEEDS: usize = 40;
const MAX_SEEDS: usize = 420;

pub struct Fibonacci {
    stepper: Stepper,
    angle: f64,
    /// Seed count eases toward its loudness target instead of jumping.
    bloom: f64,
}

impl Fibonacci {
    pub fn new() -> Self {
        Self {
            stepper: Stepper::default(),
            angle: 0.0,
            bloom: MIN_SEEDS as f64,
        }
    }
}

impl Default for Fibonacci {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRenderer for Fibonacci {
    fn name(&self) -> &str {
        "Fibonacci"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;

        self.angle = (self.angle + dt * (0.3 + peak * 2.0)) % (2.0 * PI);
        let target = MIN_SEEDS as f64 + peak * (MAX_SEEDS - MIN_SEEDS) as f64;
        self.bloom += (target - self.bloom) * (dt * 6.0).min(1.0);

        if width == 0 || height == 0 {
            return;
        }

        let golden_angle = PI * (3.0 - 5f64.sqrt());
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let max_radius = (width as f64 / CELL_ASPECT).min(height as f64) / 2.0;
        let seeds = (self.bloom as usize).clamp(1, MAX_SEEDS);
        let spacing = max_radius / (MAX_SEEDS as f64).sqrt();

        for depth in 0..DEPTH {
            let direction = if depth % 2 == 0 { 1.0 } else { -1.0 };
            let shrink = 1.0 - depth as f64 * 0.2;
            for n in 0..seeds {
                let r = spacing * (n as f64).sqrt() * shrink * (1.0 + peak * 0.5);
                let theta = n as f64 * golden_angle + self.angle * direction + depth as f64 * 0.2;
                let x = cx + theta.cos() * r * CELL_ASPECT;
                let y = cy + theta.sin() * r;

                let t = n as f64 / seeds as f64;
                let intensity = (1.0 - t * 0.7) * (0.3 + 0.7 * peak) * shrink;
                let hue = (t as f32 * 0.3 + depth as f32 * 0.15 + self.angle as f32 / 6.0).rem_euclid(1.0);
                let color = hsv_to_rgb(hue, 0.75, (0.3 + 0.7 * intensity) as f32);
                plot(surface, x, y, ramp_char(&GLYPHS, intensity), color, intensity > 0.8);
            }
        }
    }
}
