//! Layered liquid sine bands with ripples dropped on strong peaks.

use super::{hsv_to_rgb, plot, PatternRenderer, Stepper, CELL_ASPECT};
use crate::render::Surface;
use rand::prelude::*;
use std::collections::VecDeque;
use std::f64::consts::TAU;

const BANDS: usize = 4;
const MAX_RIPPLES: usize = 4;
const HISTORY: usize = 9;
const BAND_GLYPHS: [char; 4] = ['~', '∼', '≈', '-'];

struct Ripple {
    x: f64,
    y: f64,
    radius: f64,
    life: f64,
    max_life: f64,
    hue: f32,
}

pub struct Wave {
    rng: StdRng,
    stepper: Stepper,
    ripples: Vec<Ripple>,
    history: VecDeque<f64>,
    phase: f64,
}

impl Wave {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            stepper: Stepper::default(),
            ripples: Vec::with_capacity(MAX_RIPPLES),
            history: VecDeque::with_capacity(HISTORY),
            phase: 0.0,
        }
    }

    fn average(&self) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            self.history.iter().sum::<f64>() / self.history.len() as f64
        }
    }
}

impl PatternRenderer for Wave {
    fn name(&self) -> &str {
        "Wave"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;
        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(peak);
        let smooth = self.average();
        self.phase += dt * (1.0 + smooth * 3.0);

        if width == 0 || height == 0 {
            self.ripples.clear();
            return;
        }
        let (w, h) = (width as f64, height as f64);

        if peak > smooth + 0.15 && self.ripples.len() < MAX_RIPPLES {
            let max_life = self.rng.gen_range(1.0..2.0);
            self.ripples.push(Ripple {
                x: self.rng.gen_range(0.0..w),
                y: self.rng.gen_range(0.0..h),
                radius: 0.5,
                life: max_life,
                max_life,
                hue: self.rng.gen_range(0.45..0.75),
            });
        }
        for ripple in &mut self.ripples {
            ripple.radius += dt * (6.0 + smooth * 12.0);
            ripple.life -= dt;
        }
        self.ripples.retain(|r| r.life > 0.0);

        for band in 0..BANDS {
            let base = h * (band as f64 + 1.0) / (BANDS as f64 + 1.0);
            let amplitude = h / (BANDS as f64 + 1.0) * (0.15 + smooth * 0.85);
            let frequency = 0.05 + band as f64 * 0.025;
            let speed = 1.0 + band as f64 * 0.35;
            let hue = (0.5 + band as f32 * 0.07 + self.phase as f32 * 0.01).rem_euclid(1.0);

            for col in 0..width {
                let x = col as f64;
                let y = base
                    + amplitude * (x * frequency + self.phase * speed).sin()
                    + amplitude * 0.35 * (x * frequency * 2.3 - self.phase * speed * 0.7).sin();
                let crest = ((x * frequency + self.phase * speed).cos() + 1.0) / 2.0;
                let color = hsv_to_rgb(hue, 0.65, (0.35 + 0.65 * crest * (0.4 + smooth * 0.6)) as f32);
                plot(surface, x, y, BAND_GLYPHS[band % BAND_GLYPHS.len()], color, crest > 0.9 && smooth > 0.5);
            }
        }

        for ripple in &self.ripples {
            let fade = (ripple.life / ripple.max_life).clamp(0.0, 1.0);
            let color = hsv_to_rgb(ripple.hue, 0.5, fade as f32);
            let points = (ripple.radius * 6.0).clamp(12.0, 480.0) as usize;
            for i in 0..points {
                let angle = i as f64 / points as f64 * TAU;
                let x = ripple.x + angle.cos() * ripple.radius * CELL_ASPECT;
                let y = ripple.y + angle.sin() * ripple.radius;
                plot(surface, x, y, '°', color, false);
            }
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
        let mut wave = Wave::new(11);
        assert!(exercise(&mut wave) > 0);
        assert!(wave.ripples.len() <= MAX_RIPPLES);
    }

    #[test]
    fn idle_bands_stay_visible() {
        let mut wave = Wave::new(1);
        let mut canvas = Canvas::new(30, 10);
        wave.render(&mut canvas, 30, 10, 0.0, 0.0);
        // One glyph per band per column, bands may overlap.
        assert!(canvas.ink() >= 30);
    }

    #[test]
    fn ripples_need_a_jump() {
        let mut wave = Wave::new(2);
        let mut canvas = Canvas::new(30, 10);
        for i in 0..30 {
            wave.render(&mut canvas, 30, 10, i as f64 / 60.0, 0.3);
        }
        assert!(wave.ripples.is_empty());
        wave.render(&mut canvas, 30, 10, 0.5, 1.0);
        assert_eq!(wave.ripples.len(), 1);
    }
}
