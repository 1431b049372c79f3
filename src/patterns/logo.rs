//! Title banner with a loudness-driven rainbow sweep and sparkles.

use super::{hsv_to_rgb, PatternRenderer, Stepper};
use crate::render::Surface;
use crossterm::style::Color;
use rand::prelude::*;

const BANNER: [&str; 3] = [
    "█▄ ▄█ █ █   █ ▄▀ ▄▀▀ █  █ ▄▀▄ █ ▄▀ █▀▀ █▀▄",
    "█ ▀ █ █ █   █▀▄  ▀▄  █▀▀█ █▀█ █▀▄  █▀  █▀▄",
    "▀   ▀ ▀ ▀▀▀ ▀  ▀ ▀▀  ▀  ▀ ▀ ▀ ▀  ▀ ▀▀▀ ▀ ▀",
];
const COMPACT: &str = "MILKSHAKER";
const MAX_SPARKLES: usize = 50;
const SPARKLE_GLYPHS: [char; 4] = ['✦', '✧', '+', '·'];
const IDLE: Color = Color::DarkGrey;

struct Sparkle {
    x: i32,
    y: i32,
    life: f64,
    max_life: f64,
    hue: f32,
}

pub struct Logo {
    rng: StdRng,
    stepper: Stepper,
    sparkles: Vec<Sparkle>,
    /// Smoothed brightness of the rainbow sweep in `[0, 1]`.
    strength: f64,
    phase: f64,
}

impl Logo {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            stepper: Stepper::default(),
            sparkles: Vec::with_capacity(MAX_SPARKLES),
            strength: 0.0,
            phase: 0.0,
        }
    }

    /// Brightness the sweep eases toward; nothing below 0.1 loudness.
    fn target_strength(peak: f64, phase: f64) -> f64 {
        if peak <= 0.1 {
            return 0.0;
        }
        let base = ((peak - 0.1) * 1.8).min(1.0);
        let boost = if peak > 0.3 { ((peak - 0.3) * 2.0).powi(2) * 0.5 } else { 0.0 };
        let swell = ((phase * 0.5).sin() + 1.0) / 2.0;
        ((base + boost) * (0.7 + swell * 0.3)).min(1.0)
    }

    fn update_sparkles(&mut self, dt: f64, peak: f64, area: (i32, i32, i32, i32)) {
        let (x0, y0, x1, y1) = area;
        let chance = (peak * 0.8).min(0.8);
        if x1 > x0 && y1 > y0 && self.sparkles.len() < MAX_SPARKLES && self.rng.gen_bool(chance) {
            let max_life = self.rng.gen_range(0.3..0.9);
            self.sparkles.push(Sparkle {
                x: self.rng.gen_range(x0..x1),
                y: self.rng.gen_range(y0..y1),
                life: max_life,
                max_life,
                hue: self.rng.gen_range(0.0..1.0),
            });
        }
        for sparkle in &mut self.sparkles {
            sparkle.life -= dt;
        }
        self.sparkles.retain(|s| s.life > 0.0);
    }
}

impl PatternRenderer for Logo {
    fn name(&self) -> &str {
        "Logo"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;
        self.phase += dt * (1.0 + peak * 3.0) * 2.0;

        let target = Self::target_strength(peak, self.phase);
        let smoothing = 0.88 - peak * 0.3;
        self.strength = self.strength * smoothing + target * (1.0 - smoothing);

        if width == 0 || height == 0 {
            return;
        }

        let banner_width = BANNER[0].chars().count() as i32;
        let rows: Vec<&str> = if banner_width <= width as i32 {
            BANNER.to_vec()
        } else {
            vec![COMPACT]
        };
        let logo_width = rows[0].chars().count() as i32;
        let start_x = (width as i32 - logo_width) / 2;
        let start_y = (height as i32 - rows.len() as i32) / 2;

        let margin = 3;
        self.update_sparkles(
            dt,
            peak,
            (
                (start_x - margin * 2).max(0),
                (start_y - margin).max(0),
                (start_x + logo_width + margin * 2).min(width as i32),
                (start_y + rows.len() as i32 + margin).min(height as i32),
            ),
        );

        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if ch == ' ' {
                    continue;
                }
                let x = start_x + col as i32;
                let y = start_y + row as i32;
                if self.strength < 0.02 {
                    surface.set(x, y, ch, Some(IDLE), false);
                    continue;
                }
                let sweep = col as f32 / logo_width.max(1) as f32;
                let hue = (sweep * 0.8 + self.phase as f32 * 0.1).rem_euclid(1.0);
                let value = 0.3 + 0.7 * self.strength as f32;
                surface.set(x, y, ch, Some(hsv_to_rgb(hue, 0.85, value)), self.strength > 0.7);
            }
        }

        for sparkle in &self.sparkles {
            let fade = (sparkle.life / sparkle.max_life).clamp(0.0, 1.0);
            let glyph = SPARKLE_GLYPHS[((1.0 - fade) * (SPARKLE_GLYPHS.len() - 1) as f64).round() as usize];
            surface.set(sparkle.x, sparkle.y, glyph, Some(hsv_to_rgb(sparkle.hue, 0.4, fade as f32)), false);
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
        let mut logo = Logo::new(9);
        assert!(exercise(&mut logo) > 0);
        assert!(logo.sparkles.len() <= MAX_SPARKLES);
    }

    #[test]
    fn idle_logo_is_grey_and_centered() {
        let mut logo = Logo::new(1);
        let mut canvas = Canvas::new(60, 9);
        logo.render(&mut canvas, 60, 9, 0.0, 0.0);
        assert!(canvas.row_text(3).contains("█▄ ▄█"));
        let first = (0..60).find_map(|x| canvas.get(x, 3).filter(|c| c.ch != ' ').copied());
        assert_eq!(first.map(|c| c.fg), Some(Some(IDLE)));
    }

    #[test]
    fn narrow_terminal_uses_compact_title() {
        let mut logo = Logo::new(1);
        let mut canvas = Canvas::new(20, 3);
        logo.render(&mut canvas, 20, 3, 0.0, 0.0);
        assert_eq!(canvas.row_text(1), "     MILKSHAKER     ");
    }

    #[test]
    fn strength_rises_with_loudness_and_stays_bounded() {
        let mut logo = Logo::new(4);
        let mut canvas = Canvas::new(60, 9);
        for i in 0..120 {
            logo.render(&mut canvas, 60, 9, i as f64 / 60.0, 1.0);
            assert!((0.0..=1.0).contains(&logo.strength));
        }
        assert!(logo.strength > 0.5);
    }
}
