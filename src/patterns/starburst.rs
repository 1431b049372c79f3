//! Radial rays with a particle pool and shockwave rings on sudden peaks.

use super::{hsv_to_rgb, plot, ramp_char, PatternRenderer, Stepper, CELL_ASPECT};
use crate::render::Surface;
use rand::prelude::*;
use std::collections::VecDeque;
use std::f64::consts::TAU;

const MAX_PARTICLES: usize = 200;
const MAX_SHOCKWAVES: usize = 8;
const HISTORY: usize = 20;
const RAY_RAMP: [char; 5] = ['·', '∙', '*', '✦', '✸'];
const PARTICLE_GLYPHS: [char; 5] = ['*', '+', '×', '✧', '·'];

struct Particle {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    life: f64,
    max_life: f64,
    hue: f32,
    glyph: char,
}

struct Shockwave {
    radius: f64,
    speed: f64,
    life: f64,
    max_life: f64,
    hue: f32,
}

pub struct Starburst {
    rng: StdRng,
    stepper: Stepper,
    particles: Vec<Particle>,
    shockwaves: Vec<Shockwave>,
    history: VecDeque<f64>,
    phase: f64,
}

impl Starburst {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            stepper: Stepper::default(),
            particles: Vec::with_capacity(MAX_PARTICLES),
            shockwaves: Vec::with_capacity(MAX_SHOCKWAVES),
            history: VecDeque::with_capacity(HISTORY),
            phase: 0.0,
        }
    }

    /// Recent rise in loudness: mean of the last 3 frames minus the 3 before.
    fn momentum(&self) -> f64 {
        if self.history.len() < 6 {
            return 0.0;
        }
        let n = self.history.len();
        let recent: f64 = self.history.range(n - 3..).sum::<f64>() / 3.0;
        let older: f64 = self.history.range(n - 6..n - 3).sum::<f64>() / 3.0;
        recent - older
    }

    fn spawn_particles(&mut self, count: usize, peak: f64, cx: f64, cy: f64) {
        for _ in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let angle = self.rng.gen_range(0.0..TAU);
            let speed = self.rng.gen_range(4.0..12.0) * (0.5 + peak * 2.0);
            let max_life = self.rng.gen_range(0.6..1.6);
            self.particles.push(Particle {
                x: cx,
                y: cy,
                vx: angle.cos() * speed * CELL_ASPECT,
                vy: angle.sin() * speed,
                life: max_life,
                max_life,
                hue: self.rng.gen_range(0.0..1.0),
                glyph: PARTICLE_GLYPHS[self.rng.gen_range(0..PARTICLE_GLYPHS.len())],
            });
        }
    }

    fn update(&mut self, dt: f64, peak: f64, momentum: f64, width: f64, height: f64) {
        let (cx, cy) = (width / 2.0, height / 2.0);

        let spawn = (peak * 12.0 + momentum.max(0.0) * 60.0) as usize;
        self.spawn_particles(spawn, peak, cx, cy);

        for p in &mut self.particles {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.vx *= 0.98;
            p.vy *= 0.98;
            p.life -= dt;
        }
        self.particles
            .retain(|p| p.life > 0.0 && p.x >= -1.0 && p.x <= width + 1.0 && p.y >= -1.0 && p.y <= height + 1.0);

        if momentum > 0.08 && self.shockwaves.len() < MAX_SHOCKWAVES {
            let max_life = self.rng.gen_range(0.8..1.4);
            self.shockwaves.push(Shockwave {
                radius: 1.0,
                speed: 10.0 + peak * 30.0,
                life: max_life,
                max_life,
                hue: self.rng.gen_range(0.0..1.0),
            });
        }
        for wave in &mut self.shockwaves {
            wave.radius += wave.speed * dt;
            wave.life -= dt;
        }
        self.shockwaves.retain(|w| w.life > 0.0);
    }

    fn draw_rays(&self, surface: &mut dyn Surface, width: f64, height: f64, peak: f64) {
        let (cx, cy) = (width / 2.0, height / 2.0);
        let max_radius = (width / CELL_ASPECT).min(height) / 2.0;
        let rays = 8 + (peak * 16.0) as usize;
        // Quiet rooms still show a small idle star.
        let reach = max_radius * (0.15 + 0.85 * peak);

        for ray in 0..rays {
            let angle = ray as f64 / rays as f64 * TAU + self.phase * 0.2;
            let wobble = 1.0 + 0.15 * (self.phase * 3.0 + ray as f64).sin();
            let length = reach * wobble;
            let steps = (length * 2.0).ceil().max(1.0) as usize;
            for step in 0..steps {
                let t = step as f64 / steps as f64;
                let r = t * length;
                let x = cx + angle.cos() * r * CELL_ASPECT;
                let y = cy + angle.sin() * r;
                let intensity = (1.0 - t) * (0.4 + 0.6 * peak);
                let hue = (ray as f32 / rays as f32 + self.phase as f32 * 0.05).rem_euclid(1.0);
                let color = hsv_to_rgb(hue, 0.8, (0.35 + 0.65 * intensity) as f32);
                plot(surface, x, y, ramp_char(&RAY_RAMP, intensity), color, intensity > 0.7);
            }
        }
    }

    fn draw_shockwaves(&self, surface: &mut dyn Surface, width: f64, height: f64) {
        let (cx, cy) = (width / 2.0, height / 2.0);
        for wave in &self.shockwaves {
            let fade = (wave.life / wave.max_life).clamp(0.0, 1.0);
            let color = hsv_to_rgb(wave.hue, 0.6, fade as f32);
            let points = (wave.radius * 8.0).clamp(16.0, 720.0) as usize;
            for i in 0..points {
                let angle = i as f64 / points as f64 * TAU;
                let x = cx + angle.cos() * wave.radius * CELL_ASPECT;
                let y = cy + angle.sin() * wave.radius;
                plot(surface, x, y, if fade > 0.5 { 'o' } else { '.' }, color, false);
            }
        }
    }

    fn draw_particles(&self, surface: &mut dyn Surface) {
        for p in &self.particles {
            let fade = (p.life / p.max_life).clamp(0.0, 1.0);
            let color = hsv_to_rgb(p.hue, 0.9, (0.3 + 0.7 * fade) as f32);
            plot(surface, p.x, p.y, p.glyph, color, fade > 0.8);
        }
    }
}

impl PatternRenderer for Starburst {
    fn name(&self) -> &str {
        "Starburst"
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        let dt = self.stepper.step(elapsed);
        let peak = loudness.clamp(0.0, 1.0) as f64;

        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(peak);
        let momentum = self.momentum();

        self.phase += dt * (1.0 + peak * 4.0 + momentum.max(0.0) * 10.0);
        if width == 0 || height == 0 {
            return;
        }

        let (w, h) = (width as f64, height as f64);
        self.update(dt, peak, momentum, w, h);
        self.draw_shockwaves(surface, w, h);
        self.draw_rays(surface, w, h, peak);
        self.draw_particles(surface);
    }
}
