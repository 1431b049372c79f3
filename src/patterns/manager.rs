//! Named scenes of layered patterns, with cycling, random picks and shuffle.

use super::{create, PatternRenderer};
use crate::render::Surface;
use rand::prelude::*;
use std::time::Duration;

/// Seed used when none is configured, so runs look the same by default.
pub const DEFAULT_SEED: u64 = 42;

/// Scene name and the patterns it layers, back to front.
const SCENES: [(&str, &[&str]); 8] = [
    ("Milkshaker", &["Logo"]),
    ("Starburst", &["Starburst"]),
    ("Spiral", &["Field", "Spiral"]),
    ("Fibonacci", &["Fibonacci"]),
    ("Wave", &["Wave"]),
    ("Field", &["Field"]),
    ("Geometry", &["Geometry"]),
    ("MixMax", &["Starburst", "Fibonacci", "Wave", "Logo"]),
];

/// A group of patterns drawn together, each of which can be switched off.
pub struct Scene {
    name: String,
    layers: Vec<Box<dyn PatternRenderer>>,
    enabled: Vec<bool>,
}

impl Scene {
    pub fn new(name: impl Into<String>, layers: Vec<Box<dyn PatternRenderer>>) -> Self {
        let enabled = vec![true; layers.len()];
        Self {
            name: name.into(),
            layers,
            enabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(layer name, enabled)` pairs in draw order.
    pub fn layers(&self) -> Vec<(&str, bool)> {
        self.layers
            .iter()
            .zip(&self.enabled)
            .map(|(layer, on)| (layer.name(), *on))
            .collect()
    }

    /// Flip one layer; the last enabled layer can't be switched off.
    pub fn toggle_layer(&mut self, index: usize) -> bool {
        let Some(on) = self.enabled.get(index).copied() else {
            return false;
        };
        if on && self.enabled.iter().filter(|e| **e).count() == 1 {
            return false;
        }
        self.enabled[index] = !on;
        true
    }

    fn shuffle_layers(&mut self, rng: &mut StdRng) {
        let enabled = self.enabled.iter().filter(|e| **e).count();
        if enabled <= 1 {
            for on in &mut self.enabled {
                *on = rng.gen_bool(0.7);
            }
        } else {
            for on in &mut self.enabled {
                if rng.gen_bool(0.4) {
                    *on = !*on;
                }
            }
        }
        self.ensure_one_enabled();
    }

    fn ensure_one_enabled(&mut self) {
        if !self.enabled.iter().any(|e| *e) {
            if let Some(first) = self.enabled.first_mut() {
                *first = true;
            }
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        for (layer, on) in self.layers.iter_mut().zip(&self.enabled) {
            if *on {
                layer.render(surface, width, height, elapsed, loudness);
            }
        }
    }
}

pub struct PatternManager {
    scenes: Vec<Scene>,
    current: usize,
    rng: StdRng,
    shuffle: bool,
    shuffle_every: Duration,
    /// Elapsed time of the last scene change made by shuffle (or of enabling it).
    last_switch: f64,
    last_elapsed: f64,
}

impl PatternManager {
    pub fn new(scenes: Vec<Scene>, seed: u64) -> Self {
        Self {
            scenes,
            current: 0,
            rng: StdRng::seed_from_u64(seed),
            shuffle: false,
            shuffle_every: Duration::from_secs(crate::config::DEFAULT_SHUFFLE_SECS),
            last_switch: 0.0,
            last_elapsed: 0.0,
        }
    }

    /// The built-in scene list.
    pub fn standard(seed: u64) -> Self {
        let mut seeds = StdRng::seed_from_u64(seed);
        let scenes = SCENES
            .iter()
            .map(|(name, layers)| {
                let layers = layers.iter().filter_map(|layer| create(layer, seeds.gen())).collect();
                Scene::new(*name, layers)
            })
            .collect();
        Self::new(scenes, seed)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Scene> {
        self.scenes.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.get_mut(self.current)
    }

    pub fn scene_name(&self) -> &str {
        self.current().map_or("Unknown", Scene::name)
    }

    pub fn scene_names(&self) -> Vec<&str> {
        self.scenes.iter().map(Scene::name).collect()
    }

    pub fn next_scene(&mut self) {
        if self.scenes.len() > 1 {
            self.current = (self.current + 1) % self.scenes.len();
        }
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.scenes.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Case-insensitive scene lookup.
    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.scenes.iter().position(|s| s.name.eq_ignore_ascii_case(name)) {
            Some(index) => self.select(index),
            None => false,
        }
    }

    /// Jump to a random scene other than the current one.
    pub fn select_random(&mut self) {
        let count = self.scenes.len();
        if count > 1 {
            let offset = self.rng.gen_range(1..count);
            self.current = (self.current + offset) % count;
        }
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        if enabled && !self.shuffle {
            self.last_switch = self.last_elapsed;
        }
        self.shuffle = enabled;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.set_shuffle(!self.shuffle);
        self.shuffle
    }

    pub fn set_shuffle_every(&mut self, every: Duration) {
        if !every.is_zero() {
            self.shuffle_every = every;
        }
    }

    /// Randomly re-pick which layers of the current scene are drawn.
    pub fn shuffle_layers(&mut self) {
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.shuffle_layers(&mut self.rng);
        }
    }

    pub fn toggle_layer(&mut self, index: usize) -> bool {
        self.current_mut().is_some_and(|scene| scene.toggle_layer(index))
    }
}

impl PatternRenderer for PatternManager {
    fn name(&self) -> &str {
        self.scene_name()
    }

    fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
        self.last_elapsed = elapsed;
        if self.shuffle && elapsed - self.last_switch >= self.shuffle_every.as_secs_f64() {
            self.next_scene();
            self.shuffle_layers();
            self.last_switch = elapsed;
            log::debug!("shuffle: now showing {}", self.scene_name());
        }
        if let Some(scene) = self.scenes.get_mut(self.current) {
            scene.render(surface, width, height, elapsed, loudness);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Canvas;

    struct Named(&'static str);

    impl PatternRenderer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn render(&mut self, surface: &mut dyn Surface, _: u16, _: u16, _: f64, _: f32) {
            surface.set_str(0, 0, self.0, None, false);
        }
    }

    fn named(names: &[&'static str]) -> Vec<Box<dyn PatternRenderer>> {
        names.iter().map(|n| Box::new(Named(*n)) as Box<dyn PatternRenderer>).collect()
    }

    fn small_manager() -> PatternManager {
        PatternManager::new(
            vec![
                Scene::new("A", named(&["a"])),
                Scene::new("B", named(&["b"])),
                Scene::new("C", named(&["x", "y", "z"])),
            ],
            DEFAULT_SEED,
        )
    }

    #[test]
    fn standard_scenes() {
        let manager = PatternManager::standard(DEFAULT_SEED);
        assert_eq!(
            manager.scene_names(),
            vec!["Milkshaker", "Starburst", "Spiral", "Fibonacci", "Wave", "Field", "Geometry", "MixMax"]
        );
        assert_eq!(manager.name(), "Milkshaker");
        let mix = &manager.scenes[7];
        assert_eq!(mix.layers().len(), 4);
        assert!(mix.layers().iter().all(|(_, on)| *on));
    }

    #[test]
    fn cycles_and_wraps() {
        let mut manager = small_manager();
        manager.next_scene();
        assert_eq!(manager.scene_name(), "B");
        manager.next_scene();
        manager.next_scene();
        assert_eq!(manager.scene_name(), "A");
    }

    #[test]
    fn selects_by_name_and_index() {
        let mut manager = small_manager();
        assert!(manager.select_by_name("c"));
        assert_eq!(manager.current_index(), 2);
        assert!(!manager.select_by_name("nope"));
        assert_eq!(manager.current_index(), 2);
        assert!(!manager.select(3));
        assert!(manager.select(1));
    }

    #[test]
    fn random_pick_always_changes_scene() {
        let mut manager = small_manager();
        for _ in 0..50 {
            let before = manager.current_index();
            manager.select_random();
            assert_ne!(manager.current_index(), before);
        }
    }

    #[test]
    fn shuffle_advances_on_elapsed_time() {
        let mut manager = small_manager();
        manager.set_shuffle_every(Duration::from_secs(27));
        let mut canvas = Canvas::new(10, 2);
        manager.render(&mut canvas, 10, 2, 5.0, 0.0);
        assert!(manager.toggle_shuffle());

        manager.render(&mut canvas, 10, 2, 31.9, 0.0);
        assert_eq!(manager.scene_name(), "A");
        manager.render(&mut canvas, 10, 2, 32.0, 0.0);
        assert_eq!(manager.scene_name(), "B");
        manager.render(&mut canvas, 10, 2, 58.0, 0.0);
        assert_eq!(manager.scene_name(), "B");
        manager.render(&mut canvas, 10, 2, 59.0, 0.0);
        assert_eq!(manager.scene_name(), "C");

        assert!(!manager.toggle_shuffle());
        manager.render(&mut canvas, 10, 2, 500.0, 0.0);
        assert_eq!(manager.scene_name(), "C");
    }

    #[test]
    fn last_layer_cannot_be_disabled() {
        let mut manager = small_manager();
        manager.select(2);
        assert!(manager.toggle_layer(0));
        assert!(manager.toggle_layer(1));
        assert!(!manager.toggle_layer(2));
        assert!(!manager.toggle_layer(9));
        let states: Vec<bool> = manager.current().unwrap().layers().iter().map(|(_, on)| *on).collect();
        assert_eq!(states, vec![false, false, true]);
    }

    #[test]
    fn layer_shuffle_keeps_one_enabled() {
        let mut manager = small_manager();
        manager.select(2);
        for _ in 0..200 {
            manager.shuffle_layers();
            assert!(manager.current().unwrap().layers().iter().any(|(_, on)| *on));
        }
    }

    #[test]
    fn renders_only_enabled_layers() {
        let mut manager = small_manager();
        manager.select(2);
        manager.toggle_layer(2);
        let mut canvas = Canvas::new(4, 1);
        manager.render(&mut canvas, 4, 1, 0.0, 0.5);
        assert_eq!(canvas.row_text(0), "y   ");
    }

    #[test]
    fn standard_scenes_render_every_size() {
        let mut manager = PatternManager::standard(7);
        for index in 0..manager.scene_count() {
            manager.select(index);
            let mut canvas = Canvas::new(50, 16);
            for frame in 0..20 {
                manager.render(&mut canvas, 50, 16, frame as f64 / 30.0, 0.6);
            }
            let mut empty = Canvas::new(0, 0);
            manager.render(&mut empty, 0, 0, 1.0, 0.6);
        }
    }
}
