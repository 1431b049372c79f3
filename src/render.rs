//! Fixed-rate render loop.
//!
//! Frame `k` is due at `k / fps` seconds after the loop starts. Deadlines are
//! computed from the frame index in integer nanoseconds, so timing never
//! accumulates drift. When a frame overruns by more than one period the loop
//! skips ahead instead of rendering a burst of late frames.

use crate::audio::AudioEngine;
use crate::config::MAX_FPS;
use crate::error::ConfigError;
use crate::patterns::PatternRenderer;
use crossterm::style::Color;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Anything that accepts cells and reports its size.
pub trait Surface {
    fn size(&self) -> (u16, u16);

    /// Out-of-bounds coordinates are ignored.
    fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool);

    fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x.saturating_add(i as i32), y, ch, fg, bold);
        }
    }
}

/// A surface that is presented once per frame.
pub trait Display: Surface {
    /// Pick up viewport changes and clear the back buffer.
    fn begin_frame(&mut self) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Latest smoothed loudness, readable from the render thread.
pub trait LoudnessSource {
    fn loudness(&self) -> f32;
}

impl LoudnessSource for AudioEngine {
    fn loudness(&self) -> f32 {
        AudioEngine::loudness(self)
    }
}

pub trait Clock {
    /// Time since the clock's epoch.
    fn now(&self) -> Duration;
    fn sleep_until(&mut self, deadline: Duration);
}

pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What the frame hook learns about the frame just drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub index: u64,
    pub elapsed: f64,
    pub loudness: f32,
    pub width: u16,
    pub height: u16,
}

pub struct RenderLoop {
    fps: u32,
    limit: Option<Duration>,
    frames_rendered: u64,
    frames_skipped: u64,
}

impl RenderLoop {
    pub fn new(fps: u32) -> Result<Self, ConfigError> {
        if fps == 0 || fps > MAX_FPS {
            return Err(ConfigError::FrameRate(fps));
        }
        Ok(Self {
            fps,
            limit: None,
            frames_rendered: 0,
            frames_skipped: 0,
        })
    }

    /// Stop before the first frame due at or after `limit`.
    #[cfg(test)]
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// When frame `index` is due, relative to the loop start.
    pub fn deadline(&self, index: u64) -> Duration {
        let nanos = index as u128 * 1_000_000_000 / self.fps as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// First frame index whose deadline is strictly after `t`.
    fn first_frame_after(&self, t: Duration) -> u64 {
        let index = t.as_nanos() * self.fps as u128 / 1_000_000_000 + 1;
        u64::try_from(index).unwrap_or(u64::MAX)
    }

    /// Tick until `after_frame` returns `Flow::Quit` or the limit is reached.
    ///
    /// Each tick reads the loudness once, draws the pattern into a cleared
    /// frame, lets `after_frame` add overlays or change the pattern, and
    /// flushes.
    pub fn run<D, P, C, F>(
        &mut self,
        display: &mut D,
        source: &dyn LoudnessSource,
        pattern: &mut P,
        clock: &mut C,
        mut after_frame: F,
    ) -> io::Result<()>
    where
        D: Display,
        P: PatternRenderer + ?Sized,
        C: Clock + ?Sized,
        F: FnMut(&mut D, &mut P, &FrameInfo) -> Flow,
    {
        let start = clock.now();
        let mut index: u64 = 0;

        loop {
            let due = self.deadline(index);
            if self.limit.is_some_and(|limit| due >= limit) {
                return Ok(());
            }
            clock.sleep_until(start + due);

            let loudness = source.loudness();
            let elapsed = due.as_secs_f64();

            display.begin_frame()?;
            let (width, height) = display.size();
            pattern.render(display, width, height, elapsed, loudness);

            let info = FrameInfo { index, elapsed, loudness, width, height };
            let flow = after_frame(display, pattern, &info);
            display.flush()?;
            self.frames_rendered += 1;

            if flow == Flow::Quit {
                return Ok(());
            }

            let behind = clock.now().saturating_sub(start);
            index += 1;
            if behind > self.deadline(index) + self.deadline(1) {
                let resume = self.first_frame_after(behind);
                self.frames_skipped += resume - index;
                log::debug!("render fell behind; skipping {} frames", resume - index);
                index = resume;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Canvas;

    struct Constant(f32);

    impl LoudnessSource for Constant {
        fn loudness(&self) -> f32 {
            self.0
        }
    }

    /// Advances instantly to each deadline; each render costs `cost`.
    struct SimulatedClock {
        now: Duration,
        cost: Duration,
    }

    impl Clock for SimulatedClock {
        fn now(&self) -> Duration {
            self.now
        }

        fn sleep_until(&mut self, deadline: Duration) {
            if deadline > self.now {
                self.now = deadline;
            }
            self.now += self.cost;
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(f64, f32, u16, u16)>,
    }

    impl PatternRenderer for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn render(&mut self, surface: &mut dyn Surface, width: u16, height: u16, elapsed: f64, loudness: f32) {
            surface.set(0, 0, '*', None, false);
            self.calls.push((elapsed, loudness, width, height));
        }
    }

    #[test]
    fn one_second_at_60hz_renders_60_frames() {
        let mut render_loop = RenderLoop::new(60).unwrap().with_limit(Duration::from_secs(1));
        let mut canvas = Canvas::new(20, 10);
        let mut recorder = Recorder::default();
        let mut clock = SimulatedClock { now: Duration::ZERO, cost: Duration::from_millis(2) };

        render_loop
            .run(&mut canvas, &Constant(0.5), &mut recorder, &mut clock, |_, _, _| Flow::Continue)
            .unwrap();

        assert_eq!(recorder.calls.len(), 60);
        assert_eq!(render_loop.frames_rendered(), 60);
        assert!(recorder.calls.windows(2).all(|w| w[1].0 > w[0].0));
        assert!(recorder.calls.iter().all(|c| c.1 == 0.5));
        assert_eq!(recorder.calls[0].0, 0.0);
    }

    #[test]
    fn deadlines_do_not_drift() {
        let render_loop = RenderLoop::new(60).unwrap();
        assert_eq!(render_loop.deadline(60), Duration::from_secs(1));
        assert_eq!(render_loop.deadline(3600), Duration::from_secs(60));
        assert_eq!(render_loop.deadline(1), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn slow_frames_skip_ahead() {
        let mut render_loop = RenderLoop::new(60).unwrap().with_limit(Duration::from_secs(1));
        let mut canvas = Canvas::new(4, 4);
        let mut recorder = Recorder::default();
        let mut clock = SimulatedClock { now: Duration::ZERO, cost: Duration::from_millis(50) };

        render_loop
            .run(&mut canvas, &Constant(0.0), &mut recorder, &mut clock, |_, _, _| Flow::Continue)
            .unwrap();

        assert!(recorder.calls.len() < 30);
        assert!(render_loop.frames_skipped() > 0);
        assert!(recorder.calls.windows(2).all(|w| w[1].0 > w[0].0));
    }

    #[test]
    fn hook_can_quit_and_sees_frame() {
        let mut render_loop = RenderLoop::new(30).unwrap();
        let mut canvas = Canvas::new(8, 3);
        let mut recorder = Recorder::default();
        let mut clock = SimulatedClock { now: Duration::ZERO, cost: Duration::ZERO };
        let mut seen = Vec::new();

        render_loop
            .run(&mut canvas, &Constant(0.25), &mut recorder, &mut clock, |canvas, _, info| {
                assert_eq!(canvas.get(0, 0).map(|c| c.ch), Some('*'));
                seen.push(*info);
                if info.index == 4 { Flow::Quit } else { Flow::Continue }
            })
            .unwrap();

        assert_eq!(seen.len(), 5);
        assert_eq!((seen[4].width, seen[4].height), (8, 3));
        assert_eq!(recorder.calls.len(), 5);
    }

    #[test]
    fn rejects_bad_rates() {
        assert!(RenderLoop::new(0).is_err());
        assert!(RenderLoop::new(MAX_FPS + 1).is_err());
    }
}
