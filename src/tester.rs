//! Headless capture check: prints the level every tick until interrupted.

use crate::audio::AudioEngine;
use crate::error::AppError;
use chrono::Local;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

pub const TICK: Duration = Duration::from_millis(100);

/// Coarse label for a raw buffer peak.
pub fn level_label(raw: f32) -> &'static str {
    if raw > 0.01 {
        "STRONG"
    } else if raw > 0.001 {
        "Medium"
    } else if raw > 0.0001 {
        "Low"
    } else {
        "Silent"
    }
}

pub fn format_level(raw: f32, loudness_percent: f32, clock: &str) -> String {
    format!(
        "{:<6}  peak={:.6}  level={:>3.0}%  {}",
        level_label(raw),
        raw,
        loudness_percent,
        clock
    )
}

/// Initialize, start, and print one status line per `tick` until `stop()` says so.
pub fn run<W, F>(engine: &AudioEngine, out: &mut W, tick: Duration, mut stop: F) -> Result<(), AppError>
where
    W: Write,
    F: FnMut() -> bool,
{
    writeln!(out, "AUDIO CAPTURE TEST")?;
    writeln!(out, "==================")?;
    writeln!(out, "Checks audio capture without the visualizer. Press Ctrl+C to stop.")?;
    writeln!(out)?;

    engine.initialize()?;
    let status = engine.status();
    writeln!(
        out,
        "Device: {} ({} of {})",
        engine.current_device_name(),
        status.device_index + 1,
        status.device_count
    )?;
    engine.start()?;
    writeln!(out, "Listening... play some audio.")?;

    while !stop() {
        thread::sleep(tick);
        if !engine.is_capturing() {
            continue;
        }
        let line = format_level(
            engine.raw_peak(),
            engine.loudness_percent(),
            &Local::now().format("%H:%M:%S").to_string(),
        );
        write!(out, "\r{}", line)?;
        out.flush()?;
    }

    writeln!(out, "\n\nStopping audio test...")?;
    engine.stop();
    engine.cleanup();
    Ok(())
}

/// Stdout variant used by the `test-audio` subcommand.
pub fn run_stdout(engine: &AudioEngine) -> Result<(), AppError> {
    crate::signal::install()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(engine, &mut out, TICK, crate::signal::interrupted)
}
