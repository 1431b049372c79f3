//! Logger setup.
//!
//! The visualizer owns the terminal, so it only logs when `--debug` is given,
//! and then only to a private file in /tmp. Headless commands log to stderr.
//! `RUST_LOG` overrides the default filter either way.

use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;

pub const DEBUG_LOG_PATH: &str = "/tmp/milkshaker.log";
/// Owner read/write only; device names and routing state end up in here.
const DEBUG_LOG_MODE: u32 = 0o600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full-screen visualizer.
    Interactive,
    /// `devices`, `test-audio`, `setup-audio`.
    Headless,
}

/// Default filter for a mode, before `RUST_LOG` is consulted.
pub fn default_filter(mode: Mode, debug: bool) -> &'static str {
    match (mode, debug) {
        (_, true) => "milkshaker=debug,warn",
        (Mode::Interactive, false) => "off",
        (Mode::Headless, false) => "warn",
    }
}

pub fn init(mode: Mode, debug: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter(mode, debug)));

    if mode == Mode::Interactive {
        let file = open_debug_log(debug);
        if file.is_none() {
            builder.filter_level(log::LevelFilter::Off);
        }
        // Never stderr: the terminal belongs to the visualizer, whatever RUST_LOG says.
        builder.target(Target::Pipe(interactive_writer(file)));
    } else {
        builder.target(Target::Stderr);
    }

    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

/// The debug file, or a writer that drops everything.
fn interactive_writer(file: Option<File>) -> Box<dyn Write + Send> {
    match file {
        Some(file) => Box::new(file),
        None => Box::new(io::sink()),
    }
}

fn open_debug_log(debug: bool) -> Option<File> {
    if !debug {
        return None;
    }
    // Exclusive create first; fall back to truncating our own earlier log in place.
    let opened = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(DEBUG_LOG_MODE)
        .open(DEBUG_LOG_PATH)
        .or_else(|_| OpenOptions::new().write(true).truncate(true).open(DEBUG_LOG_PATH));
    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            report_unopenable(&e);
            None
        }
    }
}

fn report_unopenable(e: &io::Error) {
    // Still on the main screen at this point, so stderr is visible.
    eprintln!("milkshaker: cannot open {}: {}", DEBUG_LOG_PATH, e);
}
