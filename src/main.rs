mod app;
mod audio;
mod config;
mod error;
mod help;
mod input;
mod logging;
mod patterns;
mod render;
mod settings;
mod signal;
mod terminal;
mod tester;

use audio::backend::CaptureBackend;
use audio::cpal_backend::CpalBackend;
use audio::registry::DeviceRegistry;
use audio::routing::{AudioRouter, NullRouter, PactlRouter, SinkState};
use audio::AudioEngine;
use clap::{Args, Parser, Subcommand};
use config::{DisplayConfig, EngineConfig, DEFAULT_DECAY, DEFAULT_FPS, DEFAULT_SENSITIVITY};
use error::{AppError, ConfigError};
use settings::{AudioSettings, DisplaySettings, Settings};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "milkshaker")]
#[command(version)]
#[command(about = "Terminal audio visualizer: system audio loudness drives generative ASCII patterns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Write debug logs (to /tmp/milkshaker.log while the visualizer runs)
    #[arg(long, global = true)]
    debug: bool,

    /// Never change the sound server's default source
    #[arg(long, global = true)]
    no_routing: bool,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Scene to start with (Milkshaker, Starburst, Spiral, Fibonacci, Wave, Field, Geometry, MixMax)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Loudness multiplier (0.2 - 5.0)
    #[arg(short, long)]
    sensitivity: Option<f32>,

    /// Envelope decay per audio buffer, between 0 and 1
    #[arg(long)]
    decay: Option<f32>,

    /// Frames per second (1 - 240)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Device to open first: index from `milkshaker devices` or part of its name
    #[arg(short, long)]
    device: Option<String>,

    /// Switch scenes automatically
    #[arg(long)]
    shuffle: bool,

    /// Random seed for pattern effects
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices in the order they would be tried
    Devices,
    /// Print the captured level without the visualizer
    TestAudio,
    /// Explain how to make system audio capturable on Linux
    SetupAudio,
}

fn engine_config(args: &RunArgs, audio: &AudioSettings, no_routing: bool) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::new(
        args.decay.or(audio.decay).unwrap_or(DEFAULT_DECAY),
        args.sensitivity.or(audio.sensitivity).unwrap_or(DEFAULT_SENSITIVITY),
    )?;
    if let Some(ms) = audio.settle_ms {
        config.settle = Duration::from_millis(ms);
    }
    if let Some(ms) = audio.restart_delay_ms {
        config.restart_delay = Duration::from_millis(ms);
    }
    config.routing = !no_routing && audio.routing.unwrap_or(true);
    config.preferred_device = args.device.clone().or_else(|| audio.preferred_device.clone());
    Ok(config)
}

fn display_config(args: &RunArgs, display: &DisplaySettings) -> Result<DisplayConfig, ConfigError> {
    let mut config = DisplayConfig::new(args.fps.or(display.fps).unwrap_or(DEFAULT_FPS))?;
    config.pattern = args.pattern.clone().or_else(|| display.pattern.clone());
    config.shuffle = args.shuffle || display.shuffle.unwrap_or(false);
    if let Some(secs) = display.shuffle_secs {
        config.shuffle_every = Duration::from_secs(secs);
    }
    config.seed = args.seed;
    Ok(config)
}

fn router(routing: bool) -> Box<dyn AudioRouter> {
    if routing {
        Box::new(PactlRouter)
    } else {
        Box::new(NullRouter)
    }
}

/// Ranked device listing without touching routing or opening a stream.
fn print_devices<W: Write>(
    out: &mut W,
    backend: &mut dyn CaptureBackend,
    router: &dyn AudioRouter,
    preferred: Option<&str>,
) -> Result<(), AppError> {
    backend.initialize().map_err(error::InitError::Backend)?;
    let registry = DeviceRegistry::discover(router, backend);
    backend.terminate();

    writeln!(out, "Capture devices ({}):", registry.len())?;
    if registry.is_empty() {
        writeln!(out, "  none found. Run `milkshaker setup-audio` for help.")?;
        return Ok(());
    }

    let selected = preferred.and_then(|q| registry.find(q)).unwrap_or(0);
    for (index, device) in registry.devices().iter().enumerate() {
        let rates: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
        writeln!(
            out,
            "{} [{}] {} ({}, {} ch, {} Hz){}",
            if index == selected { "*" } else { " " },
            index,
            device.name,
            device.kind_label(),
            device.channels,
            rates.join("/"),
            if device.is_default { " default" } else { "" }
        )?;
    }
    if let Some(device) = registry.get(selected) {
        writeln!(out, "\nAuto-selected: {}", device.name)?;
    }

    match router.list_sinks() {
        Ok(sinks) if !sinks.is_empty() => {
            writeln!(out, "\nOutput sinks:")?;
            for sink in sinks {
                let state = match sink.state {
                    SinkState::Running => "RUNNING",
                    SinkState::Idle => "IDLE",
                    SinkState::Suspended => "SUSPENDED",
                    SinkState::Unknown => "?",
                };
                writeln!(out, "  {:<10} {}", state, sink.name)?;
            }
        }
        Ok(_) => {}
        Err(e) => log::warn!("could not list output sinks: {}", e),
    }
    Ok(())
}

fn print_setup(out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "\
SYSTEM AUDIO SETUP
==================
milkshaker listens to an input device. To visualize what your speakers play,
capture the monitor source that mirrors your output sink.

1. Find the monitor source:
     pactl list sources short
   Names ending in .monitor mirror an output. `milkshaker devices` lists the
   ones it found, with playing sinks first.

2. Let milkshaker pick it: while audio is playing it points the default input
   at the monitor of the active sink and puts the old default back on exit.
   Use --no-routing to turn this off.

3. Or choose it by hand: open pavucontrol, play something, and on the
   Recording tab set milkshaker's input to \"Monitor of <your output>\".

4. If no monitor exists, add a loopback:
     pactl load-module module-loopback

Check the result with `milkshaker test-audio`."
    )
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mode = if cli.command.is_none() {
        logging::Mode::Interactive
    } else {
        logging::Mode::Headless
    };
    logging::init(mode, cli.debug);

    if let Some(Commands::SetupAudio) = cli.command {
        print_setup(&mut io::stdout())?;
        return Ok(());
    }

    let settings = Settings::load();
    let engine_config = engine_config(&cli.run, &settings.audio, cli.no_routing)?;
    let quiet = !cli.debug;

    match cli.command {
        Some(Commands::Devices) => {
            let mut backend = CpalBackend::new(quiet);
            let router = router(engine_config.routing);
            let stdout = io::stdout();
            print_devices(
                &mut stdout.lock(),
                &mut backend,
                router.as_ref(),
                engine_config.preferred_device.as_deref(),
            )
        }
        Some(Commands::TestAudio) => {
            let engine = AudioEngine::new(
                &engine_config,
                Box::new(CpalBackend::new(quiet)),
                router(engine_config.routing),
            )?;
            tester::run_stdout(&engine)
        }
        Some(Commands::SetupAudio) => Ok(()),
        None => {
            let display = display_config(&cli.run, &settings.display)?;
            let engine = Arc::new(AudioEngine::new(
                &engine_config,
                Box::new(CpalBackend::new(true)),
                router(engine_config.routing),
            )?);
            app::run(engine, &display)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("milkshaker: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::mock::{MockBackend, MockRouter};
    use audio::routing::{SinkInfo, SourceInfo};

    #[test]
    fn flags_override_settings() {
        let settings = Settings::parse(
            "[audio]\nsensitivity = 2.0\ndecay = 0.9\nsettle_ms = 5\npreferred_device = \"usb\"\n\
             [display]\nfps = 30\npattern = \"Wave\"\nshuffle_secs = 10\n",
        )
        .unwrap();
        let args = RunArgs {
            sensitivity: Some(3.0),
            fps: Some(24),
            ..RunArgs::default()
        };

        let engine = engine_config(&args, &settings.audio, false).unwrap();
        assert_eq!(engine.sensitivity.value(), 3.0);
        assert_eq!(engine.decay, 0.9);
        assert_eq!(engine.settle, Duration::from_millis(5));
        assert_eq!(engine.preferred_device.as_deref(), Some("usb"));
        assert!(engine.routing);

        let display = display_config(&args, &settings.display).unwrap();
        assert_eq!(display.fps, 24);
        assert_eq!(display.pattern.as_deref(), Some("Wave"));
        assert_eq!(display.shuffle_every, Duration::from_secs(10));
    }

    #[test]
    fn routing_can_be_disabled_either_way() {
        let args = RunArgs::default();
        let off = Settings::parse("[audio]\nrouting = false\n").unwrap();
        assert!(!engine_config(&args, &off.audio, false).unwrap().routing);
        assert!(!engine_config(&args, &AudioSettings::default(), true).unwrap().routing);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_decay = RunArgs {
            decay: Some(1.5),
            ..RunArgs::default()
        };
        assert!(engine_config(&bad_decay, &AudioSettings::default(), false).is_err());
        let bad_fps = RunArgs {
            fps: Some(0),
            ..RunArgs::default()
        };
        assert!(display_config(&bad_fps, &DisplaySettings::default()).is_err());
    }

    #[test]
    fn device_listing_ranks_monitors_first() {
        let mut backend = MockBackend::with_devices(&["Line In"]);
        let router = MockRouter::new(
            vec![SinkInfo {
                name: "desk".into(),
                state: SinkState::Running,
            }],
            vec![SourceInfo {
                name: "desk.monitor".into(),
                channels: 2,
                sample_rate: 48_000,
            }],
            None,
        );
        let mut out = Vec::new();
        print_devices(&mut out, &mut backend, &router, None).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Capture devices (2):"));
        assert!(text.contains("* [0] desk Monitor (monitor, 2 ch, 48000 Hz)"));
        assert!(text.contains("  [1] Line In (native, 2 ch, 44100/48000 Hz)"));
        assert!(text.contains("Auto-selected: desk Monitor"));
        assert!(text.contains("RUNNING    desk"));
    }

    #[test]
    fn device_listing_honours_preference() {
        let mut backend = MockBackend::with_devices(&["Line In", "USB Mic"]);
        let mut out = Vec::new();
        print_devices(&mut out, &mut backend, &MockRouter::empty(), Some("usb")).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Auto-selected: USB Mic"));
    }

    #[test]
    fn setup_text_mentions_monitor_sources() {
        let mut out = Vec::new();
        print_setup(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("pactl list sources short"));
        assert!(text.contains("module-loopback"));
    }
}
