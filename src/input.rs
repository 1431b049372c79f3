//! Keyboard handling on its own thread.
//!
//! Engine actions (start/stop, restart, sensitivity, device cycling) run
//! directly on the input thread, so a slow device switch never stalls a
//! frame. Everything that touches the display goes to the render loop as a
//! [`UiEvent`].

use crate::audio::AudioEngine;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleCapture,
    Restart,
    SensitivityUp,
    SensitivityDown,
    CycleDevice,
    NextPattern,
    RandomPattern,
    ToggleShuffle,
    /// Zero-based layer of the current scene.
    ToggleLayer(usize),
    ToggleHelp,
    Quit,
}

/// Messages for the render loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    NextPattern,
    RandomPattern,
    ToggleShuffle,
    ToggleLayer(usize),
    ToggleHelp,
    /// Short-lived status line.
    Notice(String),
    Quit,
}

pub fn action_for(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    let action = match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('s') | KeyCode::Char('S') => Action::ToggleCapture,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::SensitivityUp,
        KeyCode::Char('-') | KeyCode::Char('_') => Action::SensitivityDown,
        KeyCode::Char('d') | KeyCode::Char('D') => Action::CycleDevice,
        KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Tab => Action::NextPattern,
        KeyCode::Char('n') | KeyCode::Char('N') => Action::RandomPattern,
        KeyCode::Char('x') | KeyCode::Char('X') => Action::ToggleShuffle,
        KeyCode::Char(c @ '1'..='9') => Action::ToggleLayer(c as usize - '1' as usize),
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') => Action::ToggleHelp,
        _ => return None,
    };
    Some(action)
}

/// Carry out one action. Returns `false` once the user asked to quit.
///
/// Failures are reported as notices; none of them end the session.
pub fn dispatch(action: Action, engine: &AudioEngine, ui: &Sender<UiEvent>) -> bool {
    let event = match action {
        Action::ToggleCapture => {
            if engine.is_capturing() {
                engine.stop();
                UiEvent::Notice("Capture stopped".into())
            } else {
                match engine.start() {
                    Ok(()) => UiEvent::Notice("Capture started".into()),
                    Err(e) => UiEvent::Notice(format!("Start failed: {}", e)),
                }
            }
        }
        Action::Restart => match engine.restart() {
            Ok(()) => UiEvent::Notice("Capture restarted".into()),
            Err(e) => UiEvent::Notice(format!("Restart failed: {}", e)),
        },
        Action::SensitivityUp => UiEvent::Notice(format!("Sensitivity: {:.1}x", engine.increase_sensitivity())),
        Action::SensitivityDown => UiEvent::Notice(format!("Sensitivity: {:.1}x", engine.decrease_sensitivity())),
        Action::CycleDevice => match engine.cycle_device() {
            Ok(()) => UiEvent::Notice(format!("Device: {}", engine.current_device_name())),
            Err(e) => UiEvent::Notice(format!("Device switch failed: {}", e)),
        },
        Action::NextPattern => UiEvent::NextPattern,
        Action::RandomPattern => UiEvent::RandomPattern,
        Action::ToggleShuffle => UiEvent::ToggleShuffle,
        Action::ToggleLayer(index) => UiEvent::ToggleLayer(index),
        Action::ToggleHelp => UiEvent::ToggleHelp,
        Action::Quit => UiEvent::Quit,
    };

    let quit = event == UiEvent::Quit;
    if let UiEvent::Notice(text) = &event {
        log::info!("{}", text);
    }
    // The render loop hanging up means it's already shutting down.
    if ui.send(event).is_err() {
        return false;
    }
    !quit
}

pub struct InputActor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputActor {
    pub fn spawn(engine: Arc<AudioEngine>, ui: Sender<UiEvent>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("milkshaker-input".into())
            .spawn(move || input_loop(&engine, &ui, &flag))?;
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("input thread panicked");
            }
        }
    }
}

impl Drop for InputActor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn input_loop(engine: &AudioEngine, ui: &Sender<UiEvent>, running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        match next_key() {
            Ok(Some(key)) => {
                let Some(action) = action_for(key.code, key.modifiers) else { continue };
                log::debug!("key {:?} -> {:?}", key.code, action);
                if !dispatch(action, engine, ui) {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("reading terminal input failed: {}", e);
                let _ = ui.send(UiEvent::Quit);
                break;
            }
        }
    }
    running.store(false, Ordering::SeqCst);
}

fn next_key() -> io::Result<Option<KeyEvent>> {
    if !event::poll(POLL_INTERVAL)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind != KeyEventKind::Release => Ok(Some(key)),
        _ => Ok(None),
    }
}
