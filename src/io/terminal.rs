//! crossterm key sources.
//!
//! [`TerminalInput`] picks the polled or single-key shape at start-up.
//! [`RawModeGuard`] owns the terminal mode while playing.

use std::{io, time::Duration};

use crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute, terminal,
};

use super::input::{HeldKeys, KeyPoller, KeyRead, KeyReader, PollOutcome, SingleKeyPoller};
use crate::{config::InputMode, error::PollError};

/// Raw mode (and release plus focus reporting, if requested) for as long as
/// this lives.
pub struct RawModeGuard {
    event_types: bool,
}

impl RawModeGuard {
    pub fn enable(event_types: bool) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        if event_types {
            let pushed = execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES),
                EnableFocusChange
            );
            if let Err(err) = pushed {
                let _ = terminal::disable_raw_mode();
                return Err(err);
            }
        }
        Ok(Self { event_types })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.event_types {
            let _ = execute!(io::stdout(), DisableFocusChange, PopKeyboardEnhancementFlags);
        }
        if let Err(err) = terminal::disable_raw_mode() {
            log::warn!("failed to restore terminal mode: {err}");
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Lower-cased so shifted presses and releases land on the same key.
fn key_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c) => c.to_lowercase().next(),
        _ => None,
    }
}

/// Apply one event to the held set. Returns `true` on a quit request.
fn apply_event(held: &mut HeldKeys, event: &Event) -> bool {
    let key = match event {
        Event::Key(key) => key,
        // Releases are not reported while unfocused
        Event::FocusLost => {
            held.clear();
            return false;
        }
        _ => return false,
    };
    if key.kind != KeyEventKind::Release && is_quit(key) {
        return true;
    }
    if let Some(c) = key_char(key) {
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                held.insert(c);
            }
            KeyEventKind::Release => {
                held.remove(&c);
            }
        }
    }
    false
}

/// Tracks press and release events. Needs a terminal with the kitty
/// keyboard protocol (release reporting).
#[derive(Debug, Default)]
pub struct PolledKeys {
    held: HeldKeys,
}

impl KeyPoller for PolledKeys {
    fn poll_held_keys(&mut self, timeout: Duration) -> Result<PollOutcome, PollError> {
        // Wait for the first event, then drain whatever else is queued.
        let mut wait = timeout;
        while event::poll(wait)? {
            wait = Duration::ZERO;
            let event = event::read()?;
            if apply_event(&mut self.held, &event) {
                return Ok(PollOutcome::Shutdown);
            }
        }
        Ok(PollOutcome::Held(self.held.clone()))
    }
}

/// Reads one character press at a time.
#[derive(Debug, Default)]
pub struct TerminalReader;

impl KeyReader for TerminalReader {
    fn read_key(&mut self, timeout: Duration) -> Result<KeyRead, PollError> {
        if !event::poll(timeout)? {
            return Ok(KeyRead::Idle);
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if is_quit(&key) {
                    Ok(KeyRead::Shutdown)
                } else {
                    Ok(key_char(&key).map_or(KeyRead::Idle, KeyRead::Key))
                }
            }
            _ => Ok(KeyRead::Idle),
        }
    }
}

/// The terminal key source, chosen once at start-up.
pub enum TerminalInput {
    Polled(PolledKeys),
    /// Degraded: one key at a time, released after `hold_window` of silence.
    SingleKey(SingleKeyPoller<TerminalReader>),
}

impl TerminalInput {
    pub fn select(mode: InputMode, hold_window: Duration) -> Self {
        let polled = match mode {
            InputMode::Polled => {
                if !terminal::supports_keyboard_enhancement().unwrap_or(false) {
                    log::warn!(
                        "terminal does not report key releases; \
                         polled input will hold every key until Esc"
                    );
                }
                true
            }
            InputMode::SingleKey => false,
            InputMode::Auto => terminal::supports_keyboard_enhancement().unwrap_or(false),
        };

        if polled {
            TerminalInput::Polled(PolledKeys::default())
        } else {
            TerminalInput::SingleKey(SingleKeyPoller::new(TerminalReader, hold_window))
        }
    }

    /// Whether the terminal must be asked to report releases.
    pub fn needs_event_types(&self) -> bool {
        matches!(self, TerminalInput::Polled(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TerminalInput::Polled(_) => "polled (press/release, chords supported)",
            TerminalInput::SingleKey(_) => "single-key (one note at a time)",
        }
    }
}

impl KeyPoller for TerminalInput {
    fn poll_held_keys(&mut self, timeout: Duration) -> Result<PollOutcome, PollError> {
        match self {
            TerminalInput::Polled(keys) => keys.poll_held_keys(timeout),
            TerminalInput::SingleKey(keys) => keys.poll_held_keys(timeout),
        }
    }
}
