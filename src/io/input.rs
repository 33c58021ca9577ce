//! Input boundary: which keys are down right now.
//!
//! Two shapes of key source exist. Terminals that report key releases give us
//! the full set of held keys ([`KeyPoller`]). Plain terminals only hand over
//! one character at a time ([`KeyReader`]); [`SingleKeyPoller`] adapts those
//! to the polling shape so the dispatcher only ever sees held-key sets.

use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use crate::error::PollError;

/// Keys currently held down.
pub type HeldKeys = BTreeSet<char>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Held(HeldKeys),
    /// The user asked to quit.
    Shutdown,
}

/// A source that reports every held key each cycle.
pub trait KeyPoller {
    /// Wait up to `timeout` for input, then report the held keys.
    fn poll_held_keys(&mut self, timeout: Duration) -> Result<PollOutcome, PollError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRead {
    Key(char),
    /// Nothing arrived before the timeout.
    Idle,
    Shutdown,
}

/// A source that yields one key press (or auto-repeat) at a time.
pub trait KeyReader {
    fn read_key(&mut self, timeout: Duration) -> Result<KeyRead, PollError>;
}

/*
Degraded Mode: Holding Keys Without Release Events
==================================================

A plain terminal sends a character when a key goes down and then, after a
delay, repeats it while the key stays down. Nothing is sent on release.

    key down                                  key up
    │                                         │
    a ─────────── a ── a ── a ── a ── a ── a ─┤  (silence)
    |<- repeat delay ->|<- repeat rate ->|    |<- hold_window ->| released

So a key counts as held while it keeps arriving, and as released once
`hold_window` passes without it. The window has to outlast the initial
repeat delay or every note would stutter after its first character.

Terminals only repeat the most recent key, so a second key replaces the
first: this mode plays one note at a time.
*/

/// Adapts a [`KeyReader`] to [`KeyPoller`] by treating a key as held while it
/// keeps repeating.
pub struct SingleKeyPoller<R> {
    reader: R,
    hold_window: Duration,
    current: Option<(char, Instant)>,
}

impl<R: KeyReader> SingleKeyPoller<R> {
    pub fn new(reader: R, hold_window: Duration) -> Self {
        Self {
            reader,
            hold_window,
            current: None,
        }
    }
}

impl<R: KeyReader> KeyPoller for SingleKeyPoller<R> {
    fn poll_held_keys(&mut self, timeout: Duration) -> Result<PollOutcome, PollError> {
        match self.reader.read_key(timeout)? {
            KeyRead::Key(key) => self.current = Some((key, Instant::now())),
            KeyRead::Idle => {}
            KeyRead::Shutdown => return Ok(PollOutcome::Shutdown),
        }

        if let Some((_, seen)) = self.current {
            if seen.elapsed() > self.hold_window {
                self.current = None;
            }
        }

        Ok(PollOutcome::Held(self.current.map(|(key, _)| key).into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::VecDeque, thread};

    struct Scripted(VecDeque<KeyRead>);

    impl KeyReader for Scripted {
        fn read_key(&mut self, _timeout: Duration) -> Result<KeyRead, PollError> {
            self.0.pop_front().ok_or(PollError::Disconnected)
        }
    }

    fn poller(reads: impl IntoIterator<Item = KeyRead>, hold_ms: u64) -> SingleKeyPoller<Scripted> {
        SingleKeyPoller::new(
            Scripted(reads.into_iter().collect()),
            Duration::from_millis(hold_ms),
        )
    }

    fn held(keys: &[char]) -> PollOutcome {
        PollOutcome::Held(keys.iter().copied().collect())
    }

    #[test]
    fn key_stays_held_within_window() {
        let mut poller = poller([KeyRead::Key('a'), KeyRead::Idle, KeyRead::Idle], 10_000);
        let timeout = Duration::ZERO;
        assert_eq!(poller.poll_held_keys(timeout).unwrap(), held(&['a']));
        assert_eq!(poller.poll_held_keys(timeout).unwrap(), held(&['a']));
        assert_eq!(poller.poll_held_keys(timeout).unwrap(), held(&['a']));
    }

    #[test]
    fn key_released_after_window() {
        let mut poller = poller([KeyRead::Key('a'), KeyRead::Idle], 20);
        assert_eq!(poller.poll_held_keys(Duration::ZERO).unwrap(), held(&['a']));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(poller.poll_held_keys(Duration::ZERO).unwrap(), held(&[]));
    }

    #[test]
    fn new_key_replaces_previous() {
        let mut poller = poller([KeyRead::Key('a'), KeyRead::Key('s')], 10_000);
        poller.poll_held_keys(Duration::ZERO).unwrap();
        assert_eq!(poller.poll_held_keys(Duration::ZERO).unwrap(), held(&['s']));
    }

    #[test]
    fn shutdown_and_errors_pass_through() {
        let mut poller = poller([KeyRead::Shutdown], 100);
        assert_eq!(
            poller.poll_held_keys(Duration::ZERO).unwrap(),
            PollOutcome::Shutdown
        );
        assert!(matches!(
            poller.poll_held_keys(Duration::ZERO),
            Err(PollError::Disconnected)
        ));
    }
}
