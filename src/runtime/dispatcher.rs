//! Dispatcher - the control loop
//!
//! Each cycle turns the set of held keys into voice lifecycle calls: start a
//! voice for every newly held mapped key, stop and reap voices whose key was
//! let go. It never waits on audio for longer than a bounded reap timeout.

use std::{collections::BTreeSet, sync::Arc, time::Instant};

use crate::{
    config::EngineConfig,
    error::{EngineError, VoiceError},
    io::{
        audio::AudioDevice,
        input::{HeldKeys, KeyPoller, PollOutcome},
    },
    keymap::Keymap,
    synth::{Reap, VoiceExit, VoiceRegistry, VoiceSettings},
};

/// Descriptive only; every cycle runs the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No keys held.
    Idle,
    /// At least one key held.
    Active,
}

/// What happened during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Voices spawned this cycle.
    pub started: Vec<char>,
    /// Voices reaped after their key was released (or after they exited).
    pub stopped: Vec<char>,
    /// Notes that failed to start or died while held.
    pub dropped: Vec<char>,
    /// Released keys whose voice has not exited yet; retried next cycle.
    pub pending: Vec<char>,
}

pub struct Dispatcher {
    keymap: Keymap,
    config: EngineConfig,
    registry: VoiceRegistry,
    /// Held keys whose note failed; not retried until the key is released.
    dropped: BTreeSet<char>,
    state: DispatcherState,
}

impl Dispatcher {
    pub fn new(
        keymap: Keymap,
        config: EngineConfig,
        device: Arc<dyn AudioDevice>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let registry = VoiceRegistry::new(device, VoiceSettings::from(&config));

        Ok(Self {
            keymap,
            config,
            registry,
            dropped: BTreeSet::new(),
            state: DispatcherState::Idle,
        })
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Poll and step until the poller asks to quit or fails, then stop and
    /// reap every voice.
    pub fn run<P: KeyPoller>(&mut self, poller: &mut P) -> Result<(), EngineError> {
        let result = self.poll_loop(poller);
        if let Err(err) = &result {
            log::error!("control loop stopped: {err}");
        }
        self.shutdown();
        result
    }

    fn poll_loop<P: KeyPoller>(&mut self, poller: &mut P) -> Result<(), EngineError> {
        loop {
            match poller.poll_held_keys(self.config.poll_interval)? {
                PollOutcome::Held(held) => {
                    self.step(&held)?;
                }
                PollOutcome::Shutdown => {
                    log::info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// Run one cycle against the given held keys.
    ///
    /// Only [`EngineError::InvalidParameter`] escapes; device failures drop the
    /// affected note and the loop carries on.
    pub fn step(&mut self, held: &HeldKeys) -> Result<CycleReport, EngineError> {
        let mut report = CycleReport::default();
        self.update_state(held);

        // A released key gets another chance on its next press
        self.dropped.retain(|key| held.contains(key));

        // Voices that failed to open, died mid-note, or finished stopping
        // since last cycle
        for (key, exit) in self.registry.collect_finished() {
            let failed = exit.is_err();
            log_exit(key, &exit);
            if failed {
                report.dropped.push(key);
                if held.contains(&key) {
                    self.dropped.insert(key);
                }
            } else {
                report.stopped.push(key);
            }
        }

        for &key in held {
            let Some(pitch) = self.keymap.pitch(key) else {
                log::trace!("ignoring unmapped key {key:?}");
                continue;
            };
            if self.dropped.contains(&key) || self.registry.is_live_or_pending(key) {
                continue;
            }

            match self.registry.spawn(key, pitch) {
                Ok(()) => {
                    log::info!("note on  {key:?} {pitch:.2} Hz");
                    report.started.push(key);
                }
                Err(VoiceError::DuplicateVoice(_)) => {}
                Err(VoiceError::InvalidParameter(source)) => {
                    return Err(EngineError::InvalidParameter { key, source });
                }
                Err(err @ (VoiceError::Device(_) | VoiceError::Spawn(_))) => {
                    log::warn!("note {key:?} ({pitch:.2} Hz) dropped: {err}");
                    self.dropped.insert(key);
                    report.dropped.push(key);
                }
            }
        }

        let released: Vec<char> = self
            .registry
            .keys()
            .filter(|key| !held.contains(key))
            .collect();
        for key in released {
            self.registry.request_stop(key);
            match self.registry.reap(key, self.config.reap_timeout) {
                Reap::Reaped(exit) => {
                    let failed = exit.is_err();
                    log_exit(key, &exit);
                    if failed {
                        report.dropped.push(key);
                    } else {
                        report.stopped.push(key);
                    }
                }
                Reap::Pending => report.pending.push(key),
                Reap::Absent => {}
            }
        }

        Ok(report)
    }

    /// Stop every voice and reap them.
    ///
    /// Waits for `shutdown_timeout`, or for as long as a voice can take to
    /// finish its in-flight write if that is longer. Returns the keys whose
    /// voices still had not exited; only a device that hangs past its own
    /// write timeout leaves any. Their threads were told to stop and are left
    /// to finish on their own.
    pub fn shutdown(&mut self) -> Vec<char> {
        self.registry.stop_all();
        let limit = self
            .config
            .shutdown_timeout
            .max(self.config.max_stop_latency());
        let deadline = Instant::now() + limit;

        while !self.registry.is_empty() {
            let keys: Vec<char> = self.registry.keys().collect();
            for key in keys {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let wait = self.config.reap_timeout.min(remaining);
                if let Reap::Reaped(exit) = self.registry.reap(key, wait) {
                    log_exit(key, &exit);
                }
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        let abandoned = self.registry.abandon();
        for key in &abandoned {
            log::warn!("voice {key:?} did not stop within {limit:?}");
        }
        self.dropped.clear();
        self.state = DispatcherState::Idle;
        abandoned
    }

    fn update_state(&mut self, held: &HeldKeys) {
        let next = if held.is_empty() {
            DispatcherState::Idle
        } else {
            DispatcherState::Active
        };
        if next != self.state {
            log::trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.shutdown();
        }
    }
}

fn log_exit(key: char, exit: &VoiceExit) {
    match exit {
        Ok(report) => log::info!(
            "note off {key:?} after {} block(s)",
            report.blocks_written
        ),
        Err(err) => log::warn!("note {key:?} failed: {err}"),
    }
}
