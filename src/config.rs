//! Engine tunables.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest block a voice may generate at once.
pub const MAX_BLOCK_DURATION: Duration = Duration::from_secs(5);

/// Blocks of audio queued between a voice and the output device.
pub const DEVICE_BUFFER_BLOCKS: u32 = 2;

/// How held keys are read from the terminal.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Use press/release reporting when the terminal supports it, otherwise
    /// fall back to [`InputMode::SingleKey`].
    #[default]
    Auto,
    /// Track press and release events. Supports chords.
    Polled,
    /// Read one key at a time and treat it as held while it auto-repeats.
    /// Cannot detect several keys going down together.
    SingleKey,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Length of each block a voice generates and writes.
    pub block_duration: Duration,
    /// Peak level of each voice, in (0, 1].
    pub amplitude: f32,
    /// How long one reap attempt may wait for a voice thread per cycle.
    pub reap_timeout: Duration,
    /// How long shutdown waits for voices to exit. Never less than
    /// [`EngineConfig::max_stop_latency`].
    pub shutdown_timeout: Duration,
    /// How long the poller waits for input each cycle.
    pub poll_interval: Duration,
    /// Single-key mode: how long a key counts as held after its last repeat.
    pub hold_window: Duration,
    pub input_mode: InputMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_duration: Duration::from_millis(100),
            amplitude: 0.25,
            reap_timeout: Duration::from_millis(5),
            shutdown_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            hold_window: Duration::from_millis(650),
            input_mode: InputMode::Auto,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = block_duration;
        self
    }

    pub fn amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn reap_timeout(mut self, reap_timeout: Duration) -> Self {
        self.reap_timeout = reap_timeout;
        self
    }

    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn hold_window(mut self, hold_window: Duration) -> Self {
        self.hold_window = hold_window;
        self
    }

    pub fn input_mode(mut self, input_mode: InputMode) -> Self {
        self.input_mode = input_mode;
        self
    }

    /// Samples per block at the configured rate.
    pub fn block_len(&self) -> usize {
        crate::dsp::tone::block_len(self.sample_rate, self.block_duration.as_secs_f64())
    }

    /// Audio queued ahead of playback for each voice.
    pub fn device_buffer(&self) -> Duration {
        self.block_duration * DEVICE_BUFFER_BLOCKS
    }

    /// Longest a voice can take to exit after a stop request: a write that
    /// stalls until the device write timeout (twice the buffer), plus the
    /// block being generated.
    pub fn max_stop_latency(&self) -> Duration {
        self.device_buffer() * 2 + self.block_duration
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError {
                field: "sample_rate",
                reason: "must be positive",
            });
        }
        if self.block_len() == 0 {
            return Err(ConfigError {
                field: "block_duration",
                reason: "must hold at least one sample",
            });
        }
        if self.block_duration > MAX_BLOCK_DURATION {
            return Err(ConfigError {
                field: "block_duration",
                reason: "must not exceed 5 seconds",
            });
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(ConfigError {
                field: "amplitude",
                reason: "must be within (0, 1]",
            });
        }
        if self.shutdown_timeout < self.reap_timeout {
            return Err(ConfigError {
                field: "shutdown_timeout",
                reason: "must not be shorter than reap_timeout",
            });
        }
        Ok(())
    }
}
