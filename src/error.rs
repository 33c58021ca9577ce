//! Error types shared across the engine.
//!
//! Each layer has its own enum so callers can tell a dropped note
//! ([`DeviceError`]) apart from a programming mistake ([`ToneError`]) or a
//! dead input source ([`PollError`]).

use std::time::Duration;

use thiserror::Error;

/// Bad arguments handed to the tone generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToneError {
    #[error("invalid parameter: {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Failures opening or writing an audio output stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default output device available")]
    NoOutputDevice,

    #[error("output device {0:?} not found")]
    DeviceNotFound(String),

    #[error("device does not support {sample_rate} Hz f32 output")]
    UnsupportedConfig { sample_rate: u32 },

    #[error("failed to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to query supported stream configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("output stream failed: {0}")]
    StreamFailed(String),

    #[error("device accepted no samples for {0:?}")]
    WriteTimeout(Duration),
}

/// Why a voice could not be started.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error(transparent)]
    InvalidParameter(#[from] ToneError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("voice for key {0:?} is still live")]
    DuplicateVoice(char),

    #[error("failed to spawn voice thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The input source stopped working.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("terminal input failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("input source disconnected")]
    Disconnected,
}

/// Problems building a [`Keymap`](crate::keymap::Keymap).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeymapError {
    #[error("keymap has no keys")]
    Empty,

    #[error("key {0:?} is mapped more than once")]
    DuplicateKey(char),

    #[error("key {key:?} has invalid pitch {pitch}")]
    InvalidPitch { key: char, pitch: f64 },

    #[error("{keys} keys but only {pitches} pitches")]
    NotEnoughPitches { keys: usize, pitches: usize },
}

/// An [`EngineConfig`](crate::config::EngineConfig) field out of range.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid config: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Errors that end the control loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keymap(#[from] KeymapError),

    #[error("voice for key {key:?} rejected its parameters: {source}")]
    InvalidParameter { key: char, source: ToneError },

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
