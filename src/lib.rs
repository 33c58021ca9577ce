pub mod config;
pub mod dsp; // Tone generation
pub mod error;
pub mod io;
pub mod keymap;
pub mod runtime; // Dispatcher and terminal app
pub mod synth; // Voices and the voice registry

pub use config::{EngineConfig, InputMode};
pub use error::{DeviceError, EngineError, PollError, ToneError, VoiceError};
pub use keymap::Keymap;
