//! KeyTone - application builder and runner

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use crate::{
    config::EngineConfig,
    io::{
        audio::CpalDevice,
        terminal::{RawModeGuard, TerminalInput},
    },
    keymap::Keymap,
};

/// Main application builder
pub struct KeyTone {
    keymap: Keymap,
    config: EngineConfig,
    device: CpalDevice,
    sample_rate: Option<u32>,
}

impl KeyTone {
    /// Create a new KeyTone instance playing `keymap`
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            config: EngineConfig::default(),
            device: CpalDevice::default_output(),
            sample_rate: None,
        }
    }

    /// Replace the engine settings
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Play on a specific output device
    pub fn device(mut self, device: CpalDevice) -> Self {
        self.device = device;
        self
    }

    /// Force a sample rate instead of the device default
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Run the application (takes over the terminal until Esc / Ctrl+C)
    pub fn run(self) -> EyreResult<()> {
        let (device_name, default_rate) = self
            .device
            .describe()
            .wrap_err("failed to query output device")?;

        let mut config = self.config;
        config.sample_rate = self.sample_rate.unwrap_or(default_rate);

        let device = self.device.buffer(config.device_buffer());
        let mut input = TerminalInput::select(config.input_mode, config.hold_window);

        println!("=== KeyTone ===");
        println!("Device: {}", device_name);
        println!("Sample rate: {} Hz", config.sample_rate);
        println!("Block: {:?}", config.block_duration);
        println!("Input: {}", input.describe());
        println!();
        for (key, pitch) in self.keymap.iter() {
            println!("  [{}] {:>8.2} Hz", key, pitch);
        }
        println!();
        println!("Hold keys to play... Press Esc or Ctrl+C to stop");
        println!();

        let mut dispatcher = Dispatcher::new(self.keymap, config, Arc::new(device))
            .wrap_err("invalid engine configuration")?;

        let raw_mode = RawModeGuard::enable(input.needs_event_types())
            .wrap_err("failed to switch terminal to raw mode")?;
        let result = dispatcher.run(&mut input);
        drop(raw_mode);

        result.wrap_err("keyboard loop failed")
    }
}
