//! Runtime for playing a keymap from the terminal.
//!
//! This module provides the `KeyTone` builder, which wires the cpal device,
//! the terminal key source and the [`Dispatcher`] together.
//!
//! # Example
//!
//! ```ignore
//! use keytone::{keymap::Keymap, runtime::KeyTone};
//!
//! fn main() -> color_eyre::Result<()> {
//!     let keymap = Keymap::from_scale("asdfghjkl", 440.0, None)?;
//!     KeyTone::new(keymap).run()
//! }
//! ```

mod app;
pub mod dispatcher;

pub use app::KeyTone;
pub use dispatcher::{CycleReport, Dispatcher, DispatcherState};
