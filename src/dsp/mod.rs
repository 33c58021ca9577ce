//! Signal generation primitives.
//!
//! These are pure functions of their inputs and safe to call from any number
//! of voice threads at once.

/// Phase-continuous sine block generator.
pub mod tone;

pub use tone::{generate, ToneBlock, ToneParams};
