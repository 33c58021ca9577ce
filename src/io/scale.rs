//! Pitch math for laying a scale across a keyboard row.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Letter rows of a QWERTY keyboard.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardRow {
    Top,
    #[default]
    Home,
    Bottom,
}

impl KeyboardRow {
    pub fn keys(self) -> &'static str {
        match self {
            KeyboardRow::Top => "qwertyuiop",
            KeyboardRow::Home => "asdfghjkl",
            KeyboardRow::Bottom => "zxcvbnm",
        }
    }
}

/// `steps + 1` pitches from `base`, each `2^(1/steps)` above the last.
///
/// The last entry is one octave above `base`.
pub fn generate_scale(base: f64, steps: usize) -> Vec<f64> {
    if steps == 0 {
        return vec![base];
    }
    (0..=steps)
        .map(|i| base * 2.0_f64.powf(i as f64 / steps as f64))
        .collect()
}
