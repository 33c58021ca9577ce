//! Key → pitch mapping.
//!
//! Built once at start-up and read-only afterwards. Every pitch is checked
//! here, so voices started from a [`Keymap`] never hand the tone generator an
//! invalid frequency.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::KeymapError, io::scale::generate_scale};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Keymap {
    /// Keyboard order is kept for display; lookups are linear over a handful of keys.
    entries: Vec<(char, f64)>,
}

impl Keymap {
    pub fn new(entries: impl IntoIterator<Item = (char, f64)>) -> Result<Self, KeymapError> {
        let mut checked: Vec<(char, f64)> = Vec::new();
        for (key, pitch) in entries {
            if checked.iter().any(|&(k, _)| k == key) {
                return Err(KeymapError::DuplicateKey(key));
            }
            if !(pitch.is_finite() && pitch > 0.0) {
                return Err(KeymapError::InvalidPitch { key, pitch });
            }
            checked.push((key, pitch));
        }

        if checked.is_empty() {
            return Err(KeymapError::Empty);
        }
        Ok(Self { entries: checked })
    }

    /// Lay a scale starting at `base` across `keys`, one step per key.
    ///
    /// `steps` defaults to the number of keys, so the key after the last one
    /// would land on the octave.
    pub fn from_scale(keys: &str, base: f64, steps: Option<usize>) -> Result<Self, KeymapError> {
        let keys: Vec<char> = keys.chars().collect();
        let steps = steps.unwrap_or(keys.len());
        let scale = generate_scale(base, steps);
        if scale.len() < keys.len() {
            return Err(KeymapError::NotEnoughPitches {
                keys: keys.len(),
                pitches: scale.len(),
            });
        }
        Self::new(keys.into_iter().zip(scale))
    }

    pub fn pitch(&self, key: char) -> Option<f64> {
        self.entries
            .iter()
            .find(|&&(k, _)| k == key)
            .map(|&(_, pitch)| pitch)
    }

    pub fn contains(&self, key: char) -> bool {
        self.pitch(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
