use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ToneError;

/*
Phase-Continuous Sine Blocks
============================

A held key is played as a stream of short, fixed-length blocks. Each block is
generated just before it is written to the device, so the generator must be
able to pick up exactly where the previous block stopped.

    sample[n] = amplitude * sin(phase0 + 2π * pitch * n / sample_rate)

The block returns the phase it would have used for sample N (one past the
end). Feeding that back as the next block's phase0 makes the concatenation
identical to a single long block:

    block 1: phase0 ............ phase0 + N1*inc   (= end_phase)
    block 2: end_phase ......... end_phase + N2*inc

If we restarted each block at phase 0 instead, the waveform would jump at
every boundary:

      ╱╲    ╱╲  │╱╲    ╱╲
     ╱  ╲  ╱  ╲ │  ╲  ╱  ╲
    ╱    ╲╱    ╲│   ╲╱    ╲    <- discontinuity = audible click
                ^ block boundary

Precision
---------

The phase for sample n is computed as `phase0 + n * inc` rather than by adding
`inc` n times, so rounding error does not accumulate within a block. The end
phase is wrapped into [0, 2π) so it stays small however long a key is held.
*/

/// Number of samples in a block of `block_duration` seconds.
pub fn block_len(sample_rate: u32, block_duration: f64) -> usize {
    (sample_rate as f64 * block_duration).round() as usize
}

/// A generated block and the phase to start the next one from.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneBlock {
    pub samples: Vec<f32>,
    pub end_phase: f64,
}

/// Validated generator parameters for one pitch.
///
/// Voices build this once at start-up and then call [`ToneParams::fill`] for
/// every block, so no per-block validation or allocation happens while the
/// note sounds.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    pitch: f64,
    sample_rate: u32,
    amplitude: f32,
}

impl ToneParams {
    pub fn new(pitch: f64, sample_rate: u32, amplitude: f32) -> Result<Self, ToneError> {
        if !(pitch.is_finite() && pitch > 0.0) {
            return Err(ToneError::InvalidParameter {
                name: "pitch",
                value: pitch,
            });
        }
        if sample_rate == 0 {
            return Err(ToneError::InvalidParameter {
                name: "sample_rate",
                value: 0.0,
            });
        }
        if !(amplitude.is_finite() && amplitude >= 0.0) {
            return Err(ToneError::InvalidParameter {
                name: "amplitude",
                value: amplitude as f64,
            });
        }

        Ok(Self {
            pitch,
            sample_rate,
            amplitude,
        })
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Phase advance per sample, in radians.
    #[inline]
    pub fn phase_increment(&self) -> f64 {
        TAU * self.pitch / self.sample_rate as f64
    }

    /// Fill `out` starting at `start_phase` and return the end phase.
    pub fn fill(&self, start_phase: f64, out: &mut [f32]) -> f64 {
        let inc = self.phase_increment();
        let amplitude = self.amplitude as f64;

        for (n, sample) in out.iter_mut().enumerate() {
            *sample = (amplitude * (start_phase + inc * n as f64).sin()) as f32;
        }

        wrap_phase(start_phase + inc * out.len() as f64)
    }
}

/// Generate `round(sample_rate * block_duration)` samples of a sine at `pitch`.
///
/// Pass the returned [`ToneBlock::end_phase`] as the next call's
/// `start_phase` to continue the waveform without a discontinuity.
pub fn generate(
    pitch: f64,
    start_phase: f64,
    block_duration: f64,
    sample_rate: u32,
    amplitude: f32,
) -> Result<ToneBlock, ToneError> {
    if !(block_duration.is_finite() && block_duration > 0.0) {
        return Err(ToneError::InvalidParameter {
            name: "block_duration",
            value: block_duration,
        });
    }
    if !start_phase.is_finite() {
        return Err(ToneError::InvalidParameter {
            name: "start_phase",
            value: start_phase,
        });
    }
    let params = ToneParams::new(pitch, sample_rate, amplitude)?;

    let mut samples = vec![0.0f32; block_len(sample_rate, block_duration)];
    let end_phase = params.fill(start_phase, &mut samples);

    Ok(ToneBlock { samples, end_phase })
}

#[inline]
fn wrap_phase(phase: f64) -> f64 {
    phase.rem_euclid(TAU)
}
