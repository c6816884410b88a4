//! Fixed-point encoding of physical quantities
//!
//! The AD9959 takes frequencies, phases and sweep deltas as binary fractions
//! of a reference scale: a frequency tuning word is the fraction of the system
//! clock, a phase offset word the fraction of a full turn. This module maps
//! physical values onto such fractions and back.
//!
//! A value `v` encoded into `n` bits against the scale `s` becomes the integer
//! `round(v / s * (2^n - 1))`, clamped to `[0, 2^n - 1]` and written as an
//! `n`-bit [`BitString`]. Rounding is round-half-to-even. Decoding is the
//! inverse, `word / (2^n - 1) * s`, so the round trip is off by at most one
//! quantization step `s / (2^n - 1)`.

use core::fmt;

use crate::bits::BitString;


/// Width of frequency tuning words and sweep delta words
pub const FREQUENCY_WIDTH: u32 = 32;

/// Width of phase offset words
pub const PHASE_WIDTH: u32 = 16;

/// The scale phase offsets are normalized against, in degrees
pub const PHASE_SCALE: f64 = 360.0;

/// Width of each half of the linear sweep ramp rate register
pub const RAMP_RATE_WIDTH: u32 = 8;


/// The largest integer that fits into `bit_width` bits
pub fn full_scale(bit_width: u32) -> u64 {
    if bit_width >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_width) - 1
    }
}

/// Encodes `value` as a `bit_width`-bit fraction of `scale`
///
/// Values outside of `[0, scale]` are clamped. Use [`encode_checked`] where
/// such values are not physically meaningful.
pub fn encode(value: f64, bit_width: u32, scale: f64) -> BitString {
    let max = full_scale(bit_width);
    let scaled = (value / scale * max as f64).round_ties_even();

    // NaN lands here as well and encodes as zero.
    let word = if !(scaled > 0.0) {
        0
    } else if scaled >= max as f64 {
        max
    } else {
        scaled as u64
    };

    BitString::from_uint(word, bit_width as usize)
}

/// Encodes `value`, rejecting values outside of `[0, scale]`
pub fn encode_checked(value: f64, bit_width: u32, scale: f64) -> Result<BitString, OutOfRange> {
    check_range(value, 0.0, scale)?;
    Ok(encode(value, bit_width, scale))
}

/// Decodes a fraction of `scale` that was produced by [`encode`]
///
/// The width of the fraction is the length of `bits`.
pub fn decode(bits: &BitString, scale: f64) -> f64 {
    let max = full_scale(bits.len() as u32);
    if max == 0 {
        return 0.0;
    }

    bits.to_uint() as f64 / max as f64 * scale
}

/// Checks that `min <= value <= max`
pub fn check_range(value: f64, min: f64, max: f64) -> Result<(), OutOfRange> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(OutOfRange { value, min, max })
    }
}


/// The duration of one linear sweep ramp step at the given system clock
///
/// The sweep engine runs from `SYNC_CLK`, a quarter of the system clock.
pub fn ramp_step(system_clock_frequency: f64) -> f64 {
    4.0 / system_clock_frequency
}

/// An encoded linear sweep ramp rate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RampRate {
    /// The 8-bit ramp rate word
    pub word: u8,

    /// Whether the requested rate was outside the representable range
    pub clamped: bool,
}

impl RampRate {
    /// Encodes the time per sweep step, in seconds
    ///
    /// The word is `round(rate / step) - 1`, where `step` is the duration of
    /// one `SYNC_CLK` cycle. Rates that don't fit into 8 bits are clamped to
    /// the shortest or longest representable rate instead of being rejected.
    pub fn encode(rate: f64, system_clock_frequency: f64) -> Self {
        let steps = (rate / ramp_step(system_clock_frequency)).round_ties_even() - 1.0;
        let max = full_scale(RAMP_RATE_WIDTH) as f64;

        if !(steps >= 0.0) {
            RampRate {
                word: 0,
                clamped: true,
            }
        } else if steps > max {
            RampRate {
                word: max as u8,
                clamped: true,
            }
        } else {
            RampRate {
                word: steps as u8,
                clamped: false,
            }
        }
    }

    /// The ramp rate this word actually produces, in seconds per step
    pub fn rate(&self, system_clock_frequency: f64) -> f64 {
        (self.word as f64 + 1.0) * ramp_step(system_clock_frequency)
    }

    /// The word as an 8-bit register field
    pub fn bits(&self) -> BitString {
        BitString::from_uint(self.word.into(), RAMP_RATE_WIDTH as usize)
    }
}


/// A frequency tuning word computed ahead of time
///
/// Computing the word is the only floating point work involved in a
/// frequency change. A precomputed word remembers the system clock it was
/// computed for, so it can't silently be applied after the clock changed.
#[derive(Clone, Debug, PartialEq)]
pub struct TuningWord {
    bits: BitString,
    system_clock_frequency: f64,
}

impl TuningWord {
    /// Computes the tuning word for `frequency`
    ///
    /// Fails, if `frequency` is negative or exceeds the system clock.
    pub fn new(frequency: f64, system_clock_frequency: f64) -> Result<Self, OutOfRange> {
        let bits = encode_checked(frequency, FREQUENCY_WIDTH, system_clock_frequency)?;

        Ok(TuningWord {
            bits,
            system_clock_frequency,
        })
    }

    /// The 32 bits of the tuning word
    pub fn bits(&self) -> &BitString {
        &self.bits
    }

    /// The system clock frequency the word was computed for
    pub fn system_clock_frequency(&self) -> f64 {
        self.system_clock_frequency
    }

    /// The closest frequency the chip can produce, which this word encodes
    pub fn frequency(&self) -> f64 {
        decode(&self.bits, self.system_clock_frequency)
    }
}


/// A physical value was outside of its legal range
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutOfRange {
    /// The rejected value
    pub value: f64,
    /// Lower bound of the legal range
    pub min: f64,
    /// Upper bound of the legal range
    pub max: f64,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} is outside of the legal range [{}, {}]",
            self.value, self.min, self.max
        )
    }
}

impl std::error::Error for OutOfRange {}
