//! Unit Conversions and Smoothing Primitives
//!
//! Pitch in this crate is expressed in semitones (MIDI note numbers, with
//! fractional values allowed) and frequencies are normalized to cycles per
//! sample. These helpers convert between the two and provide the one-pole
//! and slope followers used by the envelope and statistics trackers.

use libm::Libm;

/// Reference pitch for A3 (MIDI note 69)
pub const A3_HZ: f64 = 440.0;

/// MIDI note number of the reference pitch
pub const A3_NOTE: f64 = 69.0;

/// Convert a pitch interval in semitones to a frequency ratio
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    Libm::<f64>::exp2(semitones / 12.0)
}

/// Convert a note number to a normalized frequency (cycles per sample)
#[inline]
pub fn note_to_frequency(note: f64, sample_rate: f64) -> f64 {
    semitones_to_ratio(note - A3_NOTE) * A3_HZ / sample_rate
}

/// One-pole low-pass step: move `state` toward `target` by `coefficient`
#[inline]
pub fn one_pole(state: &mut f64, target: f64, coefficient: f64) {
    *state += coefficient * (target - *state);
}

/// Asymmetric follower: rises with `attack`, falls with `decay`
#[inline]
pub fn slope(state: &mut f64, target: f64, attack: f64, decay: f64) {
    let error = target - *state;
    *state += if error > 0.0 { attack } else { decay } * error;
}

/// Round `value` down to a multiple of `step`
#[inline]
pub fn floor_to_multiple(value: usize, step: usize) -> usize {
    value / step * step
}
