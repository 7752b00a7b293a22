//! Chord Table
//!
//! Semitone offsets sounded together by one voice, indexed by polyphony and
//! chord number. Chord 0 is a single note at every polyphony; the remaining
//! chords are octave-spread voicings that get narrower as polyphony rises,
//! because each voice then has fewer resonator banks to spend.

use crate::polyphony::MAX_POLYPHONY;

/// Number of selectable chords
pub const NUM_CHORDS: usize = 12;

const UNISON: [f64; 1] = [0.0];

const CHORDS_1: [[f64; 8]; NUM_CHORDS - 1] = [
    [-12.0, 0.0, 0.01, 0.02, 0.03, 11.98, 11.99, 12.0],
    [-12.0, 0.0, 3.0, 3.01, 7.0, 9.99, 10.0, 19.0],
    [-12.0, 0.0, 3.0, 3.01, 7.0, 11.99, 12.0, 19.0],
    [-12.0, 0.0, 3.0, 3.01, 7.0, 13.99, 14.0, 19.0],
    [-12.0, 0.0, 3.0, 3.01, 7.0, 16.99, 17.0, 19.0],
    [-12.0, 0.0, 6.98, 6.99, 7.0, 12.00, 18.99, 19.0],
    [-12.0, 0.0, 3.99, 4.0, 7.0, 16.99, 17.0, 19.0],
    [-12.0, 0.0, 3.99, 4.0, 7.0, 13.99, 14.0, 19.0],
    [-12.0, 0.0, 3.99, 4.0, 7.0, 11.99, 12.0, 19.0],
    [-12.0, 0.0, 3.99, 4.0, 7.0, 10.99, 11.0, 19.0],
    [-12.0, 0.0, 4.99, 5.0, 7.0, 11.99, 12.0, 17.0],
];

const CHORDS_2: [[f64; 4]; NUM_CHORDS - 1] = [
    [-12.0, 0.0, 0.01, 12.0],
    [-12.0, 3.0, 7.0, 10.0],
    [-12.0, 3.0, 7.0, 12.0],
    [-12.0, 3.0, 7.0, 14.0],
    [-12.0, 3.0, 7.0, 17.0],
    [-12.0, 7.0, 12.0, 19.0],
    [-12.0, 4.0, 7.0, 17.0],
    [-12.0, 4.0, 7.0, 14.0],
    [-12.0, 4.0, 7.0, 12.0],
    [-12.0, 4.0, 7.0, 11.0],
    [-12.0, 5.0, 7.0, 12.0],
];

/// Shared by polyphony 3 and 4
const CHORDS_3: [[f64; 2]; NUM_CHORDS - 1] = [
    [0.0, -12.0],
    [0.0, 0.01],
    [0.0, 2.0],
    [0.0, 3.0],
    [0.0, 4.0],
    [0.0, 5.0],
    [0.0, 7.0],
    [0.0, 10.0],
    [0.0, 11.0],
    [0.0, 12.0],
    [-12.0, 12.0],
];

/// Notes per chord (other than chord 0) at the given polyphony
pub fn chord_size(polyphony: usize) -> usize {
    match polyphony.clamp(1, MAX_POLYPHONY) {
        1 => 8,
        2 => 4,
        _ => 2,
    }
}

/// Semitone offsets of `chord` at `polyphony`. Both indices are clamped.
pub fn chord(polyphony: usize, chord: usize) -> &'static [f64] {
    let chord = chord.min(NUM_CHORDS - 1);
    if chord == 0 {
        return &UNISON;
    }
    let row = chord - 1;
    match polyphony.clamp(1, MAX_POLYPHONY) {
        1 => &CHORDS_1[row],
        2 => &CHORDS_2[row],
        _ => &CHORDS_3[row],
    }
}
