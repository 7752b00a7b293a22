//! Per-block control values.
//!
//! `PerformanceState` carries the fast-changing performance gestures (pitch,
//! strum, chord) together with flags describing which inputs are actually
//! patched. `Patch` carries the slower timbre controls. Both are plain values
//! built by the caller for every block.

use serde::{Deserialize, Serialize};

/// Performance gestures for one block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceState {
    /// Pitch offset in semitones (usually the V/Oct input)
    pub note: f64,
    /// Base pitch in semitones
    pub tonic: f64,
    /// Pitch modulation in semitones
    pub fm: f64,
    /// A strike happened during this block
    pub strum: bool,
    /// No external excitation audio is patched
    pub internal_exciter: bool,
    /// No external strum/gate is patched
    pub internal_strum: bool,
    /// No external pitch input is patched
    pub internal_note: bool,
    /// Chord table index
    pub chord: usize,
}

impl Default for PerformanceState {
    fn default() -> Self {
        Self {
            note: 0.0,
            tonic: 48.0,
            fm: 0.0,
            strum: false,
            internal_exciter: true,
            internal_strum: true,
            internal_note: true,
            chord: 0,
        }
    }
}

impl PerformanceState {
    /// Pitch of a voice whose last struck note is `voice_note`
    #[inline]
    pub fn pitch(&self, voice_note: f64) -> f64 {
        voice_note + self.tonic + self.fm
    }
}

/// Timbre controls, each nominally in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    /// Inharmonicity of the mode spectrum
    pub structure: f64,
    /// High-mode content and excitation brightness
    pub brightness: f64,
    /// Decay rate; higher values die out faster
    pub damping: f64,
    /// Excitation point along the modeled object
    pub position: f64,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            structure: 0.25,
            brightness: 0.5,
            damping: 0.5,
            position: 0.3,
        }
    }
}

impl Patch {
    /// Copy with every field clamped to `[0, 1]` (NaN becomes 0)
    pub fn clamped(&self) -> Self {
        fn unit(x: f64) -> f64 {
            if x.is_nan() {
                0.0
            } else {
                x.clamp(0.0, 1.0)
            }
        }
        Self {
            structure: unit(self.structure),
            brightness: unit(self.brightness),
            damping: unit(self.damping),
            position: unit(self.position),
        }
    }
}
