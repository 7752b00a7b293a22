//! Polyphony Support
//!
//! This module provides voice allocation and per-voice excitation state for
//! the resonator engine.
//!
//! # Architecture
//!
//! - `VoiceAllocator` - Picks which voice the next strike lands on
//! - `Voice` - A single voice with its pitch, exciter and excitation filter
//!
//! Voices are created once for `MAX_POLYPHONY` and reused; changing the
//! polyphony only changes how many of them are rendered.

use crate::filter::Svf;
use crate::plucker::Plucker;
use crate::rng::Rng;

/// Compile-time voice count
pub const MAX_POLYPHONY: usize = 4;

/// Voice order used when an odd polyphony above one cannot alternate evenly
pub const PING_PATTERN: [usize; 8] = [1, 0, 2, 1, 0, 2, 1, 0];

/// Clamp a requested polyphony to `[1, MAX_POLYPHONY]`
#[inline]
pub fn clamp_polyphony(polyphony: usize) -> usize {
    polyphony.clamp(1, MAX_POLYPHONY)
}

/// Voice allocation algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMode {
    /// Cycle through voices in order
    #[default]
    RoundRobin,
    /// Follow `PING_PATTERN`
    PingPattern,
}

impl AllocationMode {
    /// Mode used at a given polyphony
    pub fn for_polyphony(polyphony: usize) -> Self {
        if polyphony > 1 && polyphony & 1 == 1 {
            Self::PingPattern
        } else {
            Self::RoundRobin
        }
    }
}

/// Voice allocator for strike-driven polyphony
#[derive(Debug, Clone)]
pub struct VoiceAllocator {
    /// Number of sounding voices
    polyphony: usize,
    /// Voice receiving the current note
    active_voice: usize,
    /// Position in `PING_PATTERN`
    step_counter: usize,
}

impl VoiceAllocator {
    /// Create a new voice allocator
    pub fn new(polyphony: usize) -> Self {
        Self {
            polyphony: clamp_polyphony(polyphony),
            active_voice: 0,
            step_counter: 0,
        }
    }

    /// Set the polyphony, clamping out-of-range requests.
    ///
    /// Returns the polyphony actually applied. The active voice is not
    /// moved; call `wrap_active_voice` once the change takes effect.
    pub fn set_polyphony(&mut self, polyphony: usize) -> usize {
        let clamped = clamp_polyphony(polyphony);
        if clamped != polyphony {
            log::warn!(
                "polyphony {} out of range, clamped to {}",
                polyphony,
                clamped
            );
        }
        self.polyphony = clamped;
        clamped
    }

    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    pub fn active_voice(&self) -> usize {
        self.active_voice
    }

    /// Get the allocation mode
    pub fn mode(&self) -> AllocationMode {
        AllocationMode::for_polyphony(self.polyphony)
    }

    /// Move to the voice for the next strike and return it
    pub fn advance(&mut self) -> usize {
        self.active_voice = match self.mode() {
            AllocationMode::PingPattern => {
                let voice = PING_PATTERN[self.step_counter % PING_PATTERN.len()];
                self.step_counter = (self.step_counter + 1) % PING_PATTERN.len();
                voice
            }
            AllocationMode::RoundRobin => (self.active_voice + 1) % self.polyphony,
        };
        self.active_voice
    }

    /// Restart from voice 0 if the active voice no longer exists
    pub fn wrap_active_voice(&mut self) {
        if self.active_voice >= self.polyphony {
            self.active_voice = 0;
        }
    }

    pub fn reset(&mut self) {
        self.active_voice = 0;
        self.step_counter = 0;
    }
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A single voice in a polyphonic context
#[derive(Debug, Clone)]
pub struct Voice {
    /// Voice index (0 to MAX_POLYPHONY - 1)
    pub index: usize,
    /// Note offset in semitones, before tonic and FM
    pub note: f64,
    /// Internal noise-burst exciter
    pub plucker: Plucker,
    /// Low-pass applied to the excitation
    pub excitation_filter: Svf,
}

impl Voice {
    /// Create a voice whose plucker draws from noise stream `index` of `seed`
    pub fn new(index: usize, seed: u64) -> Self {
        Self {
            index,
            note: 0.0,
            plucker: Plucker::new(Rng::stream(seed, index)),
            excitation_filter: Svf::new(),
        }
    }

    /// Silence the voice's exciter and filter; the note is kept.
    pub fn reset(&mut self) {
        self.plucker.reset();
        self.excitation_filter.reset();
    }
}
