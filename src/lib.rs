//! # Quiver Resonator: Modal Voice Engine
//!
//! `quiver-resonator` is a block-based physical-modeling voice engine. An
//! excitation (patched audio, or an internal mallet/pluck burst) drives banks
//! of tuned resonant filters that emulate struck and plucked objects, with
//! strike detection, chords and up to four voices.
//!
//! ## Architecture
//!
//! - **Control** - `Strummer` and `OnsetDetector` decide when a strike
//!   happens; `NoteFilter` stabilizes the incoming pitch
//! - **Excitation** - `Plucker` noise bursts, mallet impulses and the
//!   per-voice excitation filter
//! - **Resonance** - `ResonatorBank`, a batched set of modal filters retuned
//!   every block from structure, brightness, damping and position
//! - **Orchestration** - `Part` allocates voices, spreads chords over banks
//!   and mixes everything onto two buses
//!
//! The processing path never allocates, locks or fails; out-of-range
//! controls are clamped. With default features disabled the crate builds
//! without `std`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quiver_resonator::prelude::*;
//!
//! let mut part = Part::new(PartConfig::new(48000.0));
//! part.set_polyphony(2);
//!
//! let patch = Patch::default();
//! let input = [0.0; MAX_BLOCK_SIZE];
//! let mut out = [0.0; MAX_BLOCK_SIZE];
//! let mut aux = [0.0; MAX_BLOCK_SIZE];
//!
//! // Strike once from an external gate
//! let mut state = PerformanceState {
//!     strum: true,
//!     internal_strum: false,
//!     tonic: 60.0,
//!     ..Default::default()
//! };
//! part.process(&mut state, &patch, &input, &mut out, &mut aux);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod chords;
pub mod config;
pub mod delay;
pub mod filter;
pub mod note_filter;
pub mod onset;
pub mod part;
pub mod performance;
pub mod plucker;
pub mod polyphony;
pub mod resonator;
pub mod rng;
pub mod strummer;
pub mod units;

/// Largest block processed in one pass; also the control-rate decimation
pub const MAX_BLOCK_SIZE: usize = 24;

/// Prelude module for convenient imports
pub mod prelude {
    // Orchestration
    pub use crate::part::{Part, ResonatorModel, NUM_BANKS};
    pub use crate::performance::{Patch, PerformanceState};

    // Configuration
    pub use crate::config::{ConfigError, PartConfig};

    // Control
    pub use crate::note_filter::NoteFilter;
    pub use crate::onset::{Compressor, OnsetDetector, ZScorer};
    pub use crate::strummer::{Strummer, TriggerSource};

    // Excitation and resonance
    pub use crate::plucker::Plucker;
    pub use crate::resonator::{
        stiffness, ModeTuning, ResonatorBank, MAX_MODES, MAX_MODE_FREQUENCY, MODE_BATCH_SIZE,
    };

    // Voices and chords
    pub use crate::chords::{chord, chord_size, NUM_CHORDS};
    pub use crate::polyphony::{AllocationMode, Voice, VoiceAllocator, MAX_POLYPHONY};

    // Primitives
    pub use crate::delay::DelayLine;
    pub use crate::filter::{DcBlocker, FilterTap, NaiveSvf, Svf};
    pub use crate::rng::Rng;
    pub use crate::units::{note_to_frequency, semitones_to_ratio};

    pub use crate::MAX_BLOCK_SIZE;
}

// Re-export key types at crate root for convenience
pub use prelude::*;
