//! Strike Decision
//!
//! The `Strummer` turns whatever is patched into one strike decision per
//! block. The trigger source is chosen first from the patching flags of the
//! `PerformanceState`, then a block-based inhibit countdown debounces the
//! result.

use crate::config::PartConfig;
use crate::onset::OnsetDetector;
use crate::performance::PerformanceState;
use crate::units::A3_NOTE;

/// Where strikes come from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// A strum/gate input is patched; its value passes through
    External,
    /// Only the pitch input is patched; pitch jumps strike
    PitchChange,
    /// Only excitation audio is patched; detected onsets strike
    AudioOnset,
    /// Nothing to strike from
    Unpatched,
}

impl TriggerSource {
    pub fn select(state: &PerformanceState) -> Self {
        if !state.internal_strum {
            Self::External
        } else if !state.internal_note {
            Self::PitchChange
        } else if !state.internal_exciter {
            Self::AudioOnset
        } else {
            Self::Unpatched
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strummer {
    onset_detector: OnsetDetector,
    inhibit_time: u32,
    onset_inhibit_multiplier: u32,
    note_change_threshold: f64,
    inhibit_counter: u32,
    previous_note: f64,
}

impl Strummer {
    pub fn new(config: &PartConfig) -> Self {
        let block_rate = config.block_rate();
        let inhibit_time = (config.strum_inhibit_time * block_rate) as u32;
        Self {
            onset_detector: OnsetDetector::new(
                config.sample_rate,
                block_rate,
                config.strum_inhibit_time,
            ),
            inhibit_time,
            onset_inhibit_multiplier: config.onset_inhibit_multiplier,
            note_change_threshold: config.note_change_threshold,
            inhibit_counter: 0,
            previous_note: A3_NOTE,
        }
    }

    /// Decide this block's strike and store it in `state.strum`.
    ///
    /// `excitation` is the patched excitation audio, if any; the onset
    /// detector sees every block of it so its statistics stay current.
    pub fn process(&mut self, excitation: Option<&[f64]>, state: &mut PerformanceState) {
        let has_onset = match excitation {
            Some(samples) => self.onset_detector.process(samples),
            None => false,
        };

        let mut inhibit_time = self.inhibit_time;
        match TriggerSource::select(state) {
            TriggerSource::External => {}
            TriggerSource::PitchChange => {
                state.strum = (state.note - self.previous_note).abs() > self.note_change_threshold;
            }
            TriggerSource::AudioOnset => {
                state.strum = has_onset;
                inhibit_time = inhibit_time.saturating_mul(self.onset_inhibit_multiplier);
            }
            TriggerSource::Unpatched => state.strum = false,
        }

        if self.inhibit_counter > 0 {
            self.inhibit_counter -= 1;
            state.strum = false;
        } else if state.strum {
            self.inhibit_counter = inhibit_time;
        }

        self.previous_note = state.note;
    }

    /// Blocks remaining before another strike is accepted
    pub fn inhibit_counter(&self) -> u32 {
        self.inhibit_counter
    }

    pub fn reset(&mut self) {
        self.onset_detector.reset();
        self.inhibit_counter = 0;
        self.previous_note = A3_NOTE;
    }
}
