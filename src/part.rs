//! Part: the voice engine
//!
//! A `Part` owns every voice, resonator bank and control follower, and turns
//! one block of excitation plus the performance/patch controls into two
//! output buses. Per block it:
//!
//! 1. applies pending polyphony/model changes
//! 2. once every `MAX_BLOCK_SIZE` samples, lets the `Strummer` decide
//!    whether to strike, moves the strike to the next voice and updates
//!    voice pitches
//! 3. renders each voice: excitation filter, internal exciter, then one
//!    resonator bank per chord note
//! 4. mixes voices onto the buses and removes DC
//!
//! All storage is inline; nothing allocates after construction.

use crate::chords;
use crate::config::PartConfig;
use crate::filter::{DcBlocker, FilterTap, MAX_SVF_FREQUENCY, MIN_FREQUENCY};
use crate::note_filter::NoteFilter;
use crate::performance::{Patch, PerformanceState};
use crate::polyphony::{Voice, VoiceAllocator, MAX_POLYPHONY};
use crate::resonator::{ResonatorBank, MAX_MODES, MODE_BATCH_SIZE};
use crate::strummer::Strummer;
use crate::units::{floor_to_multiple, note_to_frequency, semitones_to_ratio};
use crate::MAX_BLOCK_SIZE;
use libm::Libm;
use serde::{Deserialize, Serialize};

/// Resonator banks shared by all voices
pub const NUM_BANKS: usize = 2 * MAX_POLYPHONY;

/// Cutoff of the excitation filter on voices that are not being struck, in Hz
const INACTIVE_CUTOFF_HZ: f64 = 10.0;

/// DC blocker corner, in Hz
const DC_BLOCKER_HZ: f64 = 10.0;

/// Level of note 0 fed to the other chord notes
const SYMPATHETIC_GAIN: f64 = 0.2;

/// Which exciter and filter taps the resonators use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResonatorModel {
    /// Mallet impulse, band-pass modes
    #[default]
    Modal,
    /// Plucked noise burst, low-passed fundamental batch
    Plucked,
}

impl ResonatorModel {
    pub const ALL: [ResonatorModel; 2] = [ResonatorModel::Modal, ResonatorModel::Plucked];

    /// Model for a selector index, clamped to the last model
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResonatorModel::Modal => "modal",
            ResonatorModel::Plucked => "plucked",
        }
    }
}

/// The resonator voice engine
#[derive(Debug, Clone)]
pub struct Part {
    config: PartConfig,
    sample_rate: f64,

    allocator: VoiceAllocator,
    voices: [Voice; MAX_POLYPHONY],
    banks: [ResonatorBank; NUM_BANKS],
    bank_frequencies: [f64; NUM_BANKS],
    notes_per_voice: usize,
    active_banks: usize,

    strummer: Strummer,
    note_filter: NoteFilter,
    dc_blockers: [DcBlocker; 2],

    model: ResonatorModel,
    bypass: bool,
    dirty: bool,

    frame: [f64; MAX_BLOCK_SIZE],
    frame_phase: usize,
    frame_strum: bool,

    excitation: [f64; MAX_BLOCK_SIZE],
    burst: [f64; MAX_BLOCK_SIZE],
    sympathetic: [f64; MAX_BLOCK_SIZE],
    voice_out: [f64; MAX_BLOCK_SIZE],
    voice_aux: [f64; MAX_BLOCK_SIZE],
}

impl Part {
    pub fn new(config: PartConfig) -> Self {
        let config = config.sanitized();
        let sample_rate = config.sample_rate;
        let pole = 1.0 - DC_BLOCKER_HZ / sample_rate;
        log::debug!(
            "part: sample rate {} Hz, block rate {} Hz, seed {:#x}",
            sample_rate,
            config.block_rate(),
            config.seed
        );

        Self {
            allocator: VoiceAllocator::new(1),
            voices: core::array::from_fn(|i| Voice::new(i, config.seed)),
            banks: core::array::from_fn(|_| ResonatorBank::new()),
            bank_frequencies: [0.0; NUM_BANKS],
            notes_per_voice: 1,
            active_banks: 0,
            strummer: Strummer::new(&config),
            note_filter: NoteFilter::new(config.block_rate()),
            dc_blockers: [DcBlocker::new(pole), DcBlocker::new(pole)],
            model: ResonatorModel::Modal,
            bypass: false,
            dirty: true,
            frame: [0.0; MAX_BLOCK_SIZE],
            frame_phase: 0,
            frame_strum: false,
            excitation: [0.0; MAX_BLOCK_SIZE],
            burst: [0.0; MAX_BLOCK_SIZE],
            sympathetic: [0.0; MAX_BLOCK_SIZE],
            voice_out: [0.0; MAX_BLOCK_SIZE],
            voice_aux: [0.0; MAX_BLOCK_SIZE],
            config,
            sample_rate,
        }
    }

    pub fn config(&self) -> &PartConfig {
        &self.config
    }

    /// Request a polyphony; clamped to `[1, MAX_POLYPHONY]`, applied at the
    /// next block.
    pub fn set_polyphony(&mut self, polyphony: usize) {
        let applied = self.allocator.set_polyphony(polyphony);
        log::debug!("part: polyphony {}", applied);
        self.dirty = true;
    }

    pub fn polyphony(&self) -> usize {
        self.allocator.polyphony()
    }

    /// Select the resonator model, applied at the next block
    pub fn set_model(&mut self, model: ResonatorModel) {
        log::debug!("part: model {}", model.name());
        self.model = model;
        self.dirty = true;
    }

    pub fn model(&self) -> ResonatorModel {
        self.model
    }

    /// Pass the input straight to both outputs
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn bypass(&self) -> bool {
        self.bypass
    }

    /// Voice that receives the current note
    pub fn active_voice(&self) -> usize {
        self.allocator.active_voice()
    }

    /// Note offset held by `voice`
    pub fn voice_note(&self, voice: usize) -> Option<f64> {
        self.voices.get(voice).map(|v| v.note)
    }

    /// Fundamental (cycles per sample) that chord note `note` of `voice` was
    /// tuned to in the last block
    pub fn bank_frequency(&self, voice: usize, note: usize) -> Option<f64> {
        let polyphony = self.polyphony();
        if voice >= polyphony || note >= self.notes_per_voice {
            return None;
        }
        self.bank_frequencies.get(voice + note * polyphony).copied()
    }

    /// Chord notes rendered per voice in the last block
    pub fn notes_per_voice(&self) -> usize {
        self.notes_per_voice
    }

    pub fn bank(&self, index: usize) -> Option<&ResonatorBank> {
        self.banks.get(index)
    }

    /// Clear all audio state; settings are kept.
    pub fn reset(&mut self) {
        for bank in self.banks.iter_mut() {
            bank.reset();
        }
        for voice in self.voices.iter_mut() {
            voice.reset();
            voice.note = 0.0;
        }
        for blocker in self.dc_blockers.iter_mut() {
            blocker.reset();
        }
        self.strummer.reset();
        self.note_filter.reset();
        self.allocator.reset();
        self.frame.fill(0.0);
        self.frame_phase = 0;
        self.frame_strum = false;
    }

    /// Render one buffer.
    ///
    /// Controls (strike decision, onset detection, pitch tracking) tick once
    /// every `MAX_BLOCK_SIZE` samples however the host slices its buffers.
    /// A strike requested in a call that does not complete a control block
    /// is held until one completes. On return `state.strum` tells whether
    /// any control block struck during this call. Samples of `out` and `aux`
    /// past the input length are zeroed.
    pub fn process(
        &mut self,
        state: &mut PerformanceState,
        patch: &Patch,
        input: &[f64],
        out: &mut [f64],
        aux: &mut [f64],
    ) {
        let size = input.len().min(out.len()).min(aux.len());
        out[size..].fill(0.0);
        aux[size..].fill(0.0);

        if self.bypass {
            out[..size].copy_from_slice(&input[..size]);
            aux[..size].copy_from_slice(&input[..size]);
            state.strum = false;
            return;
        }

        let patch = patch.clamped();
        self.frame_strum |= state.strum;
        let mut struck = false;

        let mut start = 0;
        while start < size {
            let end = (start + MAX_BLOCK_SIZE - self.frame_phase).min(size);
            let phase = self.frame_phase;
            self.frame[phase..phase + end - start].copy_from_slice(&input[start..end]);
            self.frame_phase += end - start;

            self.configure();
            let mut strike = false;
            if self.frame_phase == MAX_BLOCK_SIZE {
                self.frame_phase = 0;
                strike = self.tick(state);
                struck |= strike;
            }

            self.render_block(
                state,
                &patch,
                strike,
                &input[start..end],
                &mut out[start..end],
                &mut aux[start..end],
            );
            start = end;
        }

        state.strum = struck;
    }

    /// Run the control path over the completed frame; returns whether it
    /// struck.
    fn tick(&mut self, state: &PerformanceState) -> bool {
        let mut control = *state;
        control.strum = core::mem::take(&mut self.frame_strum);

        let excitation = (!control.internal_exciter).then_some(&self.frame[..]);
        self.strummer.process(excitation, &mut control);

        self.note_filter.process(control.note, control.strum);
        if control.strum {
            self.voices[self.allocator.active_voice()].note = self.note_filter.stable_note();
            self.allocator.advance();
        }
        self.voices[self.allocator.active_voice()].note = self.note_filter.note();
        control.strum
    }

    fn render_block(
        &mut self,
        state: &PerformanceState,
        patch: &Patch,
        strike: bool,
        input: &[f64],
        out: &mut [f64],
        aux: &mut [f64],
    ) {
        let polyphony = self.polyphony();
        let chord = chords::chord(polyphony, state.chord);
        let notes = chord.len().clamp(1, NUM_BANKS / polyphony);
        let resolution = floor_to_multiple((MAX_MODES / polyphony - 4) / notes, MODE_BATCH_SIZE)
            .max(MODE_BATCH_SIZE);
        self.notes_per_voice = notes;

        // Banks coming back into use start from rest
        let active_banks = polyphony * notes;
        for bank in self.banks[self.active_banks.min(active_banks)..active_banks].iter_mut() {
            bank.reset();
        }
        self.active_banks = active_banks;

        out.fill(0.0);
        aux.fill(0.0);
        for voice in 0..polyphony {
            let strike = strike && voice == self.allocator.active_voice();
            self.render_voice(voice, state, patch, strike, input, &chord[..notes], resolution);

            let size = out.len();
            let (voice_out, voice_aux) = (&self.voice_out[..size], &self.voice_aux[..size]);
            if polyphony == 1 {
                for (o, v) in out.iter_mut().zip(voice_out) {
                    *o += v;
                }
                for (a, v) in aux.iter_mut().zip(voice_aux) {
                    *a += v;
                }
            } else {
                let destination = if voice & 1 == 1 { &mut *aux } else { &mut *out };
                for ((d, o), a) in destination.iter_mut().zip(voice_out).zip(voice_aux) {
                    *d += o - a;
                }
            }
        }

        let [dc_out, dc_aux] = &mut self.dc_blockers;
        dc_out.process(out);
        dc_aux.process(aux);
    }

    fn configure(&mut self) {
        if !self.dirty {
            return;
        }

        let polyphony = self.polyphony();
        log::debug!(
            "part: reconfiguring for {} voice(s), {} model",
            polyphony,
            self.model.name()
        );

        for bank in self.banks.iter_mut() {
            bank.reset();
            match self.model {
                ResonatorModel::Modal => bank.set_all_taps(FilterTap::BandPass),
                ResonatorModel::Plucked => {
                    bank.set_all_taps(FilterTap::BandPass);
                    bank.set_tap(0, FilterTap::LowPass);
                }
            }
        }
        for voice in self.voices.iter_mut() {
            voice.reset();
        }
        self.allocator.wrap_active_voice();
        self.dirty = false;
    }

    fn render_voice(
        &mut self,
        voice: usize,
        state: &PerformanceState,
        patch: &Patch,
        strike: bool,
        input: &[f64],
        chord: &[f64],
        resolution: usize,
    ) {
        let size = input.len();
        let polyphony = self.polyphony();
        let active = voice == self.allocator.active_voice();
        let notes = chord.len();

        let frequency = note_to_frequency(state.pitch(self.voices[voice].note), self.sample_rate);
        let cutoff = patch.brightness * (2.0 - patch.brightness);
        let cutoff_range = if state.internal_exciter {
            frequency * semitones_to_ratio((cutoff - 0.5) * 96.0)
        } else {
            0.4 * semitones_to_ratio((cutoff - 1.0) * 108.0)
        };
        let filter_cutoff = if active {
            cutoff_range
        } else {
            INACTIVE_CUTOFF_HZ / self.sample_rate
        }
        .clamp(MIN_FREQUENCY, MAX_SVF_FREQUENCY);
        let filter_q = if state.internal_exciter { 1.5 } else { 0.8 };

        let excitation = &mut self.excitation[..size];
        if active && !state.internal_exciter {
            let gain = 1.0 / Libm::<f64>::sqrt(notes as f64);
            for (e, x) in excitation.iter_mut().zip(input) {
                *e = x * gain;
            }
        } else {
            excitation.fill(0.0);
        }

        let Voice {
            plucker,
            excitation_filter,
            ..
        } = &mut self.voices[voice];
        excitation_filter.set_f_q(filter_cutoff, filter_q);

        match self.model {
            ResonatorModel::Modal => {
                if state.internal_exciter && strike {
                    let mallet = semitones_to_ratio(filter_cutoff * filter_cutoff * 24.0);
                    excitation[0] += 0.25 * mallet / filter_cutoff;
                }
                excitation_filter.process(excitation, FilterTap::LowPass);
            }
            ResonatorModel::Plucked => {
                excitation_filter.process(excitation, FilterTap::LowPass);
                if state.internal_exciter {
                    if strike {
                        plucker.trigger(frequency, filter_cutoff * 8.0, patch.position);
                    }
                    let burst = &mut self.burst[..size];
                    plucker.process(burst);
                    for (e, b) in excitation.iter_mut().zip(burst.iter()) {
                        *e += b;
                    }
                }
            }
        }

        let voice_out = &mut self.voice_out[..size];
        let voice_aux = &mut self.voice_aux[..size];
        voice_out.fill(0.0);
        voice_aux.fill(0.0);

        let brightness = patch.brightness * patch.brightness;
        for (note, offset) in chord.iter().enumerate() {
            let index = voice + note * polyphony;
            let note_frequency = frequency * semitones_to_ratio(*offset);
            self.bank_frequencies[index] = note_frequency;

            let bank = &mut self.banks[index];
            bank.set_resolution(resolution);
            bank.tune(
                note_frequency,
                patch.structure,
                brightness,
                patch.damping,
                patch.position,
            );

            // With the internal exciter, note 0 is struck and the others
            // ring in sympathy with it
            let sympathetic = note > 0 && state.internal_exciter;
            if sympathetic {
                bank.process(&self.sympathetic[..size], voice_out, voice_aux);
            } else {
                bank.process(excitation, voice_out, voice_aux);
            }

            if note == 0 {
                let gain = SYMPATHETIC_GAIN / notes as f64;
                for ((s, o), a) in self.sympathetic[..size]
                    .iter_mut()
                    .zip(voice_out.iter())
                    .zip(voice_aux.iter())
                {
                    *s = gain * (o - a);
                }
            }
        }
    }
}
