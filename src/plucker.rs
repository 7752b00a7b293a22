//! Plucked excitation: a noise burst through a comb filter and a low-pass.
//!
//! The burst lasts one comb period, so the comb imprints a pitched "pick
//! position" coloration on it before the low-pass sets its brightness.

use crate::delay::DelayLine;
use crate::filter::{FilterTap, Svf, MAX_SVF_FREQUENCY, MIN_FREQUENCY};
use crate::rng::Rng;

const COMB_CAPACITY: usize = 256;

/// Longest comb period the delay line can hold, in samples
const MAX_COMB_PERIOD: f64 = 255.0;

#[derive(Debug, Clone)]
pub struct Plucker {
    svf: Svf,
    comb: DelayLine<COMB_CAPACITY>,
    rng: Rng,
    remaining_samples: usize,
    comb_period: f64,
    comb_gain: f64,
}

impl Plucker {
    pub fn new(rng: Rng) -> Self {
        Self {
            svf: Svf::new(),
            comb: DelayLine::new(),
            rng,
            remaining_samples: 0,
            comb_period: 0.0,
            comb_gain: 0.0,
        }
    }

    /// Start a new burst.
    ///
    /// `frequency` and `cutoff` are normalized; `position` in `[0, 1]` picks
    /// the comb period as a fraction of the fundamental period.
    pub fn trigger(&mut self, frequency: f64, cutoff: f64, position: f64) {
        let position = position.clamp(0.0, 1.0);
        let ratio = position * 0.9 + 0.05;
        let mut period = ratio / frequency.max(MIN_FREQUENCY);
        self.remaining_samples = period as usize;
        while period >= MAX_COMB_PERIOD {
            period *= 0.5;
        }
        self.comb_period = period;
        self.comb_gain = (1.0 - position) * 0.8;
        self.svf.set_f_q(cutoff.min(MAX_SVF_FREQUENCY), 1.0);
    }

    /// Render into `out`, overwriting it
    pub fn process(&mut self, out: &mut [f64]) {
        for sample in out.iter_mut() {
            let noise = if self.remaining_samples > 0 {
                self.remaining_samples -= 1;
                self.rng.next_f64_bipolar()
            } else {
                0.0
            };
            *sample = noise + self.comb_gain * self.comb.read(self.comb_period);
            self.comb.write(*sample);
        }
        self.svf.process(out, FilterTap::LowPass);
    }

    /// Samples of noise left in the current burst
    pub fn remaining_samples(&self) -> usize {
        self.remaining_samples
    }

    /// Comb delay in samples
    pub fn comb_period(&self) -> f64 {
        self.comb_period
    }

    /// Clear the burst and filter state; the noise stream continues.
    pub fn reset(&mut self) {
        self.svf.reset();
        self.comb.reset();
        self.remaining_samples = 0;
    }
}
