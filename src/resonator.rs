//! Modal Resonator Bank
//!
//! A bank of up to `MAX_MODES` second-order resonant sections, each standing
//! in for one vibrational mode of a struck object. The bank is re-tuned from
//! musical parameters once per block:
//!
//! - `structure` sets the inharmonicity (how far partials stretch away from
//!   integer multiples of the fundamental)
//! - `damping` sets the base quality factor
//! - `brightness` sets how fast Q falls off toward the upper partials and
//!   tilts the mode amplitudes
//! - `position` shapes the amplitudes like an excitation point along a
//!   string or bar
//!
//! Sections run in batches of `MODE_BATCH_SIZE` with struct-of-arrays state.
//! Even-index modes (fundamental, 3rd harmonic, ...) sum into the main bus
//! and odd-index modes into the auxiliary bus.

use crate::filter::{FilterTap, MIN_FREQUENCY};
use crate::units::floor_to_multiple;
use crate::MAX_BLOCK_SIZE;
use core::f64::consts::PI;
use libm::Libm;

/// Maximum number of modes in one bank
pub const MAX_MODES: usize = 64;

/// Number of sections processed together
pub const MODE_BATCH_SIZE: usize = 4;

/// Upper bound for any mode frequency (cycles per sample)
pub const MAX_MODE_FREQUENCY: f64 = 0.49;

const NUM_BATCHES: usize = MAX_MODES / MODE_BATCH_SIZE;

/// Excitation is attenuated before entering the sections
const INPUT_GAIN: f64 = 0.125;

/// Tuning of a single mode
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModeTuning {
    /// Normalized frequency, always below `MAX_MODE_FREQUENCY` or equal to it
    /// when clamped
    pub frequency: f64,
    pub q: f64,
    /// Position and brightness weighting
    pub amplitude: f64,
    /// Weight applied to the section output; zero for clamped modes
    pub gain: f64,
}

/// Per-partial stretch increment for a given `structure`.
///
/// Negative values compress the upper partials, zero keeps them harmonic and
/// positive values spread them like a stiff bar or plate.
pub fn stiffness(structure: f64) -> f64 {
    let s = structure;
    if s < 0.25 {
        -(0.25 - s) * 0.25
    } else if s < 0.3 {
        0.0
    } else if s < 0.9 {
        0.01 * Libm::<f64>::pow(10.0, 2.005 * (s - 0.3) / 0.6) - 0.01
    } else if s < 1.0 {
        let g = (s - 0.9) / 0.1;
        1.5 - Libm::<f64>::cos(PI * g * g) * 0.5
    } else {
        2.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ModeBatch {
    g: [f64; MODE_BATCH_SIZE],
    r: [f64; MODE_BATCH_SIZE],
    h: [f64; MODE_BATCH_SIZE],
    gain: [f64; MODE_BATCH_SIZE],
    state_1: [f64; MODE_BATCH_SIZE],
    state_2: [f64; MODE_BATCH_SIZE],
    tap: FilterTap,
}

impl ModeBatch {
    fn set_mode(&mut self, lane: usize, tuning: &ModeTuning) {
        let g = Libm::<f64>::tan(PI * tuning.frequency);
        let r = 1.0 / tuning.q;
        self.g[lane] = g;
        self.r[lane] = r;
        self.h[lane] = 1.0 / (1.0 + r * g + g * g);
        self.gain[lane] = tuning.gain;
    }

    fn clear(&mut self) {
        self.state_1 = [0.0; MODE_BATCH_SIZE];
        self.state_2 = [0.0; MODE_BATCH_SIZE];
    }

    fn process(&mut self, input: &[f64], out: &mut [f64], aux: &mut [f64]) {
        let Self {
            g,
            r,
            h,
            gain,
            state_1,
            state_2,
            tap,
        } = self;

        for ((x, out), aux) in input.iter().zip(out.iter_mut()).zip(aux.iter_mut()) {
            let mut even = 0.0;
            let mut odd = 0.0;
            for lane in 0..MODE_BATCH_SIZE {
                let hp = (x - (r[lane] + g[lane]) * state_1[lane] - state_2[lane]) * h[lane];
                let bp = g[lane] * hp + state_1[lane];
                state_1[lane] = g[lane] * hp + bp;
                let lp = g[lane] * bp + state_2[lane];
                state_2[lane] = g[lane] * bp + lp;

                let y = match tap {
                    FilterTap::LowPass => lp,
                    FilterTap::BandPass => bp,
                    FilterTap::HighPass => hp,
                } * gain[lane];

                if lane & 1 == 0 {
                    even += y;
                } else {
                    odd += y;
                }
            }
            *out += even;
            *aux += odd;
        }
    }
}

/// A bank of tuned modal filters.
#[derive(Debug, Clone)]
pub struct ResonatorBank {
    batches: [ModeBatch; NUM_BATCHES],
    modes: [ModeTuning; MAX_MODES],
    resolution: usize,
    active_batches: usize,
}

impl ResonatorBank {
    pub fn new() -> Self {
        let mut bank = Self {
            batches: [ModeBatch::default(); NUM_BATCHES],
            modes: [ModeTuning::default(); MAX_MODES],
            resolution: MAX_MODES,
            active_batches: 0,
        };
        bank.set_all_taps(FilterTap::BandPass);
        bank.tune(220.0 / 48000.0, 0.25, 0.5, 0.3, 0.999);
        bank
    }

    /// Clear every section's state. Tuning and taps are kept.
    pub fn reset(&mut self) {
        for batch in self.batches.iter_mut() {
            batch.clear();
        }
    }

    /// Set the number of modes; rounded down to a multiple of
    /// `MODE_BATCH_SIZE` within `[MODE_BATCH_SIZE, MAX_MODES]`.
    pub fn set_resolution(&mut self, resolution: usize) {
        let resolution = floor_to_multiple(resolution, MODE_BATCH_SIZE);
        self.resolution = resolution.clamp(MODE_BATCH_SIZE, MAX_MODES);
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Select the tap of batch `group` (modes `4 * group .. 4 * group + 4`)
    pub fn set_tap(&mut self, group: usize, tap: FilterTap) {
        if let Some(batch) = self.batches.get_mut(group) {
            batch.tap = tap;
        }
    }

    /// Tap of batch `group`
    pub fn tap(&self, group: usize) -> Option<FilterTap> {
        self.batches.get(group).map(|batch| batch.tap)
    }

    pub fn set_all_taps(&mut self, tap: FilterTap) {
        for batch in self.batches.iter_mut() {
            batch.tap = tap;
        }
    }

    /// Retune every mode.
    ///
    /// `frequency` is the normalized fundamental; the other parameters are
    /// in `[0, 1]` and are clamped.
    pub fn tune(
        &mut self,
        frequency: f64,
        structure: f64,
        brightness: f64,
        damping: f64,
        position: f64,
    ) {
        let frequency = frequency.clamp(MIN_FREQUENCY, MAX_MODE_FREQUENCY);
        let structure = structure.clamp(0.0, 1.0);
        let brightness = brightness.clamp(0.0, 1.0);
        let damping = damping.clamp(0.0, 1.0);
        let position = position.clamp(0.0, 1.0);

        let mut stiffness = stiffness(structure);
        let mut stretch = 1.0;
        let mut harmonic = frequency;
        let mut q = 500.0 * Libm::<f64>::pow(10.0, 4.0 * (1.0 - damping));

        // Low structure settings lose some brightness
        let attenuation = Libm::<f64>::pow(1.0 - structure, 8.0);
        let damped_brightness = brightness * (1.0 - 0.2 * attenuation);
        let mut q_loss = damped_brightness * (2.0 - damped_brightness) * 0.85 + 0.15;
        let q_loss_damping_rate = structure * (2.0 - structure) * 0.1;

        let resolution = self.resolution;
        let mut num_modes = 0;
        for (i, mode) in self.modes[..resolution].iter_mut().enumerate() {
            let mut partial = harmonic * stretch;
            let clamped = partial >= MAX_MODE_FREQUENCY;
            if clamped {
                partial = MAX_MODE_FREQUENCY;
            } else {
                num_modes = i + 1;
            }

            let index = i as f64;
            let tilt = 1.0 - (1.0 - brightness) * index / resolution as f64;
            let amplitude = (0.5 + 0.5 * Libm::<f64>::cos(2.0 * PI * position * index)) * tilt;

            *mode = ModeTuning {
                frequency: partial,
                q: 1.0 + partial * q,
                amplitude,
                gain: if clamped {
                    0.0
                } else {
                    amplitude * (1.0 - 2.0 * partial)
                },
            };

            stretch += stiffness;
            stiffness *= if stiffness < 0.0 { 0.93 } else { 0.98 };
            q_loss += q_loss_damping_rate * (1.0 - q_loss);
            harmonic += frequency;
            q *= q_loss;
        }

        let active_batches = (num_modes + MODE_BATCH_SIZE - 1) / MODE_BATCH_SIZE;
        for (b, batch) in self.batches[..active_batches].iter_mut().enumerate() {
            if b >= self.active_batches {
                batch.clear();
            }
            for lane in 0..MODE_BATCH_SIZE {
                batch.set_mode(lane, &self.modes[b * MODE_BATCH_SIZE + lane]);
            }
        }
        self.active_batches = active_batches;
    }

    /// Tunings of the active resolution
    pub fn modes(&self) -> &[ModeTuning] {
        &self.modes[..self.resolution]
    }

    /// Number of leading modes below the frequency limit
    pub fn num_active_modes(&self) -> usize {
        self.modes()
            .iter()
            .rposition(|m| m.frequency < MAX_MODE_FREQUENCY)
            .map_or(0, |i| i + 1)
    }

    /// Resonate `input`, adding even-index modes into `out` and odd-index
    /// modes into `aux`. The shortest of the three slices sets the length.
    pub fn process(&mut self, input: &[f64], out: &mut [f64], aux: &mut [f64]) {
        let size = input.len().min(out.len()).min(aux.len());
        let mut scaled = [0.0; MAX_BLOCK_SIZE];

        let mut start = 0;
        while start < size {
            let end = (start + MAX_BLOCK_SIZE).min(size);
            let block = &mut scaled[..end - start];
            for (s, x) in block.iter_mut().zip(&input[start..end]) {
                *s = x * INPUT_GAIN;
            }
            for batch in self.batches[..self.active_batches].iter_mut() {
                batch.process(block, &mut out[start..end], &mut aux[start..end]);
            }
            start = end;
        }
    }
}

impl Default for ResonatorBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn impulse_response(bank: &mut ResonatorBank, blocks: usize) -> ([f64; 4096], [f64; 4096]) {
        let mut out = [0.0; 4096];
        let mut aux = [0.0; 4096];
        let mut input = [0.0; 4096];
        input[0] = 1.0;
        let len = (blocks * MAX_BLOCK_SIZE).min(4096);
        bank.process(&input[..len], &mut out[..len], &mut aux[..len]);
        (out, aux)
    }

    fn energy(buffer: &[f64]) -> f64 {
        buffer.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_stiffness_regions() {
        assert_relative_eq!(stiffness(0.0), -0.0625);
        assert_eq!(stiffness(0.27), 0.0);
        assert!(stiffness(0.5) > 0.0);
        assert_relative_eq!(stiffness(0.9), 1.0, epsilon = 1e-9);
        assert_relative_eq!(stiffness(1.0), 2.0);
        // Continuous across the bar/plate boundary
        assert_relative_eq!(stiffness(0.8999999), stiffness(0.9), epsilon = 0.01);
    }

    #[test]
    fn test_harmonic_structure_tunes_integer_partials() {
        let mut bank = ResonatorBank::new();
        bank.set_resolution(8);
        bank.tune(0.001, 0.27, 0.5, 0.5, 0.3);
        for (i, mode) in bank.modes().iter().enumerate() {
            assert_relative_eq!(mode.frequency, 0.001 * (i + 1) as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mode_frequencies_stay_below_nyquist() {
        let mut bank = ResonatorBank::new();
        let steps = [0.0, 0.1, 0.25, 0.3, 0.5, 0.75, 0.9, 0.95, 1.0];
        for &f0 in &[0.0001, 0.01, 0.1, 0.3, 0.49, 0.9] {
            for &structure in &steps {
                for &brightness in &steps {
                    for &damping in &steps {
                        bank.tune(f0, structure, brightness, damping, 0.5);
                        for mode in bank.modes() {
                            assert!(mode.frequency < 0.5, "{:?}", mode);
                            assert!(mode.q > 0.0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_clamped_modes_are_silent() {
        let mut bank = ResonatorBank::new();
        bank.tune(0.1, 0.27, 0.5, 0.5, 0.3);
        assert_eq!(bank.num_active_modes(), 4);
        for mode in &bank.modes()[4..] {
            assert_eq!(mode.frequency, MAX_MODE_FREQUENCY);
            assert_eq!(mode.gain, 0.0);
        }
    }

    #[test]
    fn test_damping_lowers_q() {
        let mut bank = ResonatorBank::new();
        bank.tune(0.01, 0.3, 0.5, 0.2, 0.3);
        let ringing = bank.modes()[0].q;
        bank.tune(0.01, 0.3, 0.5, 0.8, 0.3);
        let damped = bank.modes()[0].q;
        assert!(ringing > damped);
    }

    #[test]
    fn test_resolution_rounding() {
        let mut bank = ResonatorBank::new();
        bank.set_resolution(27);
        assert_eq!(bank.resolution(), 24);
        bank.set_resolution(1);
        assert_eq!(bank.resolution(), MODE_BATCH_SIZE);
        bank.set_resolution(1000);
        assert_eq!(bank.resolution(), MAX_MODES);
        assert_eq!(bank.modes().len(), MAX_MODES);
    }

    #[test]
    fn test_impulse_rings_and_splits_buses() {
        let mut bank = ResonatorBank::new();
        bank.set_resolution(16);
        bank.tune(0.01, 0.3, 0.8, 0.4, 0.3);
        let (out, aux) = impulse_response(&mut bank, 100);
        assert!(energy(&out) > 0.0);
        assert!(energy(&aux) > 0.0);
        assert!(out.iter().chain(aux.iter()).all(|s| s.is_finite()));
    }

    #[test]
    fn test_single_batch_bandpass_peak_near_fundamental() {
        let mut bank = ResonatorBank::new();
        bank.set_resolution(4);
        bank.tune(0.02, 0.27, 1.0, 0.2, 0.0);

        // Drive each candidate frequency and compare steady-state response
        let response = |f: f64| {
            let mut bank = bank.clone();
            bank.reset();
            let mut peak: f64 = 0.0;
            let mut out = [0.0; MAX_BLOCK_SIZE];
            let mut aux = [0.0; MAX_BLOCK_SIZE];
            let mut input = [0.0; MAX_BLOCK_SIZE];
            for block in 0..400 {
                for (n, x) in input.iter_mut().enumerate() {
                    let t = (block * MAX_BLOCK_SIZE + n) as f64;
                    *x = Libm::<f64>::sin(2.0 * PI * f * t);
                }
                out.fill(0.0);
                aux.fill(0.0);
                bank.process(&input, &mut out, &mut aux);
                if block > 300 {
                    peak = out.iter().fold(peak, |p, s| p.max(s.abs()));
                }
            }
            peak
        };

        assert!(response(0.02) > 10.0 * response(0.013));
    }

    #[test]
    fn test_process_accumulates() {
        let mut a = ResonatorBank::new();
        let mut b = ResonatorBank::new();
        let mut input = [0.0; MAX_BLOCK_SIZE];
        input[0] = 1.0;

        let mut out_a = [0.0; MAX_BLOCK_SIZE];
        let mut aux_a = [0.0; MAX_BLOCK_SIZE];
        a.process(&input, &mut out_a, &mut aux_a);

        let mut out_b = [1.0; MAX_BLOCK_SIZE];
        let mut aux_b = [1.0; MAX_BLOCK_SIZE];
        b.process(&input, &mut out_b, &mut aux_b);

        for i in 0..MAX_BLOCK_SIZE {
            assert_relative_eq!(out_b[i], out_a[i] + 1.0, epsilon = 1e-12);
            assert_relative_eq!(aux_b[i], aux_a[i] + 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_long_buffers_are_chunked() {
        let mut a = ResonatorBank::new();
        let mut b = ResonatorBank::new();
        let mut input = [0.0; 100];
        input[0] = 1.0;

        let mut out_a = [0.0; 100];
        let mut aux_a = [0.0; 100];
        a.process(&input, &mut out_a, &mut aux_a);

        let mut out_b = [0.0; 100];
        let mut aux_b = [0.0; 100];
        for start in (0..100).step_by(10) {
            let end = start + 10;
            b.process(&input[start..end], &mut out_b[start..end], &mut aux_b[start..end]);
        }
        assert_eq!(out_a, out_b);
        assert_eq!(aux_a, aux_b);
    }
}
