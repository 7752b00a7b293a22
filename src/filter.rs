//! Filter Primitives
//!
//! - `Svf` - trapezoidal (zero-delay feedback) state variable filter, used for
//!   the excitation filters and the Plucker's tone control
//! - `NaiveSvf` - Chamberlin state variable filter, used as a cheap band
//!   splitter by the onset detector
//! - `DcBlocker` - one-pole DC blocking high-pass for the output buses
//!
//! Frequencies are normalized (cycles per sample). Every setter clamps its
//! inputs so no parameter combination can push a filter into instability.

use core::f64::consts::PI;
use libm::Libm;

/// Highest normalized cutoff accepted by `Svf`
pub const MAX_SVF_FREQUENCY: f64 = 0.499;

/// Lowest normalized cutoff accepted by the filters
pub const MIN_FREQUENCY: f64 = 1.0e-6;

/// Highest normalized cutoff accepted by `NaiveSvf`
const MAX_NAIVE_FREQUENCY: f64 = 0.497;

/// Bound on the Chamberlin band-pass state
const NAIVE_STATE_LIMIT: f64 = 1000.0;

/// Which response of a state variable filter to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterTap {
    #[default]
    LowPass,
    BandPass,
    HighPass,
}

/// Trapezoidal state variable filter.
///
/// One state update per sample yields simultaneous high-pass, band-pass and
/// low-pass responses. The band-pass tap peaks at `q` at the cutoff.
#[derive(Debug, Clone)]
pub struct Svf {
    g: f64,
    r: f64,
    h: f64,
    state_1: f64,
    state_2: f64,
}

impl Svf {
    pub fn new() -> Self {
        let mut svf = Self {
            g: 0.0,
            r: 0.0,
            h: 0.0,
            state_1: 0.0,
            state_2: 0.0,
        };
        svf.set_f_q(0.01, 100.0);
        svf
    }

    /// Set cutoff (cycles per sample) and resonance.
    pub fn set_f_q(&mut self, frequency: f64, q: f64) {
        let frequency = frequency.clamp(MIN_FREQUENCY, MAX_SVF_FREQUENCY);
        let q = q.max(0.1);
        self.g = Libm::<f64>::tan(PI * frequency);
        self.r = 1.0 / q;
        self.h = 1.0 / (1.0 + self.r * self.g + self.g * self.g);
    }

    #[inline]
    pub fn process_sample(&mut self, input: f64, tap: FilterTap) -> f64 {
        let hp = (input - self.r * self.state_1 - self.g * self.state_1 - self.state_2) * self.h;
        let bp = self.g * hp + self.state_1;
        self.state_1 = self.g * hp + bp;
        let lp = self.g * bp + self.state_2;
        self.state_2 = self.g * bp + lp;

        match tap {
            FilterTap::LowPass => lp,
            FilterTap::BandPass => bp,
            FilterTap::HighPass => hp,
        }
    }

    /// Filter a buffer in place
    pub fn process(&mut self, buffer: &mut [f64], tap: FilterTap) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample, tap);
        }
    }

    pub fn reset(&mut self) {
        self.state_1 = 0.0;
        self.state_2 = 0.0;
    }
}

impl Default for Svf {
    fn default() -> Self {
        Self::new()
    }
}

/// Chamberlin state variable filter.
///
/// Less accurate than `Svf` near Nyquist, but cheap. The band state is kept
/// within `±1000`.
#[derive(Debug, Clone)]
pub struct NaiveSvf {
    f: f64,
    damp: f64,
    lp: f64,
    bp: f64,
}

impl NaiveSvf {
    pub fn new() -> Self {
        let mut svf = Self {
            f: 0.0,
            damp: 0.0,
            lp: 0.0,
            bp: 0.0,
        };
        svf.set_f_q(0.01, 100.0);
        svf
    }

    pub fn set_f_q(&mut self, frequency: f64, resonance: f64) {
        let frequency = frequency.clamp(MIN_FREQUENCY, MAX_NAIVE_FREQUENCY);
        self.f = 2.0 * PI * frequency;
        self.damp = 1.0 / resonance.max(0.1);
    }

    /// Split `buffer` into a low band (written to `low`) and a high band
    /// (written back into `buffer`).
    pub fn split_in_place(&mut self, buffer: &mut [f64], low: &mut [f64]) {
        let mut lp = self.lp;
        let mut bp = self.bp;
        for (sample, low) in buffer.iter_mut().zip(low.iter_mut()) {
            let notch = *sample - bp * self.damp;
            lp += self.f * bp;
            let hp = notch - lp;
            bp = (bp + self.f * hp).clamp(-NAIVE_STATE_LIMIT, NAIVE_STATE_LIMIT);
            *low = lp;
            *sample = hp;
        }
        self.lp = lp;
        self.bp = bp;
    }

    pub fn reset(&mut self) {
        self.lp = 0.0;
        self.bp = 0.0;
    }
}

impl Default for NaiveSvf {
    fn default() -> Self {
        Self::new()
    }
}

/// One-pole DC blocker: `y[n] = pole * y[n-1] + x[n] - x[n-1]`
#[derive(Debug, Clone, Default)]
pub struct DcBlocker {
    pole: f64,
    x: f64,
    y: f64,
}

impl DcBlocker {
    pub fn new(pole: f64) -> Self {
        Self {
            pole: pole.clamp(0.0, 0.99999),
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn process(&mut self, buffer: &mut [f64]) {
        let mut x = self.x;
        let mut y = self.y;
        for sample in buffer.iter_mut() {
            let previous_x = x;
            x = *sample;
            y = y * self.pole + x - previous_x;
            *sample = y;
        }
        self.x = x;
        self.y = y;
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(frequency: f64, n: usize) -> f64 {
        Libm::<f64>::sin(2.0 * PI * frequency * n as f64)
    }

    fn steady_state_peak(svf: &mut Svf, frequency: f64, tap: FilterTap) -> f64 {
        let mut peak: f64 = 0.0;
        for n in 0..20000 {
            let y = svf.process_sample(sine(frequency, n), tap);
            if n > 15000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_svf_lowpass_passes_low_blocks_high() {
        let mut svf = Svf::new();
        svf.set_f_q(0.01, 0.707);
        let low = steady_state_peak(&mut svf, 0.001, FilterTap::LowPass);

        let mut svf = Svf::new();
        svf.set_f_q(0.01, 0.707);
        let high = steady_state_peak(&mut svf, 0.2, FilterTap::LowPass);

        assert!(low > 0.9, "low-frequency gain {}", low);
        assert!(high < 0.05, "high-frequency gain {}", high);
    }

    #[test]
    fn test_svf_bandpass_peak_gain_is_q() {
        let mut svf = Svf::new();
        svf.set_f_q(0.05, 4.0);
        let peak = steady_state_peak(&mut svf, 0.05, FilterTap::BandPass);
        assert_relative_eq!(peak, 4.0, epsilon = 0.05);
    }

    #[test]
    fn test_svf_clamps_frequency_above_nyquist() {
        let mut svf = Svf::new();
        svf.set_f_q(3.0, 1.0);
        for n in 0..1000 {
            let y = svf.process_sample(sine(0.1, n), FilterTap::LowPass);
            assert!(y.is_finite());
        }
    }

    #[test]
    fn test_svf_reset() {
        let mut svf = Svf::new();
        svf.set_f_q(0.1, 1.0);
        svf.process_sample(1.0, FilterTap::LowPass);
        svf.reset();
        assert_eq!(svf.process_sample(0.0, FilterTap::LowPass), 0.0);
    }

    #[test]
    fn test_naive_svf_split_reconstructs_signal() {
        let mut svf = NaiveSvf::new();
        svf.set_f_q(0.02, 0.5);

        let mut high = [0.0; 32];
        let mut low = [0.0; 32];
        for (n, s) in high.iter_mut().enumerate() {
            *s = sine(0.003, n);
        }
        svf.split_in_place(&mut high, &mut low);

        // A slow sine lands almost entirely in the low band after settling
        let low_energy: f64 = low[16..].iter().map(|s| s * s).sum();
        assert!(low_energy > 0.0);
        assert!(high.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_naive_svf_state_stays_bounded() {
        let mut svf = NaiveSvf::new();
        svf.set_f_q(0.49, 0.01);
        let mut buffer = [1.0e6; 24];
        let mut low = [0.0; 24];
        for _ in 0..100 {
            buffer.fill(1.0e6);
            svf.split_in_place(&mut buffer, &mut low);
        }
        assert!(svf.bp.abs() <= NAIVE_STATE_LIMIT);
    }

    #[test]
    fn test_dc_blocker_removes_offset() {
        let mut blocker = DcBlocker::new(1.0 - 10.0 / 48000.0);
        let mut buffer = [0.5; 24];
        for _ in 0..20000 {
            buffer.fill(0.5);
            blocker.process(&mut buffer);
        }
        assert!(buffer[23].abs() < 1e-3, "residual {}", buffer[23]);
    }

    #[test]
    fn test_dc_blocker_silence_in_silence_out() {
        let mut blocker = DcBlocker::new(0.999);
        let mut buffer = [0.0; 24];
        blocker.process(&mut buffer);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
