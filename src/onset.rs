//! Onset Detection
//!
//! Decides, once per block, whether the incoming audio contains a new
//! transient. No gate is needed; the verdict comes from signal statistics:
//!
//! 1. `Compressor` normalizes the level so quiet and loud playing look alike
//! 2. Two cascaded `NaiveSvf` splitters divide the block into three bands
//! 3. Each band's energy is tracked by a slope follower on the squared signal
//! 4. Rising energy across bands forms the onset detection function (ODF)
//! 5. `ZScorer` flags ODF values that stand out from its running statistics
//!
//! Accepted onsets raise an energy threshold and start an inhibit countdown,
//! so the ringing tail of one strike cannot re-trigger.

use crate::filter::NaiveSvf;
use crate::units::slope;
use crate::MAX_BLOCK_SIZE;
use libm::Libm;

/// Exponentially weighted running mean and variance
#[derive(Debug, Clone, Default)]
pub struct ZScorer {
    coefficient: f64,
    mean: f64,
    variance: f64,
}

impl ZScorer {
    pub fn new(coefficient: f64) -> Self {
        Self {
            coefficient,
            mean: 0.0,
            variance: 0.0,
        }
    }

    /// Fold `sample` into the statistics and return its deviation from the
    /// mean before the update.
    #[inline]
    pub fn update(&mut self, sample: f64) -> f64 {
        let centered = sample - self.mean;
        self.mean += self.coefficient * centered;
        self.variance += self.coefficient * (centered * centered - self.variance);
        centered
    }

    /// Update, then report whether `sample` lies more than `threshold`
    /// standard deviations above the mean and above `absolute_threshold`.
    #[inline]
    pub fn test(&mut self, sample: f64, threshold: f64, absolute_threshold: f64) -> bool {
        let centered = self.update(sample);
        centered > Libm::<f64>::sqrt(self.variance) * threshold && centered > absolute_threshold
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn reset(&mut self) {
        self.mean = 0.0;
        self.variance = 0.0;
    }
}

/// Divisive automatic gain control
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    attack: f64,
    decay: f64,
    skew: f64,
    level: f64,
}

impl Compressor {
    pub fn new(attack: f64, decay: f64, max_gain: f64) -> Self {
        Self {
            attack,
            decay,
            skew: 1.0 / max_gain.max(1.0),
            level: 0.0,
        }
    }

    /// Normalize `input` into `output` (the shorter length wins)
    pub fn process(&mut self, input: &[f64], output: &mut [f64]) {
        let mut level = self.level;
        for (x, y) in input.iter().zip(output.iter_mut()) {
            slope(&mut level, x.abs(), self.attack, self.decay);
            *y = x / (self.skew + level);
        }
        self.level = level;
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

const NUM_BANDS: usize = 3;

/// Multi-band energy onset detector.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    compressor: Compressor,
    low_mid_filter: NaiveSvf,
    mid_high_filter: NaiveSvf,

    attack: [f64; NUM_BANDS],
    decay: [f64; NUM_BANDS],
    envelope: [f64; NUM_BANDS],
    energy: [f64; NUM_BANDS],
    bands: [[f64; MAX_BLOCK_SIZE]; NUM_BANDS],

    z_df: ZScorer,
    onset_df: f64,

    inhibit_time: u32,
    inhibit_decay: f64,
    inhibit_threshold: f64,
    inhibit_counter: u32,
}

impl OnsetDetector {
    /// Create a detector for audio at `sample_rate`, evaluated once per block
    /// at `decimated_rate`. `ioi_time` is the shortest expected inter-onset
    /// interval in seconds.
    pub fn new(sample_rate: f64, decimated_rate: f64, ioi_time: f64) -> Self {
        let low = 8.0 / sample_rate;
        let low_mid = 160.0 / sample_rate;
        let mid_high = 1600.0 / sample_rate;

        let ioi_blocks = (ioi_time * decimated_rate).max(1.0);
        let ioi_f = 1.0 / ioi_blocks;

        let mut low_mid_filter = NaiveSvf::new();
        low_mid_filter.set_f_q(low_mid, 0.5);
        let mut mid_high_filter = NaiveSvf::new();
        mid_high_filter.set_f_q(mid_high, 0.5);

        Self {
            compressor: Compressor::new(ioi_f * 10.0, ioi_f * 0.05, 40.0),
            low_mid_filter,
            mid_high_filter,
            attack: [low_mid; NUM_BANDS],
            decay: [low * 0.25; NUM_BANDS],
            envelope: [0.0; NUM_BANDS],
            energy: [0.0; NUM_BANDS],
            bands: [[0.0; MAX_BLOCK_SIZE]; NUM_BANDS],
            z_df: ZScorer::new(ioi_f * 0.05),
            onset_df: 0.0,
            inhibit_time: ioi_blocks as u32,
            inhibit_decay: ioi_f,
            inhibit_threshold: 0.0,
            inhibit_counter: 0,
        }
    }

    /// Analyze one block (at most `MAX_BLOCK_SIZE` samples are read) and
    /// report whether it starts a new onset.
    pub fn process(&mut self, samples: &[f64]) -> bool {
        let size = samples.len().min(MAX_BLOCK_SIZE);
        let [low, mid, high] = &mut self.bands;
        let (low, mid, high) = (&mut low[..size], &mut mid[..size], &mut high[..size]);

        self.compressor.process(&samples[..size], high);
        self.mid_high_filter.split_in_place(high, mid);
        self.low_mid_filter.split_in_place(mid, low);

        let mut onset_df = 0.0;
        let mut total_energy = 0.0;
        for (i, band) in self.bands.iter().enumerate() {
            let stride = 4 >> i;
            let mut envelope = self.envelope[i];
            let mut energy = 0.0;
            for s in band[..size].iter().step_by(stride) {
                slope(&mut envelope, s * s, self.attack[i], self.decay[i]);
                energy += envelope;
            }
            let energy = Libm::<f64>::sqrt(energy) * stride as f64;
            self.envelope[i] = envelope;

            let derivative = energy - self.energy[i];
            onset_df += derivative + derivative.abs();
            self.energy[i] = energy;
            total_energy += energy;
        }

        self.onset_df += 0.05 * (onset_df - self.onset_df);

        let outlier = self.z_df.test(self.onset_df, 1.0, 0.01);
        let loud_enough = total_energy >= self.inhibit_threshold;
        let has_onset = outlier && loud_enough && self.inhibit_counter == 0;

        if has_onset {
            self.inhibit_threshold = total_energy * 1.5;
            self.inhibit_counter = self.inhibit_time;
        } else if self.inhibit_counter > 0 {
            self.inhibit_counter -= 1;
        }
        self.inhibit_threshold -= self.inhibit_decay * self.inhibit_threshold;

        has_onset
    }

    /// Blocks remaining before another onset may be reported
    pub fn inhibit_counter(&self) -> u32 {
        self.inhibit_counter
    }

    /// Length of the inhibit window in blocks
    pub fn inhibit_time(&self) -> u32 {
        self.inhibit_time
    }

    pub fn reset(&mut self) {
        self.compressor.reset();
        self.low_mid_filter.reset();
        self.mid_high_filter.reset();
        self.envelope = [0.0; NUM_BANDS];
        self.energy = [0.0; NUM_BANDS];
        self.z_df.reset();
        self.onset_df = 0.0;
        self.inhibit_threshold = 0.0;
        self.inhibit_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE_RATE: f64 = 48000.0;
    const BLOCK_RATE: f64 = SAMPLE_RATE / MAX_BLOCK_SIZE as f64;
    const IOI_TIME: f64 = 0.01;

    fn detector() -> OnsetDetector {
        OnsetDetector::new(SAMPLE_RATE, BLOCK_RATE, IOI_TIME)
    }

    #[test]
    fn test_z_scorer_tracks_mean() {
        let mut z = ZScorer::new(0.1);
        for _ in 0..500 {
            z.update(2.0);
        }
        assert_relative_eq!(z.mean(), 2.0, epsilon = 1e-6);
        assert!(z.variance() < 1e-6);
    }

    #[test]
    fn test_z_scorer_flags_outlier() {
        let mut z = ZScorer::new(0.05);
        for _ in 0..200 {
            z.update(0.0);
        }
        assert!(z.test(1.0, 1.0, 0.01));
    }

    #[test]
    fn test_z_scorer_absolute_floor() {
        let mut z = ZScorer::new(0.05);
        // Deviation above zero variance but below the floor
        assert!(!z.test(0.005, 1.0, 0.01));
    }

    #[test]
    fn test_compressor_normalizes_level() {
        let mut compressor = Compressor::new(0.5, 0.01, 40.0);
        let input = [0.1; 64];
        let mut output = [0.0; 64];
        compressor.process(&input, &mut output);
        // Settled output approaches x / (1/40 + |x|)
        assert_relative_eq!(output[63], 0.1 / (0.025 + 0.1), epsilon = 1e-3);
    }

    #[test]
    fn test_silence_never_reports_onset() {
        let mut detector = detector();
        let silence = [0.0; MAX_BLOCK_SIZE];
        for _ in 0..10_000 {
            assert!(!detector.process(&silence));
        }
    }

    #[test]
    fn test_isolated_transient_reports_single_onset() {
        let mut detector = detector();
        let silence = [0.0; MAX_BLOCK_SIZE];
        for _ in 0..100 {
            detector.process(&silence);
        }

        let mut impulse = [0.0; MAX_BLOCK_SIZE];
        impulse[0] = 1.0;
        assert!(detector.process(&impulse));

        let window = (IOI_TIME * BLOCK_RATE) as usize;
        let repeats = (0..window).filter(|_| detector.process(&silence)).count();
        assert_eq!(repeats, 0);
    }

    #[test]
    fn test_onset_starts_inhibit_countdown() {
        let mut detector = detector();
        let mut impulse = [0.0; MAX_BLOCK_SIZE];
        impulse[0] = 1.0;
        assert!(detector.process(&impulse));
        assert_eq!(detector.inhibit_counter(), detector.inhibit_time());

        detector.process(&[0.0; MAX_BLOCK_SIZE]);
        assert_eq!(detector.inhibit_counter(), detector.inhibit_time() - 1);
    }

    #[test]
    fn test_short_and_oversized_blocks() {
        let mut detector = detector();
        assert!(!detector.process(&[]));
        assert!(!detector.process(&[0.0; 5]));
        assert!(!detector.process(&[0.0; 100]));
    }

    #[test]
    fn test_reset_clears_inhibit() {
        let mut detector = detector();
        let mut impulse = [0.0; MAX_BLOCK_SIZE];
        impulse[0] = 1.0;
        detector.process(&impulse);
        detector.reset();
        assert_eq!(detector.inhibit_counter(), 0);
    }
}
