//! Pitch input stabilizer.
//!
//! Sharp pitch edges are followed at once; small drifts are smoothed with a
//! coefficient that slides from fast to slow after each edge. A short
//! history provides `stable_note`, the pitch from just before the latest
//! edge, so a voice handed off on a strike keeps its old pitch instead of
//! catching the start of the new one.

use crate::delay::DelayLine;
use crate::units::one_pole;
use libm::Libm;

/// Lag after a sharp edge, in seconds
const FAST_EDGE_TIME: f64 = 0.001;
/// Lag once the pitch has settled
const STEADY_TIME: f64 = 0.010;
/// Transition from reactive to filtered
const EDGE_RECOVERY_TIME: f64 = 0.050;
/// How far back `stable_note` looks
const EDGE_AVOIDANCE_DELAY: f64 = 0.004;

/// Pitch jump (semitones) treated as an edge
const EDGE_THRESHOLD: f64 = 0.4;

const HISTORY_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct NoteFilter {
    fast_coefficient: f64,
    slow_coefficient: f64,
    lag_coefficient: f64,
    coefficient: f64,
    delay: f64,
    note: f64,
    history: DelayLine<HISTORY_SIZE>,
}

impl NoteFilter {
    /// `block_rate` is the rate at which `process` is called, in Hz
    pub fn new(block_rate: f64) -> Self {
        let coefficient = |time: f64| (1.0 / (time * block_rate)).min(1.0);
        Self {
            fast_coefficient: coefficient(FAST_EDGE_TIME),
            slow_coefficient: coefficient(STEADY_TIME),
            lag_coefficient: coefficient(EDGE_RECOVERY_TIME),
            coefficient: coefficient(FAST_EDGE_TIME),
            delay: Libm::<f64>::floor(EDGE_AVOIDANCE_DELAY * block_rate).max(1.0),
            note: 0.0,
            history: DelayLine::new(),
        }
    }

    pub fn process(&mut self, note: f64, strum: bool) -> f64 {
        if strum || (note - self.note).abs() > EDGE_THRESHOLD {
            self.note = note;
            self.coefficient = self.fast_coefficient;
        } else {
            let target = self.slow_coefficient;
            one_pole(&mut self.coefficient, target, self.lag_coefficient);
            one_pole(&mut self.note, note, self.coefficient);
        }
        self.history.write(self.note);
        self.note
    }

    /// Current filtered note
    pub fn note(&self) -> f64 {
        self.note
    }

    /// Filtered note from a few blocks ago
    pub fn stable_note(&self) -> f64 {
        self.history.read(self.delay)
    }

    pub fn reset(&mut self) {
        self.note = 0.0;
        self.coefficient = self.fast_coefficient;
        self.history.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BLOCK_RATE: f64 = 2000.0;

    #[test]
    fn test_edges_are_followed_instantly() {
        let mut filter = NoteFilter::new(BLOCK_RATE);
        assert_eq!(filter.process(12.0, false), 12.0);
        assert_eq!(filter.process(5.0, false), 5.0);
    }

    #[test]
    fn test_small_drift_is_smoothed() {
        let mut filter = NoteFilter::new(BLOCK_RATE);
        filter.process(60.0, false);
        let smoothed = filter.process(60.2, false);
        assert!(smoothed > 60.0 && smoothed < 60.2);

        for _ in 0..2000 {
            filter.process(60.2, false);
        }
        assert_relative_eq!(filter.note(), 60.2, epsilon = 1e-9);
    }

    #[test]
    fn test_strum_snaps_to_note() {
        let mut filter = NoteFilter::new(BLOCK_RATE);
        filter.process(60.0, false);
        assert_eq!(filter.process(60.1, true), 60.1);
    }

    #[test]
    fn test_stable_note_lags_behind_edge() {
        let mut filter = NoteFilter::new(BLOCK_RATE);
        for _ in 0..32 {
            filter.process(48.0, false);
        }
        filter.process(60.0, true);
        assert_eq!(filter.note(), 60.0);
        assert_eq!(filter.stable_note(), 48.0);

        for _ in 0..16 {
            filter.process(60.0, false);
        }
        assert_eq!(filter.stable_note(), 60.0);
    }
}
