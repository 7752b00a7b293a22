//! Fixed-capacity delay line with fractional reads.
//!
//! Storage is an inline array, so a delay line never allocates. The write
//! head moves backwards; `read(1.0)` returns the most recently written
//! sample and `read(N - 1)` the oldest one still reachable.

use libm::Libm;

#[derive(Debug, Clone)]
pub struct DelayLine<const N: usize> {
    line: [f64; N],
    write_ptr: usize,
}

impl<const N: usize> DelayLine<N> {
    pub fn new() -> Self {
        Self {
            line: [0.0; N],
            write_ptr: 0,
        }
    }

    /// Capacity in samples
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn write(&mut self, sample: f64) {
        self.line[self.write_ptr] = sample;
        self.write_ptr = (self.write_ptr + N - 1) % N;
    }

    /// Read `delay` samples back, linearly interpolating between taps.
    ///
    /// The delay is clamped to `[1, N - 2]`.
    #[inline]
    pub fn read(&self, delay: f64) -> f64 {
        let delay = delay.clamp(1.0, (N - 2) as f64);
        let integral = Libm::<f64>::floor(delay);
        let fractional = delay - integral;
        let integral = integral as usize;

        let a = self.line[(self.write_ptr + integral) % N];
        let b = self.line[(self.write_ptr + integral + 1) % N];
        a + (b - a) * fractional
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.write_ptr = 0;
    }
}

impl<const N: usize> Default for DelayLine<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_delay_line_integer_reads() {
        let mut line = DelayLine::<8>::new();
        line.write(1.0);
        line.write(2.0);
        line.write(3.0);

        assert_eq!(line.read(1.0), 3.0);
        assert_eq!(line.read(2.0), 2.0);
        assert_eq!(line.read(3.0), 1.0);
    }

    #[test]
    fn test_delay_line_fractional_read() {
        let mut line = DelayLine::<8>::new();
        line.write(0.0);
        line.write(1.0);
        line.write(2.0);

        assert_relative_eq!(line.read(1.5), 1.5);
        assert_relative_eq!(line.read(2.25), 0.75);
    }

    #[test]
    fn test_delay_line_clamps_delay() {
        let mut line = DelayLine::<4>::new();
        line.write(5.0);
        // Zero and out-of-range delays are clamped into the readable span
        assert_eq!(line.read(0.0), 5.0);
        assert!(line.read(100.0).is_finite());
    }

    #[test]
    fn test_delay_line_wraps() {
        let mut line = DelayLine::<4>::new();
        for i in 0..10 {
            line.write(i as f64);
        }
        assert_eq!(line.read(1.0), 9.0);
        assert_eq!(line.read(2.0), 8.0);
    }

    #[test]
    fn test_delay_line_reset() {
        let mut line = DelayLine::<4>::new();
        line.write(1.0);
        line.reset();
        assert_eq!(line.read(1.0), 0.0);
        assert_eq!(line.capacity(), 4);
    }
}
