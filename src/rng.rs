//! Seedable Noise Source
//!
//! Excitation bursts need white noise, but two engines fed the same controls
//! must render bit-identical audio. Every noise consumer therefore owns its
//! own explicitly seeded generator; there is no shared or thread-local state.
//!
//! The generator is xoroshiro128+ (shift/rotate constants 24, 16, 37). It is
//! fast, has a period of 2^128 - 1, and supports jumping ahead by 2^64 steps
//! to derive independent streams (one per voice) from a single seed.

/// A seedable random number generator using xoroshiro128+.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    s0: u64,
    s1: u64,
}

impl Rng {
    /// Create a new RNG with the given state words.
    ///
    /// An all-zero state is replaced by a valid one.
    #[inline]
    pub const fn new(s0: u64, s1: u64) -> Self {
        let s0 = if s0 == 0 && s1 == 0 { 1 } else { s0 };
        Self { s0, s1 }
    }

    /// Create a new RNG from a single 64-bit seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        let s0 = splitmix64(seed);
        let s1 = splitmix64(seed.wrapping_add(0x9e3779b97f4a7c15));
        Self::new(s0, s1)
    }

    /// Create an RNG for stream `index` of `seed`.
    ///
    /// Streams are separated by `index` jumps of 2^64 steps, so they never
    /// overlap in practice.
    pub fn stream(seed: u64, index: usize) -> Self {
        let mut rng = Self::from_seed(seed);
        for _ in 0..index {
            rng.jump();
        }
        rng
    }

    /// Create a new RNG seeded from the operating system's entropy source.
    #[cfg(feature = "std")]
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    /// Generate the next u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.s0;
        let mut s1 = self.s1;
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);

        result
    }

    /// Generate a random f64 in the range [0.0, 1.0).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // Upper 53 bits fill the mantissa
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate a random f64 in the range [-1.0, 1.0).
    #[inline]
    pub fn next_f64_bipolar(&mut self) -> f64 {
        self.next_f64() * 2.0 - 1.0
    }

    /// Jump the RNG state forward by 2^64 steps.
    pub fn jump(&mut self) {
        const JUMP: [u64; 2] = [0xdf900294d8f554a5, 0x170865df4b3201fc];

        let mut s0 = 0u64;
        let mut s1 = 0u64;

        for jump_val in JUMP.iter() {
            for b in 0..64 {
                if (jump_val >> b) & 1 != 0 {
                    s0 ^= self.s0;
                    s1 ^= self.s1;
                }
                self.next_u64();
            }
        }

        self.s0 = s0;
        self.s1 = s1;
    }
}

impl Default for Rng {
    /// Fixed seed, so default-constructed engines are reproducible.
    fn default() -> Self {
        Self::new(0x853c49e6748fea9b, 0xda3e39cb94b95bdb)
    }
}

/// Splitmix64 mixing function for deriving state from seeds.
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = Rng::from_seed(12345);
        let mut rng2 = Rng::from_seed(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_xoroshiro128_plus_sequence() {
        let mut rng = Rng::new(1, 2);
        assert_eq!(rng.next_u64(), 0x3);
        assert_eq!(rng.next_u64(), 0x60_0103_0003);
        assert_eq!(rng.next_u64(), 0x20c1_02c3_0200_0c03);
        assert_eq!(rng.next_u64(), 0x8101_8067_0d23_ad61);
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = Rng::from_seed(12345);
        let mut rng2 = Rng::from_seed(54321);

        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_rng_bipolar_range() {
        let mut rng = Rng::from_seed(42);

        for _ in 0..1000 {
            let v = rng.next_f64_bipolar();
            assert!((-1.0..1.0).contains(&v), "Value {} out of range", v);
        }
    }

    #[test]
    fn test_rng_distribution() {
        let mut rng = Rng::from_seed(42);
        let count = 10000;
        let sum: f64 = (0..count).map(|_| rng.next_f64()).sum();

        let mean = sum / count as f64;
        assert!((mean - 0.5).abs() < 0.02, "Mean {} too far from 0.5", mean);
    }

    #[test]
    fn test_streams_are_independent_and_reproducible() {
        let mut a = Rng::stream(7, 0);
        let mut b = Rng::stream(7, 1);
        let mut b_again = Rng::stream(7, 1);

        let first_b = b.next_u64();
        assert_ne!(a.next_u64(), first_b);
        assert_eq!(b_again.next_u64(), first_b);
    }

    #[test]
    fn test_zero_seed_handling() {
        let mut rng = Rng::new(0, 0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_entropy_produces_values() {
        let mut rng = Rng::from_entropy();
        let v = rng.next_f64();
        assert!((0.0..1.0).contains(&v));
    }
}
