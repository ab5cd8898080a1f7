//! # Stochastic Module
//!
//! Random number generation for event sampling.
//!
//! Every event is generated from its own stream, derived from the run seed
//! and the event index, so a run is reproducible independently of how the
//! events are scheduled across threads.

use rand::{Error, RngCore, SeedableRng};
use std::f64::consts::PI;

use crate::types::Vec3;

/// Pseudo-random number generator (xoshiro256**)
///
/// Fast, high-quality PRNG suitable for Monte Carlo simulations.
/// Period: 2^256 - 1
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    state: [u64; 4],
}

/// SplitMix64 step, used for seeding and stream derivation
fn splitmix64(s: &mut u64) -> u64 {
    *s = s.wrapping_add(0x9e3779b97f4a7c15);
    let mut z = *s;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

impl RandomGenerator {
    /// Create new RNG with seed
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let mut state = [0u64; 4];
        for slot in state.iter_mut() {
            *slot = splitmix64(&mut s);
        }
        Self { state }
    }

    /// Independent stream for one event of a run
    pub fn for_stream(seed: u64, stream: u64) -> Self {
        let mut s = seed ^ 0x6a09e667f3bcc909;
        let base = splitmix64(&mut s);
        let mut t = stream.wrapping_mul(0xd1b54a32d192ed03) ^ base;
        Self::new(splitmix64(&mut t))
    }

    /// Advance the state and return the next 64 output bits
    #[inline]
    fn step(&mut self) -> u64 {
        let result = self.state[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;

        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);

        result
    }

    /// Generate uniform [0, 1)
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        (self.step() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate uniform in range [a, b)
    pub fn uniform_range(&mut self, a: f64, b: f64) -> f64 {
        a + (b - a) * self.uniform()
    }

    /// Uniform in (0, 1], safe to take the logarithm of
    pub fn uniform_open(&mut self) -> f64 {
        1.0 - self.uniform()
    }

    /// Generate exponential distribution with rate λ
    pub fn exponential(&mut self, lambda: f64) -> f64 {
        -self.uniform_open().ln() / lambda
    }

    /// Isotropic unit vector
    pub fn isotropic_direction(&mut self) -> Vec3 {
        let cos_theta = 2.0 * self.uniform() - 1.0;
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = 2.0 * PI * self.uniform();
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
    }

    /// Uniform point on a disk of given radius, as polar (r, φ)
    pub fn disk_point(&mut self, radius: f64) -> (f64, f64) {
        let phi = 2.0 * PI * self.uniform();
        let r = radius * self.uniform().sqrt();
        (r, phi)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(42) // Reproducible default
    }
}

impl RngCore for RandomGenerator {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for RandomGenerator {
    type Seed = [u8; 32];

    fn from_seed(seed: Self::Seed) -> Self {
        let mut state = [0u64; 4];
        for (slot, bytes) in state.iter_mut().zip(seed.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(bytes);
            *slot = u64::from_le_bytes(word);
        }
        // xoshiro must not start from the all-zero state
        if state.iter().all(|&w| w == 0) {
            return Self::new(0);
        }
        Self { state }
    }

    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed)
    }
}
