//! Replaceable random sources.
//!
//! Every draw a sensor makes (the sampled reading and, for stochastic
//! distributions, the next inter-sample delay) goes through a
//! [`RandomSource`], so a run is fully determined by its seed and tests can
//! substitute a [`FixedSequence`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource: Send {
    /// Returns the next value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Rewinds the source to its initial state.
    fn reset(&mut self);
}

/// Seeded ChaCha8 generator.
///
/// Two sources built from the same seed produce the same sequence.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Creates a generator from a 64-bit seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The seed this generator was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}

/// Replays a fixed list of values, cycling when exhausted.
///
/// Values are clamped into `[0, 1]`. An upper bound of exactly `1.0` is
/// allowed so tests can hit the top of a value range. An empty list
/// always yields `0.0`.
#[derive(Clone, Debug)]
pub struct FixedSequence {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedSequence {
    /// Creates a sequence replaying `values` in order.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        }
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}
