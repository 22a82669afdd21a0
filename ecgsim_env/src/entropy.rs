//! Injectable randomness for conduction jitter and probability gates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform draws used by the conduction scheduler.
///
/// Every stochastic decision in the engine goes through this trait so that
/// tests can pin outcomes with a seed or a scripted sequence.
pub trait EntropySource: Send {
    /// Returns a uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Returns a uniform value in `[-bound, +bound]`.
    fn symmetric(&mut self, bound: f64) -> f64 {
        (self.next_unit() * 2.0 - 1.0) * bound
    }
}

/// Seeded ChaCha8 entropy. Same seed, same draws.
pub struct SeededEntropy {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededEntropy {
    /// Creates a new seeded source.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl EntropySource for SeededEntropy {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Production entropy seeded from the operating system.
pub struct OsEntropy {
    rng: StdRng,
}

impl OsEntropy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for OsEntropy {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
///
/// An empty script always yields `0.0`. Values are clamped into `[0, 1)`.
#[derive(Debug, Clone)]
pub struct ScriptedEntropy {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedEntropy {
    pub fn new(values: Vec<f64>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        Self { values, cursor: 0 }
    }

    /// A script that always returns the same value.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl EntropySource for ScriptedEntropy {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            self.cursor += 1;
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_entropy_is_reproducible() {
        let mut a = SeededEntropy::new(42);
        let mut b = SeededEntropy::new(42);

        for _ in 0..32 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }

    #[test]
    fn test_seeded_entropy_range() {
        let mut source = SeededEntropy::new(7);
        for _ in 0..1000 {
            let v = source.next_unit();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_scripted_entropy_cycles() {
        let mut source = ScriptedEntropy::new(vec![0.1, 0.9]);
        assert_eq!(source.next_unit(), 0.1);
        assert_eq!(source.next_unit(), 0.9);
        assert_eq!(source.next_unit(), 0.1);
        assert_eq!(source.draws(), 3);
    }

    #[test]
    fn test_symmetric_bounds() {
        let mut low = ScriptedEntropy::constant(0.0);
        assert_eq!(low.symmetric(10.0), -10.0);

        let mut mid = ScriptedEntropy::constant(0.5);
        assert_eq!(mid.symmetric(10.0), 0.0);
    }
}
