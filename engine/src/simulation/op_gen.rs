//! Tree operation generator for deterministic simulation testing.
//!
//! Produces random but reproducible sequences of index-tree operations. Keys
//! are drawn from a bounded key space so that removes and overwrites hit
//! existing entries often.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct OpGenConfig {
    /// Keys are drawn from `0..key_space`.
    pub key_space: u32,
    /// Probability of a remove (0.0 - 1.0).
    pub remove_rate: f64,
    /// Probability of an indexer write to a possibly absent key.
    pub set_rate: f64,
    /// Probability that an add uses the next ascending key instead of a random
    /// one. Sorted runs are the worst case for an unbalanced tree.
    pub ascending_rate: f64,
}

impl Default for OpGenConfig {
    fn default() -> Self {
        Self {
            key_space: 256,
            remove_rate: 0.3,
            set_rate: 0.1,
            ascending_rate: 0.2,
        }
    }
}

/// One tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOp {
    Add { key: u32, value: u32 },
    Remove { key: u32 },
    Set { key: u32, value: u32 },
}

/// Seeded generator of [`TreeOp`] sequences.
pub struct OpGenerator {
    rng: StdRng,
    config: OpGenConfig,
    next_ascending: u32,
}

impl OpGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, OpGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: OpGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_ascending: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &OpGenConfig {
        &self.config
    }

    fn random_key(&mut self) -> u32 {
        self.rng.random_range(0..self.config.key_space.max(1))
    }

    /// Generate the next operation.
    pub fn next_op(&mut self) -> TreeOp {
        let roll: f64 = self.rng.random();
        let value = self.rng.random();
        if roll < self.config.remove_rate {
            TreeOp::Remove {
                key: self.random_key(),
            }
        } else if roll < self.config.remove_rate + self.config.set_rate {
            TreeOp::Set {
                key: self.random_key(),
                value,
            }
        } else if self.rng.random_bool(self.config.ascending_rate.clamp(0.0, 1.0)) {
            let key = self.next_ascending % self.config.key_space.max(1);
            self.next_ascending = self.next_ascending.wrapping_add(1);
            TreeOp::Add { key, value }
        } else {
            TreeOp::Add {
                key: self.random_key(),
                value,
            }
        }
    }

    /// Generate `count` operations.
    pub fn ops(&mut self, count: usize) -> Vec<TreeOp> {
        (0..count).map(|_| self.next_op()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let a = OpGenerator::new(7).ops(200);
        let b = OpGenerator::new(7).ops(200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = OpGenerator::new(1).ops(50);
        let b = OpGenerator::new(2).ops(50);
        assert_ne!(a, b);
    }

    #[test]
    fn test_keys_stay_in_key_space() {
        let config = OpGenConfig {
            key_space: 8,
            ..OpGenConfig::default()
        };
        for op in OpGenerator::with_config(3, config).ops(500) {
            let key = match op {
                TreeOp::Add { key, .. } | TreeOp::Remove { key } | TreeOp::Set { key, .. } => key,
            };
            assert!(key < 8);
        }
    }

    #[test]
    fn test_insert_only_config() {
        let config = OpGenConfig {
            remove_rate: 0.0,
            set_rate: 0.0,
            ..OpGenConfig::default()
        };
        assert!(
            OpGenerator::with_config(11, config)
                .ops(100)
                .iter()
                .all(|op| matches!(op, TreeOp::Add { .. }))
        );
    }
}
