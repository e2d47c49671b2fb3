//! Main simulator harness for deterministic simulation testing.
//!
//! Replays a seeded operation sequence against one index tree and a
//! `BTreeMap` model side by side, checking invariants after every step.

use std::collections::BTreeMap;

use tracing::debug;

use super::invariants::{InvariantChecker, InvariantViolation};
use super::op_gen::{OpGenConfig, OpGenerator, TreeOp};
use crate::storage::tree::{
    AvlTree, BinaryTree, ScapegoatBalance, ScapegoatTree, TreeError, TreeKind, UnbalancedTree,
};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Tree implementation under test.
    pub kind: TreeKind,
    /// Scapegoat balance factor.
    pub alpha: f64,
    /// Operation generation configuration.
    pub op_config: OpGenConfig,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64, kind: TreeKind) -> Self {
        Self {
            seed,
            kind,
            alpha: ScapegoatBalance::DEFAULT_ALPHA,
            op_config: OpGenConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub const fn with_op_config(mut self, config: OpGenConfig) -> Self {
        self.op_config = config;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    pub kind: TreeKind,
    pub operations: usize,
    /// Size of the tree after the last operation.
    pub final_len: usize,
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SimulationResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }
}

enum SimTree {
    Unbalanced(UnbalancedTree<u32, u32>),
    Avl(AvlTree<u32, u32>),
    Scapegoat(ScapegoatTree<u32, u32>),
}

impl SimTree {
    fn new(kind: TreeKind, alpha: f64) -> Self {
        match kind {
            TreeKind::Unbalanced => Self::Unbalanced(UnbalancedTree::new()),
            TreeKind::Avl => Self::Avl(AvlTree::new()),
            TreeKind::Scapegoat => Self::Scapegoat(ScapegoatTree::with_alpha(alpha)),
        }
    }

    fn as_tree_mut(&mut self) -> &mut dyn BinaryTree<u32, u32> {
        match self {
            Self::Unbalanced(tree) => tree,
            Self::Avl(tree) => tree,
            Self::Scapegoat(tree) => tree,
        }
    }

    fn as_tree(&self) -> &dyn BinaryTree<u32, u32> {
        match self {
            Self::Unbalanced(tree) => tree,
            Self::Avl(tree) => tree,
            Self::Scapegoat(tree) => tree,
        }
    }
}

/// Replays generated operations against a tree and a model.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OpGenerator,
    checker: InvariantChecker,
    tree: SimTree,
    model: BTreeMap<u32, u32>,
    peak_len: usize,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OpGenerator::with_config(config.seed, config.op_config.clone());
        let tree = SimTree::new(config.kind, config.alpha);
        Self {
            config,
            generator,
            checker: InvariantChecker::new(),
            tree,
            model: BTreeMap::new(),
            peak_len: 0,
        }
    }

    /// Apply `op_count` generated operations, checking after each one.
    pub fn run(&mut self, op_count: usize) -> SimulationResult {
        for index in 0..op_count {
            let op = self.generator.next_op();
            self.apply(op, index);
            self.check(index);
        }
        debug!(
            seed = self.config.seed,
            kind = %self.config.kind,
            violations = self.checker.violations().len(),
            "simulation finished"
        );
        SimulationResult {
            seed: self.config.seed,
            kind: self.config.kind,
            operations: op_count,
            final_len: self.tree.as_tree().len(),
            invariant_violations: self.checker.violations().to_vec(),
        }
    }

    fn apply(&mut self, op: TreeOp, index: usize) {
        let tree = self.tree.as_tree_mut();
        match op {
            TreeOp::Add { key, value } => {
                let created = tree.add(key, value);
                let existed = self.model.insert(key, value).is_some();
                if created == existed {
                    self.mismatch("add reported wrong novelty", index, key);
                }
            }
            TreeOp::Remove { key } => {
                let removed = tree.remove(&key);
                if removed != self.model.remove(&key).is_some() {
                    self.mismatch("remove reported wrong presence", index, key);
                }
            }
            TreeOp::Set { key, value } => {
                let present = self.model.contains_key(&key);
                match (tree.set(&key, value), present) {
                    (Ok(()), true) => {
                        self.model.insert(key, value);
                    }
                    (Err(TreeError::KeyNotFound), false) => {}
                    _ => self.mismatch("set disagreed with model", index, key),
                }
            }
        }
        self.peak_len = self.peak_len.max(self.model.len());
    }

    fn mismatch(&mut self, description: &str, operation_index: usize, key: u32) {
        self.checker.add_violation(InvariantViolation {
            description: description.to_owned(),
            operation_index,
            context: format!("key {key}"),
        });
    }

    fn check(&mut self, index: usize) {
        self.checker.check_sorted_keys(self.tree.as_tree(), index);
        self.checker
            .check_model_agreement(self.tree.as_tree(), &self.model, index);
        match &self.tree {
            SimTree::Avl(tree) => self.checker.check_avl_balance(tree, index),
            SimTree::Scapegoat(tree) => {
                self.checker.check_scapegoat_depth(tree, self.peak_len, index);
            }
            SimTree::Unbalanced(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_passes(config: SimulatorConfig, ops: usize) {
        let result = Simulator::new(config).run(ops);
        assert!(
            result.passed(),
            "seed {} ({}) failed: {:?}",
            result.seed,
            result.kind,
            result.invariant_violations.first()
        );
    }

    #[test]
    fn test_avl_seeds() {
        for seed in 0..20 {
            assert_passes(SimulatorConfig::new(seed, TreeKind::Avl), 400);
        }
    }

    #[test]
    fn test_scapegoat_seeds() {
        for seed in 0..20 {
            assert_passes(SimulatorConfig::new(seed, TreeKind::Scapegoat), 400);
        }
    }

    #[test]
    fn test_scapegoat_tight_alpha() {
        for seed in 100..110 {
            assert_passes(
                SimulatorConfig::new(seed, TreeKind::Scapegoat).with_alpha(0.55),
                400,
            );
        }
    }

    #[test]
    fn test_unbalanced_seeds() {
        for seed in 0..10 {
            assert_passes(SimulatorConfig::new(seed, TreeKind::Unbalanced), 300);
        }
    }

    #[test]
    fn test_insert_heavy_ascending_runs() {
        let config = OpGenConfig {
            key_space: 1024,
            remove_rate: 0.05,
            set_rate: 0.0,
            ascending_rate: 0.9,
        };
        for kind in [TreeKind::Avl, TreeKind::Scapegoat] {
            assert_passes(SimulatorConfig::new(42, kind).with_op_config(config.clone()), 600);
        }
    }

    #[test]
    fn test_runs_are_reproducible() {
        let a = Simulator::new(SimulatorConfig::new(99, TreeKind::Scapegoat)).run(300);
        let b = Simulator::new(SimulatorConfig::new(99, TreeKind::Scapegoat)).run(300);
        assert_eq!(a.final_len, b.final_len);
    }
}
