//! Invariant checking for deterministic simulation testing.
//!
//! Every check records an [`InvariantViolation`] instead of panicking so a
//! simulation run can report all failures for a seed at once.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::storage::tree::{
    AvlTree, BinaryTree, NodeId, ScapegoatTree, TreeArena, balance_factor,
};

/// An invariant violation detected during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Checker for index-tree invariants.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn clear(&mut self) {
        self.violations.clear();
    }

    pub fn add_violation(&mut self, violation: InvariantViolation) {
        self.violations.push(violation);
    }

    fn violation(&mut self, description: &str, operation_index: usize, context: String) {
        self.violations.push(InvariantViolation {
            description: description.to_owned(),
            operation_index,
            context,
        });
    }

    /// In-order keys are strictly increasing.
    pub fn check_sorted_keys<K, T>(&mut self, tree: &T, operation_index: usize)
    where
        K: Ord + Debug,
        T: BinaryTree<K, u32> + ?Sized,
    {
        let keys: Vec<&K> = tree.keys().collect();
        if let Some(pair) = keys.windows(2).find(|pair| pair[0] >= pair[1]) {
            self.violation(
                "Keys out of order",
                operation_index,
                format!("{:?} before {:?}", pair[0], pair[1]),
            );
        }
        if keys.len() != tree.len() {
            self.violation(
                "Traversal length differs from len()",
                operation_index,
                format!("traversed {}, len {}", keys.len(), tree.len()),
            );
        }
    }

    /// The tree holds exactly the model's entries.
    pub fn check_model_agreement<K, T>(
        &mut self,
        tree: &T,
        model: &BTreeMap<K, u32>,
        operation_index: usize,
    ) where
        K: Ord + Debug,
        T: BinaryTree<K, u32> + ?Sized,
    {
        if tree.len() != model.len() {
            self.violation(
                "Tree size differs from model",
                operation_index,
                format!("tree {}, model {}", tree.len(), model.len()),
            );
        }
        for (key, expected) in model {
            match tree.get(key) {
                Ok(actual) if actual == expected => {}
                Ok(actual) => self.violation(
                    "Tree value differs from model",
                    operation_index,
                    format!("key {key:?}: tree {actual}, model {expected}"),
                ),
                Err(error) => self.violation(
                    "Model key missing from tree",
                    operation_index,
                    format!("key {key:?}: {error}"),
                ),
            }
        }
    }

    /// Every AVL node has a balance factor in `-1..=1`.
    pub fn check_avl_balance<K: Ord + Debug>(&mut self, tree: &AvlTree<K, u32>, operation_index: usize) {
        let arena = tree.arena();
        for id in all_nodes(arena) {
            let factor = balance_factor(arena, id);
            if factor.abs() > 1 {
                self.violation(
                    "AVL node out of balance",
                    operation_index,
                    format!("key {:?}: balance factor {factor}", arena[id].key()),
                );
            }
        }
    }

    /// No scapegoat node sits deeper than the bound for `peak_count` nodes,
    /// the largest size the tree has reached.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Depth limits are small and non-negative
    pub fn check_scapegoat_depth<K: Ord + Debug>(
        &mut self,
        tree: &ScapegoatTree<K, u32>,
        peak_count: usize,
        operation_index: usize,
    ) {
        let limit = tree.balance().depth_limit(peak_count).floor() as usize + 1;
        let depth = tree.height().saturating_sub(1);
        if depth > limit {
            self.violation(
                "Scapegoat tree too deep",
                operation_index,
                format!("depth {depth}, limit {limit}, peak size {peak_count}"),
            );
        }
    }
}

fn all_nodes<K, V>(arena: &TreeArena<K, V>) -> Vec<NodeId> {
    arena.root().map(|root| arena.in_order(root)).unwrap_or_default()
}
