//! Scapegoat balance policy.
//!
//! No per-node balance data is kept. An insert whose depth exceeds
//! `log_{1/α}(n)` walks back up, accumulating subtree sizes, until it meets an
//! ancestor that is not α-weight-balanced; that subtree is rebuilt into a
//! perfectly balanced shape. Removes only count: once the tree has shrunk to
//! half of its high-water mark it is rebuilt and the mark reset.

use super::{Balance, NodeId, TreeArena};

/// Weight-balancing policy for [`super::ScapegoatTree`].
#[derive(Debug, Clone, Copy)]
pub struct ScapegoatBalance {
    alpha: f64,
    max_node_count: usize,
    rebuilds: usize,
}

impl Default for ScapegoatBalance {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ALPHA)
    }
}

impl ScapegoatBalance {
    /// Default balance factor.
    pub const DEFAULT_ALPHA: f64 = 0.75;

    /// Create a policy with balance factor `alpha`.
    ///
    /// Values outside the open interval (0.5, 1.0) fall back to
    /// [`Self::DEFAULT_ALPHA`].
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha > 0.5 && alpha < 1.0 {
            alpha
        } else {
            Self::DEFAULT_ALPHA
        };
        Self {
            alpha,
            max_node_count: 0,
            rebuilds: 0,
        }
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// High-water node count since the last full rebuild.
    #[must_use]
    pub const fn max_node_count(&self) -> usize {
        self.max_node_count
    }

    /// Number of subtree rebuilds performed so far.
    #[must_use]
    pub const fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// `log_{1/α}(count)`, the deepest depth a node may have.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Node counts stay far below 2^52
    pub fn depth_limit(&self, count: usize) -> f64 {
        if count <= 1 {
            return 0.0;
        }
        (count as f64).ln() / (1.0 / self.alpha).ln()
    }

    #[allow(clippy::cast_precision_loss)]
    fn is_weight_balanced(&self, child_size: usize, total: usize) -> bool {
        child_size as f64 <= self.alpha * total as f64
    }

    fn is_node_balanced<K, V>(&self, arena: &TreeArena<K, V>, id: NodeId) -> bool {
        let left = arena.subtree_size(arena[id].left);
        let right = arena.subtree_size(arena[id].right);
        let total = left + right + 1;
        self.is_weight_balanced(left, total) && self.is_weight_balanced(right, total)
    }

    fn rebuild<K, V>(&mut self, arena: &mut TreeArena<K, V>, id: NodeId) {
        self.rebuilds += 1;
        arena.rebuild(id);
    }
}

impl<K, V> Balance<K, V> for ScapegoatBalance {
    #[allow(clippy::cast_precision_loss)]
    fn after_insert(&mut self, arena: &mut TreeArena<K, V>, node: NodeId) {
        let count = arena.len();
        self.max_node_count = self.max_node_count.max(count);
        if arena.depth(node) as f64 <= self.depth_limit(count) {
            return;
        }

        let mut child = node;
        let mut child_size = 1;
        let mut current = arena[node].parent;
        while let Some(id) = current {
            let sibling = if arena[id].left == Some(child) {
                arena[id].right
            } else {
                arena[id].left
            };
            let sibling_size = arena.subtree_size(sibling);
            let total = child_size + sibling_size + 1;
            if !self.is_weight_balanced(child_size, total)
                || !self.is_weight_balanced(sibling_size, total)
            {
                tracing::trace!(subtree_size = total, "rebuilding scapegoat subtree");
                self.rebuild(arena, id);
                return;
            }
            child = id;
            child_size = total;
            current = arena[id].parent;
        }

        // Depth violated without any unbalanced ancestor: rebuild everything.
        if let Some(root) = arena.root() {
            self.rebuild(arena, root);
        }
    }

    fn after_remove(&mut self, arena: &mut TreeArena<K, V>, parent: Option<NodeId>) {
        let count = arena.len();
        if count == 0 {
            self.max_node_count = 0;
            return;
        }
        if count * 2 > self.max_node_count {
            return;
        }

        let mut scapegoat = None;
        let mut current = parent;
        while let Some(id) = current {
            if !self.is_node_balanced(arena, id) {
                scapegoat = Some(id);
            }
            current = arena[id].parent;
        }
        if let Some(start) = scapegoat.or_else(|| arena.root()) {
            tracing::trace!(nodes = count, "rebuilding after removals");
            self.rebuild(arena, start);
        }
        self.max_node_count = count;
    }

    fn reset(&mut self) {
        self.max_node_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::{BinaryTree, ScapegoatTree};

    /// Every node sits within `log_{1/α}(n)` of the root.
    #[allow(clippy::cast_precision_loss)]
    fn assert_height_balanced(tree: &ScapegoatTree<i32, i32>) {
        let limit = tree.balance().depth_limit(tree.len());
        for key in tree.keys() {
            let depth = tree.depth_of(key).expect("listed key is present");
            assert!(
                depth as f64 <= limit,
                "key {key} at depth {depth}, limit {limit:.3} for {} nodes",
                tree.len()
            );
        }
    }

    #[test]
    fn test_ascending_inserts_trigger_rebuilds() {
        let mut tree = ScapegoatTree::new();
        for key in 0..200 {
            tree.add(key, key);
            assert_height_balanced(&tree);
        }
        assert!(tree.balance().rebuilds() > 0);
        assert_eq!(tree.keys().count(), 200);
    }

    #[test]
    fn test_descending_inserts_stay_height_balanced() {
        let mut tree = ScapegoatTree::new();
        for key in (0..200).rev() {
            tree.add(key, key);
            assert_height_balanced(&tree);
        }
        assert!(tree.balance().rebuilds() > 0);
    }

    #[test]
    fn test_random_inserts_stay_height_balanced() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tree = ScapegoatTree::new();
            for _ in 0..300 {
                let key = rng.random_range(0..1_000);
                tree.add(key, key);
                assert_height_balanced(&tree);
            }
        }
    }

    #[test]
    fn test_mass_removal_rebuilds_and_resets_max() {
        let mut tree = ScapegoatTree::new();
        for key in 0..32 {
            tree.add(key, key);
        }
        assert_eq!(tree.balance().max_node_count(), 32);
        for key in 0..16 {
            assert!(tree.remove(&key));
        }
        assert_eq!(tree.balance().max_node_count(), 16);
        assert_eq!(
            tree.keys().copied().collect::<Vec<_>>(),
            (16..32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_alpha_out_of_range_falls_back() {
        assert!((ScapegoatBalance::new(0.3).alpha() - 0.75).abs() < f64::EPSILON);
        assert!((ScapegoatBalance::new(0.6).alpha() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_depth_limit_grows_logarithmically() {
        let policy = ScapegoatBalance::default();
        assert!(policy.depth_limit(1).abs() < f64::EPSILON);
        let small = policy.depth_limit(16);
        let large = policy.depth_limit(256);
        assert!((large - 2.0 * small).abs() < 1e-9);
    }
}
