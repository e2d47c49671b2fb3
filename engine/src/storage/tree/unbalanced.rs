//! No-op balance policy.

use super::{Balance, NodeId, TreeArena};

/// Leaves the tree shape exactly as insertion order produces it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbalanced;

impl<K, V> Balance<K, V> for Unbalanced {
    fn after_insert(&mut self, _arena: &mut TreeArena<K, V>, _node: NodeId) {}

    fn after_remove(&mut self, _arena: &mut TreeArena<K, V>, _parent: Option<NodeId>) {}
}

#[cfg(test)]
mod tests {
    use crate::storage::tree::{BinaryTree, UnbalancedTree};

    #[test]
    fn test_sorted_inserts_degenerate_to_chain() {
        let mut tree = UnbalancedTree::new();
        for key in 0..10 {
            tree.add(key, ());
        }
        assert_eq!(tree.height(), 10);
        assert_eq!(tree.depth_of(&9), Some(9));
    }

    #[test]
    fn test_delete_root_with_two_children() {
        let mut tree = UnbalancedTree::new();
        for key in [2, 1, 3] {
            tree.add(key, key);
        }
        assert!(tree.remove(&2));
        assert_eq!(tree.root().map(|n| *n.key()), Some(1));
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_delete_leaf_and_inner_nodes() {
        let mut tree = UnbalancedTree::new();
        for key in [5, 2, 8, 1, 3, 7, 9, 4] {
            tree.add(key, key);
        }
        assert!(tree.remove(&4));
        assert!(tree.remove(&2));
        assert!(tree.remove(&8));
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9]);
        assert_eq!(tree.len(), 5);
    }
}
