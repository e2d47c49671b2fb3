//! AVL balance policy.
//!
//! Every node stores its subtree height. After an insert the walk runs from
//! the new node's parent to the root, rotating wherever
//! `height(right) - height(left)` reaches ±2. After a remove the same walk
//! runs from the removed slot's parent and stops as soon as a subtree's
//! height comes out unchanged, which is exactly the point where the subtree
//! root settles at balance ±1 (or at 0 with the same height after a rotation).

use super::{Balance, NodeId, TreeArena};

/// Height-balancing policy for [`super::AvlTree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AvlBalance;

fn height<K, V>(arena: &TreeArena<K, V>, id: Option<NodeId>) -> usize {
    id.map_or(0, |n| arena[n].height)
}

fn update_height<K, V>(arena: &mut TreeArena<K, V>, id: NodeId) {
    let left = height(arena, arena[id].left);
    let right = height(arena, arena[id].right);
    arena[id].height = 1 + left.max(right);
}

/// `height(right) - height(left)` of a node.
#[allow(clippy::cast_possible_wrap)] // Heights are bounded by ~1.44 log2(n)
pub fn balance_factor<K, V>(arena: &TreeArena<K, V>, id: NodeId) -> isize {
    height(arena, arena[id].right) as isize - height(arena, arena[id].left) as isize
}

fn rotate_left<K, V>(arena: &mut TreeArena<K, V>, id: NodeId) -> NodeId {
    let pivot = arena.rotate_left(id);
    update_height(arena, id);
    update_height(arena, pivot);
    pivot
}

fn rotate_right<K, V>(arena: &mut TreeArena<K, V>, id: NodeId) -> NodeId {
    let pivot = arena.rotate_right(id);
    update_height(arena, id);
    update_height(arena, pivot);
    pivot
}

/// Restore the AVL property at `id`. Returns the root of the (possibly
/// rotated) subtree.
fn rebalance<K, V>(arena: &mut TreeArena<K, V>, id: NodeId) -> NodeId {
    update_height(arena, id);
    match balance_factor(arena, id) {
        2 => {
            let Some(right) = arena[id].right else {
                return id;
            };
            if balance_factor(arena, right) < 0 {
                rotate_right(arena, right);
            }
            rotate_left(arena, id)
        }
        -2 => {
            let Some(left) = arena[id].left else {
                return id;
            };
            if balance_factor(arena, left) > 0 {
                rotate_left(arena, left);
            }
            rotate_right(arena, id)
        }
        _ => id,
    }
}

impl<K, V> Balance<K, V> for AvlBalance {
    fn after_insert(&mut self, arena: &mut TreeArena<K, V>, node: NodeId) {
        arena[node].height = 1;
        let mut current = arena[node].parent;
        while let Some(id) = current {
            let subtree = rebalance(arena, id);
            current = arena[subtree].parent;
        }
    }

    fn after_remove(&mut self, arena: &mut TreeArena<K, V>, parent: Option<NodeId>) {
        let mut current = parent;
        while let Some(id) = current {
            let before = arena[id].height;
            let subtree = rebalance(arena, id);
            if arena[subtree].height == before {
                break;
            }
            current = arena[subtree].parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tree::{AvlTree, BinaryTree};

    fn assert_balanced(tree: &AvlTree<i32, i32>) {
        let arena = tree.arena();
        let Some(root) = arena.root() else {
            return;
        };
        for id in arena.in_order(root) {
            let bf = balance_factor(arena, id);
            assert!(bf.abs() <= 1, "node {} has balance {bf}", arena[id].key());
            assert_eq!(
                arena[id].height,
                arena.computed_height(Some(id)),
                "stale height at {}",
                arena[id].key()
            );
        }
    }

    #[test]
    fn test_ascending_inserts_stay_balanced() {
        let mut tree = AvlTree::new();
        for key in 0..100 {
            tree.add(key, key);
            assert_balanced(&tree);
        }
        assert!(tree.height() <= 8);
    }

    #[test]
    fn test_double_rotation_right_left() {
        let mut tree = AvlTree::new();
        for key in [1, 3, 2] {
            tree.add(key, key);
        }
        let root = tree.root().expect("tree should have a root");
        assert_eq!(*root.key(), 2);
        assert_balanced(&tree);
    }

    #[test]
    fn test_double_rotation_left_right() {
        let mut tree = AvlTree::new();
        for key in [3, 1, 2] {
            tree.add(key, key);
        }
        assert_eq!(tree.root().map(|n| *n.key()), Some(2));
        assert_balanced(&tree);
    }

    #[test]
    fn test_removals_keep_balance() {
        let mut tree = AvlTree::new();
        for key in 0..64 {
            tree.add(key, key);
        }
        for key in (0..64).step_by(3) {
            assert!(tree.remove(&key));
            assert_balanced(&tree);
        }
        for key in (0..64).rev() {
            tree.remove(&key);
            assert_balanced(&tree);
        }
        assert!(tree.is_empty());
    }
}
