//! Ordered in-memory binary search trees used by the term indexes.
//!
//! All trees share one arena-backed structure ([`SearchTree`]) and differ only
//! in their [`Balance`] policy:
//!
//! - [`UnbalancedTree`]: plain BST, O(n) worst case.
//! - [`AvlTree`]: height-balanced after every insert and remove.
//! - [`ScapegoatTree`]: weight-balanced by occasional subtree rebuilds.
//!
//! Trees are not synchronized. Concurrent readers are fine once building has
//! finished; mutation requires exclusive access (`&mut`), so sharing across
//! threads goes through an external lock.
//!
//! # Usage
//!
//! ```
//! use engine::storage::tree::{AvlTree, BinaryTree};
//!
//! let mut tree: AvlTree<u32, &str> = AvlTree::new();
//! tree.add(2, "two");
//! tree.add(1, "one");
//! assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
//! assert!(tree.remove(&1));
//! assert!(tree.get(&1).is_err());
//! ```

mod avl;
mod node;
mod scapegoat;
mod unbalanced;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub use avl::{AvlBalance, balance_factor};
pub use node::{Node, NodeId, TreeArena};
pub use scapegoat::ScapegoatBalance;
pub use unbalanced::Unbalanced;

/// Error returned by the indexer-style accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The key is not present in the tree.
    KeyNotFound,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyNotFound => write!(f, "key not found in tree"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Comparator used to order tree keys.
pub trait KeyOrder<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<K: Ord> KeyOrder<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders keys with an arbitrary comparison function.
#[derive(Clone, Copy)]
pub struct FnOrder<F>(pub F);

impl<F> fmt::Debug for FnOrder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnOrder")
    }
}

impl<K, F: Fn(&K, &K) -> Ordering> KeyOrder<K> for FnOrder<F> {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

/// Rebalancing hooks invoked by [`SearchTree`] after structural changes.
pub trait Balance<K, V> {
    /// Called after `node` was linked in as a new leaf.
    fn after_insert(&mut self, arena: &mut TreeArena<K, V>, node: NodeId);

    /// Called after a node was unlinked; `parent` is the parent of the
    /// physically removed slot.
    fn after_remove(&mut self, arena: &mut TreeArena<K, V>, parent: Option<NodeId>);

    /// Called after the tree was cleared.
    fn reset(&mut self) {}
}

/// Common contract of every index tree.
///
/// `nodes`, `keys` and `values` are lazy in-order sequences over the live
/// tree; calling them again restarts from the smallest key.
pub trait BinaryTree<K, V> {
    /// Insert `key`, overwriting the value if it already exists.
    ///
    /// Returns `true` when a new node was created.
    fn add(&mut self, key: K, value: V) -> bool;

    /// Find the node holding `key`.
    fn find(&self, key: &K) -> Option<&Node<K, V>>;

    /// Remove `key`. Returns `false` if it was absent.
    fn remove(&mut self, key: &K) -> bool;

    /// Indexer read.
    fn get<'a>(&'a self, key: &K) -> Result<&'a V, TreeError>
    where
        K: 'a,
    {
        self.find(key).map(Node::value).ok_or(TreeError::KeyNotFound)
    }

    /// Indexer write. Only existing keys can be assigned.
    fn set(&mut self, key: &K, value: V) -> Result<(), TreeError>;

    /// Mutable access to the value stored under `key`.
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;

    fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// The root node, if any.
    fn root(&self) -> Option<&Node<K, V>>;

    /// In-order node sequence.
    fn nodes(&self) -> Nodes<'_, K, V>;

    fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.nodes())
    }

    fn values(&self) -> Values<'_, K, V> {
        Values(self.nodes())
    }
}

/// In-order iterator over tree nodes.
pub struct Nodes<'a, K, V> {
    arena: &'a TreeArena<K, V>,
    next: Option<NodeId>,
}

impl<'a, K, V> Nodes<'a, K, V> {
    fn new(arena: &'a TreeArena<K, V>) -> Self {
        let next = arena.root().map(|root| arena.min_of(root));
        Self { arena, next }
    }
}

impl<'a, K, V> Iterator for Nodes<'a, K, V> {
    type Item = &'a Node<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.arena.successor(current);
        Some(&self.arena[current])
    }
}

/// In-order iterator over tree keys.
pub struct Keys<'a, K, V>(Nodes<'a, K, V>);

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(Node::key)
    }
}

/// In-order iterator over tree values.
pub struct Values<'a, K, V>(Nodes<'a, K, V>);

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(Node::value)
    }
}

/// Arena-backed binary search tree parameterized by a balance policy and a
/// key comparator.
#[derive(Debug, Clone)]
pub struct SearchTree<K, V, B, C = NaturalOrder> {
    arena: TreeArena<K, V>,
    order: C,
    balance: B,
}

/// Plain binary search tree.
pub type UnbalancedTree<K, V, C = NaturalOrder> = SearchTree<K, V, Unbalanced, C>;
/// AVL tree.
pub type AvlTree<K, V, C = NaturalOrder> = SearchTree<K, V, AvlBalance, C>;
/// Scapegoat tree.
pub type ScapegoatTree<K, V, C = NaturalOrder> = SearchTree<K, V, ScapegoatBalance, C>;

impl<K: Ord, V, B: Default> SearchTree<K, V, B, NaturalOrder> {
    /// Create an empty tree ordered by `K: Ord`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(NaturalOrder, B::default())
    }
}

impl<K: Ord, V, B: Default> Default for SearchTree<K, V, B, NaturalOrder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> SearchTree<K, V, ScapegoatBalance, NaturalOrder> {
    /// Create an empty scapegoat tree with balance factor `alpha`.
    #[must_use]
    pub fn with_alpha(alpha: f64) -> Self {
        Self::with_parts(NaturalOrder, ScapegoatBalance::new(alpha))
    }
}

impl<K, V, B, C> SearchTree<K, V, B, C> {
    /// Create an empty tree from an explicit comparator and balance policy.
    pub fn with_parts(order: C, balance: B) -> Self {
        Self {
            arena: TreeArena::default(),
            order,
            balance,
        }
    }

    /// The balance policy (exposes policy state such as scapegoat counters).
    pub const fn balance(&self) -> &B {
        &self.balance
    }

    /// The underlying node structure.
    pub const fn arena(&self) -> &TreeArena<K, V> {
        &self.arena
    }

    /// Height recomputed from the structure.
    #[must_use]
    pub fn height(&self) -> usize {
        self.arena.computed_height(self.arena.root())
    }
}

impl<K, V, B, C: KeyOrder<K>> SearchTree<K, V, B, C> {
    fn locate(&self, key: &K) -> Option<NodeId> {
        let mut current = self.arena.root();
        while let Some(id) = current {
            current = match self.order.compare(key, &self.arena[id].key) {
                Ordering::Less => self.arena[id].left,
                Ordering::Greater => self.arena[id].right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Depth of the node holding `key` (root = 0).
    #[must_use]
    pub fn depth_of(&self, key: &K) -> Option<usize> {
        self.locate(key).map(|id| self.arena.depth(id))
    }
}

impl<K, V, B, C> BinaryTree<K, V> for SearchTree<K, V, B, C>
where
    B: Balance<K, V>,
    C: KeyOrder<K>,
{
    fn add(&mut self, key: K, value: V) -> bool {
        let Some(mut current) = self.arena.root() else {
            let id = self.arena.alloc(key, value, None);
            self.arena.root = Some(id);
            self.balance.after_insert(&mut self.arena, id);
            return true;
        };
        loop {
            match self.order.compare(&key, &self.arena[current].key) {
                Ordering::Equal => {
                    self.arena[current].value = value;
                    return false;
                }
                Ordering::Less => {
                    if let Some(left) = self.arena[current].left {
                        current = left;
                    } else {
                        let id = self.arena.alloc(key, value, Some(current));
                        self.arena[current].left = Some(id);
                        self.balance.after_insert(&mut self.arena, id);
                        return true;
                    }
                }
                Ordering::Greater => {
                    if let Some(right) = self.arena[current].right {
                        current = right;
                    } else {
                        let id = self.arena.alloc(key, value, Some(current));
                        self.arena[current].right = Some(id);
                        self.balance.after_insert(&mut self.arena, id);
                        return true;
                    }
                }
            }
        }
    }

    fn find(&self, key: &K) -> Option<&Node<K, V>> {
        self.locate(key).map(|id| &self.arena[id])
    }

    fn remove(&mut self, key: &K) -> bool {
        let Some(id) = self.locate(key) else {
            return false;
        };
        let (_, parent) = self.arena.unlink(id);
        self.balance.after_remove(&mut self.arena, parent);
        true
    }

    fn set(&mut self, key: &K, value: V) -> Result<(), TreeError> {
        let slot = self.get_mut(key).ok_or(TreeError::KeyNotFound)?;
        *slot = value;
        Ok(())
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = self.locate(key)?;
        Some(&mut self.arena[id].value)
    }

    fn len(&self) -> usize {
        self.arena.len()
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.balance.reset();
    }

    fn root(&self) -> Option<&Node<K, V>> {
        self.arena.root().map(|id| &self.arena[id])
    }

    fn nodes(&self) -> Nodes<'_, K, V> {
        Nodes::new(&self.arena)
    }
}

/// Which balancing strategy an index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeKind {
    Unbalanced,
    #[default]
    Avl,
    Scapegoat,
}

impl TreeKind {
    /// Build an empty, boxed tree of this kind.
    ///
    /// `alpha` is only used by [`TreeKind::Scapegoat`].
    #[must_use]
    pub fn build<K, V>(self, alpha: f64) -> Box<dyn BinaryTree<K, V> + Send + Sync>
    where
        K: Ord + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        match self {
            Self::Unbalanced => Box::new(UnbalancedTree::<K, V>::new()),
            Self::Avl => Box::new(AvlTree::<K, V>::new()),
            Self::Scapegoat => Box::new(ScapegoatTree::<K, V>::with_alpha(alpha)),
        }
    }
}

impl FromStr for TreeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unbalanced" => Ok(Self::Unbalanced),
            "avl" => Ok(Self::Avl),
            "scapegoat" => Ok(Self::Scapegoat),
            other => Err(format!(
                "'{other}' is not a tree kind (expected avl, scapegoat or unbalanced)"
            )),
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbalanced => write!(f, "unbalanced"),
            Self::Avl => write!(f, "avl"),
            Self::Scapegoat => write!(f, "scapegoat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(tree: &mut dyn BinaryTree<i32, i32>) {
        for key in [5, 3, 8, 1, 4, 7, 9, 2, 6] {
            assert!(tree.add(key, key * 100));
        }
        assert!(!tree.add(4, 44));
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.get(&4), Ok(&44));
        assert_eq!(
            tree.keys().copied().collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9]
        );

        assert!(tree.remove(&5));
        assert!(!tree.remove(&5));
        assert!(tree.find(&5).is_none());
        assert_eq!(tree.get(&5), Err(TreeError::KeyNotFound));
        assert_eq!(
            tree.values().copied().collect::<Vec<_>>(),
            vec![100, 200, 300, 44, 600, 700, 800, 900]
        );

        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.nodes().count(), 0);
    }

    #[test]
    fn test_every_kind_honors_contract() {
        for kind in [TreeKind::Unbalanced, TreeKind::Avl, TreeKind::Scapegoat] {
            let mut tree = kind.build::<i32, i32>(0.75);
            exercise(tree.as_mut());
        }
    }

    #[test]
    fn test_empty_tree_lookups() {
        let mut tree: AvlTree<i32, i32> = AvlTree::new();
        assert!(tree.find(&1).is_none());
        assert!(!tree.remove(&1));
        assert_eq!(tree.get(&1), Err(TreeError::KeyNotFound));
        assert_eq!(tree.set(&1, 5), Err(TreeError::KeyNotFound));
    }

    #[test]
    fn test_set_overwrites_existing() {
        let mut tree: ScapegoatTree<&str, i32> = ScapegoatTree::new();
        tree.add("a", 1);
        tree.set(&"a", 2).expect("key exists");
        assert_eq!(tree.get(&"a"), Ok(&2));
        if let Some(value) = tree.get_mut(&"a") {
            *value += 1;
        }
        assert_eq!(tree.get(&"a"), Ok(&3));
    }

    #[test]
    fn test_custom_comparator_reverses_order() {
        let mut tree = UnbalancedTree::with_parts(
            FnOrder(|a: &i32, b: &i32| b.cmp(a)),
            Unbalanced,
        );
        for key in [2, 9, 4] {
            tree.add(key, ());
        }
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![9, 4, 2]);
    }

    #[test]
    fn test_keys_restart_after_mutation() {
        let mut tree: AvlTree<i32, ()> = AvlTree::new();
        tree.add(1, ());
        assert_eq!(tree.keys().count(), 1);
        tree.add(0, ());
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_tree_kind_parse() {
        assert_eq!("AVL".parse::<TreeKind>(), Ok(TreeKind::Avl));
        assert_eq!("scapegoat".parse::<TreeKind>(), Ok(TreeKind::Scapegoat));
        assert!("red-black".parse::<TreeKind>().is_err());
        assert_eq!(TreeKind::Unbalanced.to_string(), "unbalanced");
    }
}
