//! Arena storage for binary search tree nodes.
//!
//! Nodes live in a slot vector and refer to each other by [`NodeId`]. Child
//! links express ownership (a node is reachable from the root exactly once);
//! the parent link is a plain back-reference used by rebalancing walks and
//! in-order successor lookups. Nothing outside the tree can hold a `NodeId`
//! across a mutation, so stale ids never escape.
//!
//! # Invariants
//!
//! - For every live node `n` with child `c`: `arena[c].parent == Some(n)`.
//! - The root has no parent.
//! - Freed slots are `None` and listed in `free`.

use std::ops::{Index, IndexMut};

/// Index of a node inside a [`TreeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A key/value node with structural links.
#[derive(Debug, Clone)]
pub struct Node<K, V> {
    pub(super) key: K,
    pub(super) value: V,
    pub(super) parent: Option<NodeId>,
    pub(super) left: Option<NodeId>,
    pub(super) right: Option<NodeId>,
    /// Height of the subtree rooted here (leaf = 1). Maintained by AVL and by
    /// rebuilds; other policies leave it stale.
    pub(super) height: usize,
}

impl<K, V> Node<K, V> {
    const fn new(key: K, value: V, parent: Option<NodeId>) -> Self {
        Self {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 1,
        }
    }

    /// The node's key.
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// The node's value.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }
}

/// Slot storage plus the root pointer of one tree.
#[derive(Debug, Clone)]
pub struct TreeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    len: usize,
    pub(super) root: Option<NodeId>,
}

impl<K, V> Default for TreeArena<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            root: None,
        }
    }
}

// Ids come from `alloc` and are only stored in live links. `release` runs
// after the node is unlinked, so indexing through a link always hits a live
// slot. A miss here is a corrupted tree.
impl<K, V> Index<NodeId> for TreeArena<K, V> {
    type Output = Node<K, V>;

    fn index(&self, id: NodeId) -> &Self::Output {
        let node = self.get(id);
        debug_assert!(node.is_some(), "dangling tree node id {}", id.0);
        node.unwrap_or_else(|| unreachable!("dangling tree node id {}", id.0))
    }
}

impl<K, V> IndexMut<NodeId> for TreeArena<K, V> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        let node = self.get_mut(id);
        debug_assert!(node.is_some(), "dangling tree node id {}", id.0);
        node.unwrap_or_else(|| unreachable!("dangling tree node id {}", id.0))
    }
}

impl<K, V> TreeArena<K, V> {
    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The root node id, if any.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Look up a node without panicking on stale ids.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub(super) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(super) fn alloc(&mut self, key: K, value: V, parent: Option<NodeId>) -> NodeId {
        let node = Node::new(key, value, parent);
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(node);
            NodeId(slot)
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() - 1)
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node<K, V>> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(node)
    }

    pub(super) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
        self.root = None;
    }

    /// Exchange the key/value payloads of two distinct nodes, leaving links intact.
    fn swap_payload(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        let Some(mut taken) = self.slots.get_mut(b.0).and_then(Option::take) else {
            return;
        };
        {
            let target = &mut self[a];
            std::mem::swap(&mut target.key, &mut taken.key);
            std::mem::swap(&mut target.value, &mut taken.value);
        }
        self.slots[b.0] = Some(taken);
    }

    /// Point `parent`'s link (or the root) that referenced `old` at `new` instead.
    pub(super) fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self[p].left == Some(old) {
                    self[p].left = new;
                } else {
                    self[p].right = new;
                }
            }
        }
    }

    /// Left rotation around `x`. Returns the new subtree root.
    pub(super) fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self[x].right else {
            return x;
        };
        let inner = self[y].left;
        self[x].right = inner;
        if let Some(b) = inner {
            self[b].parent = Some(x);
        }
        let parent = self[x].parent;
        self[y].parent = parent;
        self.replace_child(parent, x, Some(y));
        self[y].left = Some(x);
        self[x].parent = Some(y);
        y
    }

    /// Right rotation around `x`. Returns the new subtree root.
    pub(super) fn rotate_right(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self[x].left else {
            return x;
        };
        let inner = self[y].right;
        self[x].left = inner;
        if let Some(b) = inner {
            self[b].parent = Some(x);
        }
        let parent = self[x].parent;
        self[y].parent = parent;
        self.replace_child(parent, x, Some(y));
        self[y].right = Some(x);
        self[x].parent = Some(y);
        y
    }

    /// Leftmost node of the subtree at `id`.
    #[must_use]
    pub fn min_of(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self[id].left {
            id = left;
        }
        id
    }

    /// Rightmost node of the subtree at `id`.
    #[must_use]
    pub fn max_of(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self[id].right {
            id = right;
        }
        id
    }

    /// In-order successor using parent links.
    #[must_use]
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self[id].right {
            return Some(self.min_of(right));
        }
        let mut child = id;
        let mut parent = self[id].parent;
        while let Some(p) = parent {
            if self[p].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self[p].parent;
        }
        None
    }

    /// Number of edges between `id` and the root.
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self[id].parent;
        while let Some(p) = current {
            depth += 1;
            current = self[p].parent;
        }
        depth
    }

    /// Number of nodes in the subtree rooted at `id`.
    #[must_use]
    pub fn subtree_size(&self, id: Option<NodeId>) -> usize {
        let mut stack: Vec<NodeId> = id.into_iter().collect();
        let mut count = 0;
        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend(self[current].left);
            stack.extend(self[current].right);
        }
        count
    }

    /// Height recomputed from the structure (empty = 0, leaf = 1).
    #[must_use]
    pub fn computed_height(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |n| {
            1 + self
                .computed_height(self[n].left)
                .max(self.computed_height(self[n].right))
        })
    }

    /// Node ids of the subtree at `id`, in key order.
    #[must_use]
    pub fn in_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = Vec::new();
        let mut current = Some(id);
        while current.is_some() || !stack.is_empty() {
            while let Some(n) = current {
                stack.push(n);
                current = self[n].left;
            }
            if let Some(n) = stack.pop() {
                ids.push(n);
                current = self[n].right;
            }
        }
        ids
    }

    /// Unlink and free `id`, returning its value and the parent of the node
    /// that was physically removed (where rebalancing must start).
    ///
    /// A node with two children takes over its in-order predecessor's payload
    /// and the predecessor's slot is freed instead.
    pub(super) fn unlink(&mut self, id: NodeId) -> (Option<V>, Option<NodeId>) {
        let mut target = id;
        if let (Some(left), Some(_)) = (self[id].left, self[id].right) {
            let predecessor = self.max_of(left);
            self.swap_payload(id, predecessor);
            target = predecessor;
        }
        let child = self[target].left.or(self[target].right);
        let parent = self[target].parent;
        if let Some(c) = child {
            self[c].parent = parent;
        }
        self.replace_child(parent, target, child);
        let value = self.release(target).map(|node| node.value);
        (value, parent)
    }

    /// Relink the subtree at `id` into a perfectly balanced shape.
    ///
    /// Node ids are reused; only links and heights change. Returns the new
    /// subtree root.
    pub(super) fn rebuild(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self[id].parent;
        let ordered = self.in_order(id);
        let new_root = self.link_balanced(&ordered, parent);
        self.replace_child(parent, id, new_root);
        new_root
    }

    fn link_balanced(&mut self, ids: &[NodeId], parent: Option<NodeId>) -> Option<NodeId> {
        if ids.is_empty() {
            return None;
        }
        let mid = ids.len() / 2;
        let node = ids[mid];
        self[node].parent = parent;
        let left = self.link_balanced(&ids[..mid], Some(node));
        let right = self.link_balanced(&ids[mid + 1..], Some(node));
        let height = 1 + left
            .map_or(0, |l| self[l].height)
            .max(right.map_or(0, |r| self[r].height));
        let entry = &mut self[node];
        entry.left = left;
        entry.right = right;
        entry.height = height;
        Some(node)
    }
}
