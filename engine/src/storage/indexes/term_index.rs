//! Term → fact id postings backed by an index tree.

use crate::storage::tree::{BinaryTree, Keys, TreeKind};
use crate::types::Term;

/// Position of a fact in the store's fact table.
pub type FactId = usize;

/// Maps a term to the ids of the facts containing it.
pub struct TermIndex {
    tree: Box<dyn BinaryTree<Term, Vec<FactId>> + Send + Sync>,
    kind: TreeKind,
}

impl std::fmt::Debug for TermIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermIndex")
            .field("kind", &self.kind)
            .field("terms", &self.tree.len())
            .finish()
    }
}

impl TermIndex {
    /// Create an empty index on a tree of the given kind.
    #[must_use]
    pub fn new(kind: TreeKind, alpha: f64) -> Self {
        Self {
            tree: kind.build(alpha),
            kind,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TreeKind {
        self.kind
    }

    /// Record that fact `id` contains `term`.
    pub fn insert(&mut self, term: &Term, id: FactId) {
        if let Some(postings) = self.tree.get_mut(term) {
            if let Err(position) = postings.binary_search(&id) {
                postings.insert(position, id);
            }
            return;
        }
        self.tree.add(term.clone(), vec![id]);
    }

    /// Forget that fact `id` contains `term`. Empty postings are dropped.
    pub fn remove(&mut self, term: &Term, id: FactId) {
        let now_empty = match self.tree.get_mut(term) {
            Some(postings) => {
                if let Ok(position) = postings.binary_search(&id) {
                    postings.remove(position);
                }
                postings.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.tree.remove(term);
        }
    }

    /// Ids of the facts containing `term`, ascending.
    #[must_use]
    pub fn lookup(&self, term: &Term) -> &[FactId] {
        self.tree
            .find(term)
            .map(|node| node.value().as_slice())
            .unwrap_or_default()
    }

    /// Distinct indexed terms in term order.
    #[must_use]
    pub fn terms(&self) -> Keys<'_, Term, Vec<FactId>> {
        self.tree.keys()
    }

    /// Number of distinct terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_remove() {
        let mut index = TermIndex::new(TreeKind::Scapegoat, 0.75);
        let a = Term::iri("a");
        let b = Term::iri("b");
        index.insert(&a, 3);
        index.insert(&a, 1);
        index.insert(&a, 3);
        index.insert(&b, 2);
        assert_eq!(index.lookup(&a), &[1, 3]);
        assert_eq!(index.len(), 2);

        index.remove(&a, 1);
        assert_eq!(index.lookup(&a), &[3]);
        index.remove(&a, 3);
        assert!(index.lookup(&a).is_empty());
        assert_eq!(index.terms().collect::<Vec<_>>(), vec![&b]);
    }

    #[test]
    fn test_missing_term_is_empty() {
        let index = TermIndex::new(TreeKind::Avl, 0.75);
        assert!(index.lookup(&Term::literal("nothing")).is_empty());
        assert!(index.is_empty());
    }
}
