//! In-memory fact pool.
//!
//! `TripleStore` keeps facts in a slot table and indexes them by subject,
//! predicate, object and graph name. A pattern lookup resolves every bound
//! position first, then scans only the smallest matching posting list.
//!
//! # Concurrency
//!
//! Lookups take `&self` and may run concurrently. Inserts, removes and
//! [`TripleStore::rebuild_indexes`] take `&mut self`; callers that share a
//! store between threads wrap it in a lock.

use std::collections::HashMap;

use super::indexes::{FactId, TermIndex};
use super::tree::{ScapegoatBalance, TreeKind};
use crate::query::{Solution, TriplePattern};
use crate::types::{Quad, Term};

/// The graphs a pattern is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActiveGraph {
    /// Only the unnamed default graph.
    #[default]
    Default,
    /// Only the listed named graphs.
    Named(Vec<Term>),
    /// Every graph, including the default graph.
    Union,
}

impl ActiveGraph {
    /// A single named graph.
    #[must_use]
    pub fn named(graph: Term) -> Self {
        Self::Named(vec![graph])
    }

    /// Whether a fact stored in `graph` (`None` = default graph) is visible.
    #[must_use]
    pub fn contains(&self, graph: Option<&Term>) -> bool {
        match (self, graph) {
            (Self::Union, _) | (Self::Default, None) => true,
            (Self::Default, Some(_)) | (Self::Named(_), None) => false,
            (Self::Named(graphs), Some(name)) => graphs.contains(name),
        }
    }
}

/// Source of facts for pattern matching.
pub trait FactPool: Send + Sync {
    /// Facts matching `pattern` in `graph`, with variables already bound in
    /// `input` treated as fixed terms.
    fn match_pattern<'a>(
        &'a self,
        pattern: &TriplePattern,
        graph: &ActiveGraph,
        input: Option<&Solution>,
    ) -> Box<dyn Iterator<Item = &'a Quad> + Send + 'a>;

    /// Names of all non-empty named graphs, in term order.
    fn graph_names(&self) -> Vec<Term>;

    /// Number of stored facts.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indexed in-memory quad store.
#[derive(Debug)]
pub struct TripleStore {
    facts: Vec<Option<Quad>>,
    ids: HashMap<Quad, FactId>,
    subjects: TermIndex,
    predicates: TermIndex,
    objects: TermIndex,
    graphs: TermIndex,
    alpha: f64,
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripleStore {
    /// Create an empty store indexed by AVL trees.
    #[must_use]
    pub fn new() -> Self {
        Self::with_index(TreeKind::Avl, ScapegoatBalance::DEFAULT_ALPHA)
    }

    /// Create an empty store whose indexes use `kind` trees.
    #[must_use]
    pub fn with_index(kind: TreeKind, alpha: f64) -> Self {
        Self {
            facts: Vec::new(),
            ids: HashMap::new(),
            subjects: TermIndex::new(kind, alpha),
            predicates: TermIndex::new(kind, alpha),
            objects: TermIndex::new(kind, alpha),
            graphs: TermIndex::new(kind, alpha),
            alpha,
        }
    }

    /// Tree kind backing the indexes.
    #[must_use]
    pub const fn index_kind(&self) -> TreeKind {
        self.subjects.kind()
    }

    /// Insert a fact. Returns `false` if it was already present.
    pub fn insert(&mut self, quad: Quad) -> bool {
        if self.ids.contains_key(&quad) {
            return false;
        }
        let id = self.facts.len();
        self.index(&quad, id);
        self.ids.insert(quad.clone(), id);
        self.facts.push(Some(quad));
        true
    }

    /// Remove a fact. Returns `false` if it was not present.
    pub fn remove(&mut self, quad: &Quad) -> bool {
        let Some(id) = self.ids.remove(quad) else {
            return false;
        };
        self.subjects.remove(&quad.subject, id);
        self.predicates.remove(&quad.predicate, id);
        self.objects.remove(&quad.object, id);
        if let Some(graph) = &quad.graph {
            self.graphs.remove(graph, id);
        }
        if let Some(slot) = self.facts.get_mut(id) {
            *slot = None;
        }
        true
    }

    #[must_use]
    pub fn contains(&self, quad: &Quad) -> bool {
        self.ids.contains_key(quad)
    }

    /// All live facts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.facts.iter().flatten()
    }

    /// Rebuild every index on trees of `kind`, compacting the fact table.
    ///
    /// This is the only point where index structure changes wholesale; it
    /// needs exclusive access.
    pub fn rebuild_indexes(&mut self, kind: TreeKind) {
        let facts: Vec<Quad> = std::mem::take(&mut self.facts).into_iter().flatten().collect();
        self.ids.clear();
        self.subjects = TermIndex::new(kind, self.alpha);
        self.predicates = TermIndex::new(kind, self.alpha);
        self.objects = TermIndex::new(kind, self.alpha);
        self.graphs = TermIndex::new(kind, self.alpha);
        for quad in facts {
            self.insert(quad);
        }
        tracing::info!(facts = self.facts.len(), %kind, "rebuilt term indexes");
    }

    fn index(&mut self, quad: &Quad, id: FactId) {
        self.subjects.insert(&quad.subject, id);
        self.predicates.insert(&quad.predicate, id);
        self.objects.insert(&quad.object, id);
        if let Some(graph) = &quad.graph {
            self.graphs.insert(graph, id);
        }
    }

    /// The shortest posting list among the fixed positions, or `None` when
    /// nothing is fixed.
    fn candidates(&self, fixed: &[Option<Term>; 3], graph: &ActiveGraph) -> Option<&[FactId]> {
        let [subject, predicate, object] = fixed;
        let mut lists: Vec<&[FactId]> = Vec::with_capacity(4);
        if let Some(term) = subject {
            lists.push(self.subjects.lookup(term));
        }
        if let Some(term) = predicate {
            lists.push(self.predicates.lookup(term));
        }
        if let Some(term) = object {
            lists.push(self.objects.lookup(term));
        }
        if let ActiveGraph::Named(names) = graph {
            if let [name] = names.as_slice() {
                lists.push(self.graphs.lookup(name));
            }
        }
        lists.into_iter().min_by_key(|list| list.len())
    }
}

fn fits(quad: &Quad, fixed: &[Option<Term>; 3]) -> bool {
    let values = [&quad.subject, &quad.predicate, &quad.object];
    fixed
        .iter()
        .zip(values)
        .all(|(expected, actual)| expected.as_ref().is_none_or(|term| term == actual))
}

impl FactPool for TripleStore {
    fn match_pattern<'a>(
        &'a self,
        pattern: &TriplePattern,
        graph: &ActiveGraph,
        input: Option<&Solution>,
    ) -> Box<dyn Iterator<Item = &'a Quad> + Send + 'a> {
        let fixed = pattern.resolve(input);
        let graph = graph.clone();
        let ids: Box<dyn Iterator<Item = FactId> + Send + 'a> =
            match self.candidates(&fixed, &graph) {
                Some(list) => Box::new(list.iter().copied()),
                None => Box::new(0..self.facts.len()),
            };
        Box::new(
            ids.filter_map(move |id| self.facts.get(id).and_then(Option::as_ref))
                .filter(move |quad| fits(quad, &fixed) && graph.contains(quad.graph.as_ref())),
        )
    }

    fn graph_names(&self) -> Vec<Term> {
        self.graphs.terms().cloned().collect()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

impl Extend<Quad> for TripleStore {
    fn extend<I: IntoIterator<Item = Quad>>(&mut self, iter: I) {
        for quad in iter {
            self.insert(quad);
        }
    }
}

impl FromIterator<Quad> for TripleStore {
    fn from_iter<I: IntoIterator<Item = Quad>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}
