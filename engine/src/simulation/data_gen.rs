//! Random fact pools and multisets for deterministic simulation testing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::query::{Multiset, Solution};
use crate::storage::TripleStore;
use crate::storage::tree::{ScapegoatBalance, TreeKind};
use crate::types::{Quad, Term};

/// Configuration for data generation.
#[derive(Debug, Clone)]
pub struct DataGenConfig {
    /// Number of distinct subject/object resources.
    pub resource_count: usize,
    /// Number of distinct predicates.
    pub predicate_count: usize,
    /// Number of named graphs (facts also land in the default graph).
    pub graph_count: usize,
    /// Variable names used in generated solutions.
    pub variables: Vec<String>,
    /// Probability that a variable is left unbound in a generated solution.
    pub unbound_rate: f64,
}

impl Default for DataGenConfig {
    fn default() -> Self {
        Self {
            resource_count: 6,
            predicate_count: 3,
            graph_count: 2,
            variables: ["a", "b", "c"].map(String::from).to_vec(),
            unbound_rate: 0.25,
        }
    }
}

/// Seeded generator of stores, solutions and multisets.
pub struct DataGenerator {
    rng: StdRng,
    config: DataGenConfig,
}

impl DataGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, DataGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: DataGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DataGenConfig {
        &self.config
    }

    /// `http://example.org/r{n}`.
    #[must_use]
    pub fn resource(n: usize) -> Term {
        Term::iri(format!("http://example.org/r{n}"))
    }

    /// `http://example.org/p{n}`.
    #[must_use]
    pub fn predicate(n: usize) -> Term {
        Term::iri(format!("http://example.org/p{n}"))
    }

    /// `http://example.org/g{n}`.
    #[must_use]
    pub fn graph(n: usize) -> Term {
        Term::iri(format!("http://example.org/g{n}"))
    }

    fn pick(&mut self, bound: usize) -> usize {
        self.rng.random_range(0..bound.max(1))
    }

    /// A random resource or small integer literal.
    pub fn term(&mut self) -> Term {
        if self.rng.random_bool(0.8) {
            Self::resource(self.pick(self.config.resource_count))
        } else {
            Term::integer(self.rng.random_range(0..10))
        }
    }

    /// A random fact; roughly a third land in a named graph.
    pub fn quad(&mut self) -> Quad {
        let subject = Self::resource(self.pick(self.config.resource_count));
        let predicate = Self::predicate(self.pick(self.config.predicate_count));
        let object = self.term();
        if self.config.graph_count > 0 && self.rng.random_bool(0.3) {
            let graph = Self::graph(self.pick(self.config.graph_count));
            Quad::in_graph(subject, predicate, object, graph)
        } else {
            Quad::new(subject, predicate, object)
        }
    }

    /// A store holding up to `facts` random facts (duplicates collapse).
    pub fn store(&mut self, facts: usize, kind: TreeKind) -> TripleStore {
        let mut store = TripleStore::with_index(kind, ScapegoatBalance::DEFAULT_ALPHA);
        for _ in 0..facts {
            store.insert(self.quad());
        }
        store
    }

    /// A solution binding each configured variable with probability
    /// `1 - unbound_rate`.
    pub fn solution(&mut self) -> Solution {
        let mut solution = Solution::new();
        for index in 0..self.config.variables.len() {
            if self.rng.random_bool(self.config.unbound_rate.clamp(0.0, 1.0)) {
                continue;
            }
            let term = self.term();
            let name = self.config.variables[index].clone();
            solution.bind(&name, term);
        }
        solution
    }

    /// An ordinary multiset of `rows` random solutions over the configured
    /// variables.
    pub fn multiset(&mut self, rows: usize) -> Multiset {
        let solutions = (0..rows).map(|_| self.solution()).collect();
        Multiset::with_variables(&self.config.variables, solutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FactPool;

    #[test]
    fn test_same_seed_same_store() {
        let a = DataGenerator::new(5).store(40, TreeKind::Avl);
        let b = DataGenerator::new(5).store(40, TreeKind::Scapegoat);
        assert_eq!(a.len(), b.len());
        assert_eq!(a.graph_names(), b.graph_names());
    }

    #[test]
    fn test_multiset_declares_all_variables() {
        let multiset = DataGenerator::new(9).multiset(10);
        assert_eq!(multiset.len(), 10);
        for variable in ["a", "b", "c"] {
            assert!(multiset.contains_variable(variable));
        }
    }

    #[test]
    fn test_solutions_only_bind_configured_variables() {
        let mut generator = DataGenerator::new(13);
        for _ in 0..50 {
            let solution = generator.solution();
            assert!(solution.variables().all(|name| ["a", "b", "c"].contains(&name)));
        }
    }
}
