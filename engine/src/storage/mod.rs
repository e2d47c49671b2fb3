//! Fact storage for the query engine.
//!
//! - [`tree`]: ordered binary search trees (unbalanced, AVL, scapegoat)
//! - [`indexes`]: term → fact postings built on those trees
//! - [`store`]: the in-memory [`TripleStore`] and the [`FactPool`] contract
//!   evaluators match patterns through
//! - [`time`]: clock abstraction for query deadlines
//!
//! # Usage
//!
//! ```
//! use engine::query::{PatternItem, TriplePattern};
//! use engine::storage::{ActiveGraph, FactPool, TripleStore};
//! use engine::types::{Quad, Term};
//!
//! let mut store = TripleStore::new();
//! store.insert(Quad::new(Term::iri("a"), Term::iri("knows"), Term::iri("b")));
//!
//! let pattern = TriplePattern::new(
//!     PatternItem::var("x"),
//!     PatternItem::iri("knows"),
//!     PatternItem::var("y"),
//! );
//! assert_eq!(store.match_pattern(&pattern, &ActiveGraph::Default, None).count(), 1);
//! ```

pub mod indexes;
pub mod store;
pub mod time;
pub mod tree;

pub use store::{ActiveGraph, FactPool, TripleStore};
pub use time::{SharedTimeSource, SystemTimeSource, TimeSource};
