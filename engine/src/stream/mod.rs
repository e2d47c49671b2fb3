//! Streaming (pull) evaluation.
//!
//! [`StreamEngine`] evaluates the same [`Algebra`](crate::query::Algebra)
//! trees as the eager [`QueryEngine`](crate::query::QueryEngine) but produces
//! solutions lazily. Binary operators drive both children concurrently
//! through the [`join::drive`] loop, grouping accumulates incrementally, and
//! every producer checks cancellation and the query deadline before each item.
//!
//! # Invariants
//!
//! - For a fixed tree and fact pool, single-item and batch evaluation yield
//!   the same multiset of solutions as the eager evaluator; only the order
//!   may differ.
//! - A stream ends after yielding its first error.
//! - With `partial_results_on_timeout`, a timeout ends every stream quietly.
//!   Under such a timeout the invariant above no longer holds: an aggregate
//!   may see fewer rows than the eager evaluator's interrupted BGP gathered.
//!
//! # Usage
//!
//! ```
//! use engine::query::{Algebra, PatternItem, QueryOptions, TriplePattern};
//! use engine::storage::TripleStore;
//! use engine::stream::StreamEngine;
//!
//! # tokio_test_block(async {
//! let store = TripleStore::new();
//! let query = Algebra::triples([TriplePattern::new(
//!     PatternItem::var("s"),
//!     PatternItem::var("p"),
//!     PatternItem::var("o"),
//! )]);
//! let engine = StreamEngine::new(&store, QueryOptions::default());
//! let rows = StreamEngine::collect(engine.evaluate(&query, None)).await?;
//! assert!(rows.is_empty());
//! # Ok::<(), engine::query::EvaluationError>(())
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().expect("runtime").block_on(f)
//! # }
//! ```

mod cancel;
mod evaluator;
pub mod group;
pub mod join;

use futures::stream::BoxStream;

use crate::query::{EvaluationError, Solution};

pub use cancel::CancellationSignal;
pub use evaluator::StreamEngine;

/// A lazy sequence of solutions.
pub type SolutionStream<'a> = BoxStream<'a, Result<Solution, EvaluationError>>;

/// A lazy sequence of solution batches.
pub type BatchStream<'a> = BoxStream<'a, Result<Vec<Solution>, EvaluationError>>;
