#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in library code so malformed data surfaces as errors.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

// Life of a query:
// 1. Caller builds an `Algebra` tree (parsing happens elsewhere)
// 2. Caller picks an evaluator:
//     - `QueryEngine`: eager, each operator returns a whole `Multiset`
//     - `StreamEngine`: lazy, each operator pulls solutions from its children
// 3. BGPs match triple patterns against a `FactPool` (usually `TripleStore`)
// 4. Operators combine solutions (join, union, group, slice, ...)
// 5. Deadline and cancellation are checked while results are produced
//
// System components:
//  - Term model and fact storage with tree-backed indexes
//  - Solution / multiset algebra
//  - Eager and streaming evaluators

pub mod config;
mod e2e_tests;
pub mod query;
pub mod simulation;
pub mod storage;
pub mod stream;
pub mod testing;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use query::{Algebra, EvaluationError, Multiset, QueryEngine, QueryOptions, Solution};
pub use storage::{ActiveGraph, FactPool, TripleStore};
pub use stream::{CancellationSignal, StreamEngine};
