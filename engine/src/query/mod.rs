//! Query evaluation over the fact pool.
//!
//! This module holds the solution algebra and the eager evaluator:
//! - [`Solution`] and [`Multiset`]: bindings and bags of bindings
//! - [`TriplePattern`] and [`Algebra`]: what a query asks for
//! - [`Expr`], aggregates and grouping: per-solution computation
//! - [`QueryEngine`]: materializing evaluation of an algebra tree
//!
//! The streaming evaluator in [`crate::stream`] evaluates the same trees
//! lazily.
//!
//! # Example
//!
//! ```
//! use engine::query::{Algebra, BuiltinAggregate, QueryEngine, QueryOptions};
//! use engine::storage::TripleStore;
//! use engine::types::Term;
//!
//! let store = TripleStore::new();
//! let query = Algebra::group_by(
//!     Algebra::identity(),
//!     None,
//!     vec![BuiltinAggregate::count_all("n").shared()],
//! );
//! let result = QueryEngine::new(&store, QueryOptions::default()).evaluate(&query)?;
//! assert_eq!(result.solutions()[0].get("n"), Some(&Term::integer(1)));
//! # Ok::<(), engine::query::EvaluationError>(())
//! ```

pub mod aggregate;
pub mod algebra;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod grouping;
pub mod multiset;
pub mod options;
pub mod pattern;
pub mod property_function;
pub mod solution;

pub use aggregate::{Aggregate, AggregateFactory, AggregateKind, BuiltinAggregate};
pub use algebra::{Algebra, BgpItem, OrderCondition};
pub use context::{Deadline, EvaluationContext};
pub use engine::QueryEngine;
pub use error::{EvaluationError, ExpressionError};
pub use expression::{Expr, Expression, ExpressionContext};
pub use grouping::{GroupKey, Grouper, GroupingClause, KeyPart};
pub use multiset::Multiset;
pub use options::{DEFAULT_BATCH_SIZE, QueryOptions};
pub use pattern::{PatternItem, TriplePattern};
pub use property_function::{
    PropertyFunction, PropertyFunctionCall, PropertyFunctionContext, PropertyFunctionRegistry,
    TEXT_QUERY, TextMatch,
};
pub use solution::{Solution, TEMPORARY_VARIABLE_PREFIX, is_temporary_variable};
