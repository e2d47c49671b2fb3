//! Common helpers for end-to-end tests.

use futures::TryStreamExt;

use crate::query::{
    Algebra, EvaluationError, PatternItem, QueryEngine, QueryOptions, Solution, TriplePattern,
};
use crate::storage::TripleStore;
use crate::stream::StreamEngine;
use crate::testing::{ex, init_tracing};

/// A store plus a runtime for driving the streaming evaluator.
pub struct TestEngine {
    pub store: TripleStore,
    pub options: QueryOptions,
    pub runtime: tokio::runtime::Runtime,
}

impl TestEngine {
    #[must_use]
    pub fn new(store: TripleStore) -> Self {
        Self::with_options(store, QueryOptions::default())
    }

    #[must_use]
    pub fn with_options(store: TripleStore, options: QueryOptions) -> Self {
        init_tracing();
        #[allow(clippy::expect_used)]
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create runtime");
        Self {
            store,
            options,
            runtime,
        }
    }

    /// Eager evaluation, rows sorted.
    pub fn eager(&self, algebra: &Algebra) -> Result<Vec<Solution>, EvaluationError> {
        let engine = QueryEngine::new(&self.store, self.options.clone());
        Ok(sorted(engine.evaluate(algebra)?.into_solutions()))
    }

    /// Streaming evaluation from the empty solution, rows sorted.
    pub fn streaming(&self, algebra: &Algebra) -> Result<Vec<Solution>, EvaluationError> {
        let engine = StreamEngine::new(&self.store, self.options.clone());
        let rows = self
            .runtime
            .block_on(StreamEngine::collect(engine.evaluate(algebra, None)))?;
        Ok(sorted(rows))
    }

    /// Batch evaluation; returns the sorted rows and every batch length.
    pub fn batched(
        &self,
        algebra: &Algebra,
        inputs: Vec<Solution>,
        batch_size: usize,
    ) -> Result<(Vec<Solution>, Vec<usize>), EvaluationError> {
        let options = self.options.clone().with_batch_size(batch_size);
        let engine = StreamEngine::new(&self.store, options);
        let batches: Vec<Vec<Solution>> = self
            .runtime
            .block_on(engine.evaluate_batch(algebra, inputs).try_collect())?;
        let lengths = batches.iter().map(Vec::len).collect();
        Ok((sorted(batches.into_iter().flatten().collect()), lengths))
    }

    /// Run `algebra` every way and assert the results agree; returns them.
    #[allow(clippy::expect_used)]
    pub fn assert_equivalent(&self, algebra: &Algebra) -> Vec<Solution> {
        let eager = self.eager(algebra).expect("eager evaluation should succeed");
        let streaming = self
            .streaming(algebra)
            .expect("streaming evaluation should succeed");
        assert_eq!(eager, streaming, "eager and streaming differ for {}", algebra.name());
        for batch_size in [1, 3, 1024] {
            let (batched, lengths) = self
                .batched(algebra, Vec::new(), batch_size)
                .expect("batch evaluation should succeed");
            assert_eq!(eager, batched, "batch size {batch_size} differs for {}", algebra.name());
            assert!(lengths.iter().all(|len| *len <= batch_size));
        }
        eager
    }
}

/// Sort rows so multisets compare regardless of production order.
#[must_use]
pub fn sorted(mut rows: Vec<Solution>) -> Vec<Solution> {
    rows.sort();
    rows
}

/// `?s <http://example.org/{predicate}> ?o`.
#[must_use]
pub fn pattern(subject: &str, predicate: &str, object: &str) -> TriplePattern {
    TriplePattern::new(
        PatternItem::var(subject),
        PatternItem::Term(ex(predicate)),
        PatternItem::var(object),
    )
}

/// `?s knows ?o`.
#[must_use]
pub fn knows(subject: &str, object: &str) -> TriplePattern {
    pattern(subject, "knows", object)
}
