//! Producers for every algebra operator.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::join::{self, InnerJoin, LeftJoin, Minus, shared_variables};
use super::{BatchStream, CancellationSignal, SolutionStream, group};
use crate::query::engine::{compare_by_conditions, extend_solution, filter_accepts, graphs_in_scope};
use crate::query::{
    Algebra, BgpItem, Deadline, EvaluationError, Expr, ExpressionContext, Multiset, PatternItem,
    PropertyFunctionCall, PropertyFunctionContext, QueryOptions, Solution, TriplePattern,
};
use crate::storage::{ActiveGraph, FactPool};

/// Lazy evaluator over a fact pool.
#[derive(Clone)]
pub struct StreamEngine<'a> {
    pool: &'a dyn FactPool,
    options: Arc<QueryOptions>,
    cancel: CancellationSignal,
}

impl<'a> StreamEngine<'a> {
    #[must_use]
    pub fn new(pool: &'a dyn FactPool, options: QueryOptions) -> Self {
        Self {
            pool,
            options: Arc::new(options),
            cancel: CancellationSignal::new(),
        }
    }

    /// Use an externally owned cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    #[must_use]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    fn producer(&self) -> Producer<'a> {
        Producer {
            pool: self.pool,
            deadline: Deadline::start(self.options.time_source.clone(), self.options.timeout),
            options: Arc::clone(&self.options),
            cancel: self.cancel.clone(),
            graph: self.options.active_graph.clone(),
        }
    }

    /// Evaluate `algebra` lazily, starting from `input` (or the empty solution).
    ///
    /// The query deadline starts when this is called.
    #[must_use]
    pub fn evaluate(&self, algebra: &'a Algebra, input: Option<Solution>) -> SolutionStream<'a> {
        debug!(operator = algebra.name(), "streaming evaluation started");
        self.producer().solutions(algebra, input.unwrap_or_default())
    }

    /// Evaluate `algebra` once per input and yield batches of at most
    /// `batch_size` solutions. No inputs means a single evaluation from the
    /// empty solution.
    #[must_use]
    pub fn evaluate_batch(&self, algebra: &'a Algebra, inputs: Vec<Solution>) -> BatchStream<'a> {
        let inputs = if inputs.is_empty() {
            vec![Solution::new()]
        } else {
            inputs
        };
        debug!(operator = algebra.name(), inputs = inputs.len(), "batch evaluation started");
        self.producer().batches(algebra, inputs)
    }

    /// Drain a solution stream.
    pub async fn collect(stream: SolutionStream<'_>) -> Result<Vec<Solution>, EvaluationError> {
        stream.try_collect().await
    }

    /// Drain a batch stream into one vector.
    pub async fn collect_batches(stream: BatchStream<'_>) -> Result<Vec<Solution>, EvaluationError> {
        stream.try_concat().await
    }
}

/// State of one guarded producer.
struct Guard<'a> {
    inner: Option<SolutionStream<'a>>,
    cancel: CancellationSignal,
    deadline: Deadline,
    partial: bool,
}

/// Evaluation state shared by the producers of one query.
#[derive(Clone)]
struct Producer<'a> {
    pool: &'a dyn FactPool,
    options: Arc<QueryOptions>,
    cancel: CancellationSignal,
    deadline: Deadline,
    graph: ActiveGraph,
}

fn failed<'a>(error: EvaluationError) -> SolutionStream<'a> {
    stream::once(future::ready(Err(error))).boxed()
}

fn rows<'a>(solutions: Vec<Solution>) -> SolutionStream<'a> {
    stream::iter(solutions.into_iter().map(Ok)).boxed()
}

impl<'a> Producer<'a> {
    fn with_graph(&self, graph: ActiveGraph) -> Self {
        Self {
            graph,
            ..self.clone()
        }
    }

    /// Check cancellation and the deadline before every item.
    fn guard(&self, inner: SolutionStream<'a>) -> SolutionStream<'a> {
        let state = Guard {
            inner: Some(inner),
            cancel: self.cancel.clone(),
            deadline: self.deadline.clone(),
            partial: self.options.partial_results_on_timeout,
        };
        stream::unfold(state, |mut state| async move {
            let mut inner = state.inner.take()?;
            if state.cancel.is_cancelled() {
                return Some((Err(EvaluationError::Cancelled), state));
            }
            if let Err(error) = state.deadline.check() {
                if state.partial {
                    debug!(%error, "ending stream early with partial results");
                    return None;
                }
                return Some((Err(error), state));
            }
            let item = tokio::select! {
                biased;
                () = state.cancel.cancelled() => Some(Err(EvaluationError::Cancelled)),
                item = inner.next() => item,
            };
            match item {
                Some(Ok(solution)) => {
                    state.inner = Some(inner);
                    Some((Ok(solution), state))
                }
                Some(Err(error)) => Some((Err(error), state)),
                None => None,
            }
        })
        .boxed()
    }

    fn solutions(&self, algebra: &'a Algebra, input: Solution) -> SolutionStream<'a> {
        let stream = match algebra {
            Algebra::Bgp(items) => self.bgp(items, input),
            Algebra::Join(left, right) => join::drive(
                self.solutions(left, input.clone()),
                self.solutions(right, input),
                InnerJoin::new(shared_variables(&left.variables(), &right.variables())),
                self.cancel.clone(),
            ),
            Algebra::LeftJoin {
                left,
                right,
                filter,
            } => join::drive(
                self.solutions(left, input.clone()),
                self.solutions(right, input),
                LeftJoin::new(
                    shared_variables(&left.variables(), &right.variables()),
                    filter.as_ref(),
                    self.graph.clone(),
                ),
                self.cancel.clone(),
            ),
            Algebra::Union(left, right) => stream::select(
                self.solutions(left, input.clone()),
                self.solutions(right, input),
            )
            .boxed(),
            Algebra::Minus(left, right) => join::drive(
                self.solutions(left, input.clone()),
                self.solutions(right, input),
                Minus::new(),
                self.cancel.clone(),
            ),
            Algebra::Extend {
                inner,
                variable,
                expression,
            } => {
                let rebind = inner.variables().contains(variable);
                self.extend(self.solutions(inner, input), rebind, variable, expression)
            }
            Algebra::Filter { inner, expression } => {
                self.filter(self.solutions(inner, input), expression)
            }
            Algebra::GroupBy {
                inner,
                clause,
                aggregates,
            } => group::group(
                self.solutions(inner, input),
                clause.as_ref(),
                aggregates,
                self.graph.clone(),
            ),
            Algebra::Select {
                inner,
                variables,
                select_all,
            } => {
                let rows = self.solutions(inner, input);
                if *select_all {
                    rows
                } else {
                    rows.map_ok(move |solution| solution.project(variables)).boxed()
                }
            }
            Algebra::Ask(inner) => self
                .solutions(inner, input)
                .take(1)
                .map_ok(|_| Solution::new())
                .boxed(),
            Algebra::Slice {
                inner,
                offset,
                limit,
            } => self.slice(inner, input, *offset, *limit),
            Algebra::Distinct(inner) => {
                let mut seen = HashSet::new();
                self.solutions(inner, input)
                    .try_filter(move |solution| future::ready(seen.insert(solution.clone())))
                    .boxed()
            }
            Algebra::OrderBy { inner, conditions } => {
                let rows = self.solutions(inner, input);
                let graph = self.graph.clone();
                stream::once(async move {
                    let mut rows: Vec<Solution> = rows.try_collect().await?;
                    let context = ExpressionContext::new(&graph);
                    rows.sort_by(|a, b| compare_by_conditions(conditions, a, b, &context));
                    Ok::<_, EvaluationError>(rows)
                })
                .map_ok(|sorted| stream::iter(sorted.into_iter().map(Ok)))
                .try_flatten()
                .boxed()
            }
            Algebra::Graph { inner, graph } => self.graph(inner, graph, input),
            Algebra::PropertyFunction { inner, call } => self.property_function(inner, call, input),
        };
        self.guard(stream)
    }

    fn bgp(&self, items: &'a [BgpItem], input: Solution) -> SolutionStream<'a> {
        let mut stream = rows(vec![input]);
        let mut declared: Vec<String> = Vec::new();
        for item in items {
            stream = match item {
                BgpItem::Triple(pattern) => self.match_triple(stream, pattern),
                BgpItem::Filter(expression) => self.filter(stream, expression),
                BgpItem::Bind {
                    variable,
                    expression,
                } => self.extend(stream, declared.contains(variable), variable, expression),
            };
            for name in item.variables() {
                if !declared.contains(&name) {
                    declared.push(name);
                }
            }
        }
        if self.options.trim_temporary_variables {
            stream = stream
                .map_ok(|mut solution| {
                    solution.trim_temporaries();
                    solution
                })
                .boxed();
        }
        stream
    }

    /// Index nested loop: look each incoming row's bindings up in the pool.
    fn match_triple(&self, rows: SolutionStream<'a>, pattern: &'a TriplePattern) -> SolutionStream<'a> {
        let pool = self.pool;
        let graph = self.graph.clone();
        rows.flat_map(move |row| match row {
            Ok(solution) => {
                let matches = pool.match_pattern(pattern, &graph, Some(&solution));
                stream::iter(
                    matches
                        .filter_map(move |quad| {
                            pattern.bind(quad).and_then(|bound| solution.join(&bound))
                        })
                        .map(Ok),
                )
                .boxed()
            }
            Err(error) => failed(error),
        })
        .boxed()
    }

    fn filter(&self, rows: SolutionStream<'a>, expression: &'a Expr) -> SolutionStream<'a> {
        let graph = self.graph.clone();
        let fail_silently = self.options.fail_silently_on_filter_error;
        rows.try_filter_map(move |solution| {
            let context = ExpressionContext::new(&graph);
            future::ready(
                filter_accepts(expression, &solution, &context, fail_silently)
                    .map(|keep| keep.then_some(solution)),
            )
        })
        .boxed()
    }

    /// `rebind` is decided statically from the child's declared variables.
    fn extend(
        &self,
        rows: SolutionStream<'a>,
        rebind: bool,
        variable: &'a str,
        expression: &'a Expr,
    ) -> SolutionStream<'a> {
        let graph = self.graph.clone();
        rows.map(move |row| {
            let solution = row?;
            if rebind {
                return Err(EvaluationError::Rebind {
                    variable: variable.to_owned(),
                });
            }
            extend_solution(&solution, variable, expression, &ExpressionContext::new(&graph))
        })
        .boxed()
    }

    fn slice(
        &self,
        inner: &'a Algebra,
        input: Solution,
        offset: usize,
        limit: Option<usize>,
    ) -> SolutionStream<'a> {
        if limit == Some(0) {
            return stream::empty().boxed();
        }
        let mut skipped = 0;
        self.solutions(inner, input)
            .try_filter(move |_| {
                let keep = skipped >= offset;
                if !keep {
                    skipped += 1;
                }
                future::ready(keep)
            })
            .take(limit.unwrap_or(usize::MAX))
            .boxed()
    }

    fn graph(&self, inner: &'a Algebra, graph: &'a PatternItem, input: Solution) -> SolutionStream<'a> {
        match graph {
            PatternItem::Term(name) => self
                .with_graph(ActiveGraph::named(name.clone()))
                .solutions(inner, input),
            PatternItem::Variable(variable) => {
                let names = graphs_in_scope(self.pool, &self.graph);
                let producer = self.clone();
                stream::iter(names)
                    .flat_map(move |name| {
                        producer
                            .with_graph(ActiveGraph::named(name.clone()))
                            .solutions(inner, input.clone())
                            .try_filter_map(move |mut solution| {
                                let fits = solution.bind(variable, name.clone());
                                future::ready(Ok(fits.then_some(solution)))
                            })
                    })
                    .boxed()
            }
        }
    }

    fn property_function(
        &self,
        inner: &'a Algebra,
        call: &'a PropertyFunctionCall,
        input: Solution,
    ) -> SolutionStream<'a> {
        let Some(function) = self.options.property_functions.get(&call.name).cloned() else {
            return failed(EvaluationError::UnknownPropertyFunction(call.name.clone()));
        };
        let rows = self.solutions(inner, input);
        let producer = self.clone();
        stream::once(async move {
            let rows: Vec<Solution> = rows.try_collect().await?;
            let multiset = if rows.is_empty() {
                Multiset::Null
            } else {
                Multiset::with_variables(&inner.variables(), rows)
            };
            let context = PropertyFunctionContext {
                pool: producer.pool,
                active_graph: &producer.graph,
            };
            function
                .evaluate(call, &multiset, &context)
                .map(Multiset::into_solutions)
        })
        .map_ok(|solutions| stream::iter(solutions.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    fn batches(&self, algebra: &'a Algebra, inputs: Vec<Solution>) -> BatchStream<'a> {
        match algebra {
            Algebra::Filter { inner, expression } => {
                let graph = self.graph.clone();
                let fail_silently = self.options.fail_silently_on_filter_error;
                self.batches(inner, inputs)
                    .map(move |batch| {
                        let context = ExpressionContext::new(&graph);
                        let mut kept = Vec::new();
                        for solution in batch? {
                            if filter_accepts(expression, &solution, &context, fail_silently)? {
                                kept.push(solution);
                            }
                        }
                        Ok::<_, EvaluationError>(kept)
                    })
                    .try_filter(|kept| future::ready(!kept.is_empty()))
                    .boxed()
            }
            Algebra::Extend {
                inner,
                variable,
                expression,
            } => {
                let rebind = inner.variables().contains(variable);
                let graph = self.graph.clone();
                self.batches(inner, inputs)
                    .map(move |batch| {
                        let batch = batch?;
                        if rebind && !batch.is_empty() {
                            return Err(EvaluationError::Rebind {
                                variable: variable.clone(),
                            });
                        }
                        let context = ExpressionContext::new(&graph);
                        batch
                            .iter()
                            .map(|solution| extend_solution(solution, variable, expression, &context))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .boxed()
            }
            Algebra::Select {
                inner,
                variables,
                select_all: false,
            } => self
                .batches(inner, inputs)
                .map_ok(move |batch| {
                    batch
                        .iter()
                        .map(|solution| solution.project(variables))
                        .collect()
                })
                .boxed(),
            _ => {
                let producer = self.clone();
                stream::iter(inputs)
                    .flat_map(move |input| producer.solutions(algebra, input))
                    .chunks(self.options.batch_size.max(1))
                    .map(|chunk| chunk.into_iter().collect::<Result<Vec<_>, _>>())
                    .boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::query::{BuiltinAggregate, GroupingClause, OrderCondition};
    use crate::simulation::SimulatedTimeSource;
    use crate::storage::TripleStore;
    use crate::testing::{ex, knows_store};
    use crate::types::{Quad, Term};

    fn knows(s: &str, o: &str) -> TriplePattern {
        TriplePattern::new(PatternItem::var(s), PatternItem::Term(ex("knows")), PatternItem::var(o))
    }

    async fn run(engine: &StreamEngine<'_>, algebra: &Algebra) -> Vec<Solution> {
        let mut rows = StreamEngine::collect(engine.evaluate(algebra, None))
            .await
            .expect("stream should succeed");
        rows.sort();
        rows
    }

    #[tokio::test]
    async fn test_two_step_join() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::join(Algebra::triples([knows("x", "y")]), Algebra::triples([knows("y", "z")]));
        assert_eq!(
            run(&engine, &query).await,
            vec![Solution::from_pairs([("x", ex("a")), ("y", ex("b")), ("z", ex("c"))])]
        );
    }

    #[tokio::test]
    async fn test_bgp_uses_input_bindings() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::triples([knows("x", "y")]);
        let input = Solution::from_pairs([("x", ex("b"))]);
        let rows = StreamEngine::collect(engine.evaluate(&query, Some(input)))
            .await
            .expect("stream should succeed");
        assert_eq!(rows, vec![Solution::from_pairs([("x", ex("b")), ("y", ex("c"))])]);
    }

    #[tokio::test]
    async fn test_slice_skips_and_limits() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let ordered = Algebra::order_by(
            Algebra::triples([knows("x", "y")]),
            vec![OrderCondition::ascending(Expr::var("x"))],
        );
        let query = Algebra::slice(ordered, 1, Some(5));
        let rows = StreamEngine::collect(engine.evaluate(&query, None))
            .await
            .expect("stream should succeed");
        assert_eq!(rows, vec![Solution::from_pairs([("x", ex("b")), ("y", ex("c"))])]);

        let nothing = Algebra::slice(Algebra::triples([knows("x", "y")]), 0, Some(0));
        assert!(run(&engine, &nothing).await.is_empty());
    }

    #[tokio::test]
    async fn test_ask_yields_at_most_one_row() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::ask(Algebra::triples([knows("x", "y")]));
        assert_eq!(run(&engine, &query).await, vec![Solution::new()]);
    }

    #[tokio::test]
    async fn test_extend_rebind_is_an_error() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::extend(Algebra::triples([knows("x", "y")]), "x", Expr::var("y"));
        let err = StreamEngine::collect(engine.evaluate(&query, None))
            .await
            .expect_err("rebind should fail");
        assert!(matches!(err, EvaluationError::Rebind { .. }));
    }

    #[tokio::test]
    async fn test_group_without_clause_over_no_rows() {
        let store = TripleStore::new();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::group_by(
            Algebra::triples([knows("x", "y")]),
            None,
            vec![BuiltinAggregate::count_all("n").shared()],
        );
        assert_eq!(
            run(&engine, &query).await,
            vec![Solution::from_pairs([("n", Term::integer(0))])]
        );
    }

    #[tokio::test]
    async fn test_group_by_key() {
        let mut store = knows_store();
        store.insert(Quad::new(ex("a"), ex("knows"), ex("c")));
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::group_by(
            Algebra::triples([knows("x", "y")]),
            Some(GroupingClause::by_variable("x")),
            vec![BuiltinAggregate::count_all("n").shared()],
        );
        assert_eq!(
            run(&engine, &query).await,
            vec![
                Solution::from_pairs([("n", Term::integer(1)), ("x", ex("b"))]),
                Solution::from_pairs([("n", Term::integer(2)), ("x", ex("a"))]),
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let mut store = TripleStore::new();
        for i in 0..10 {
            store.insert(Quad::new(ex(&format!("s{i}")), ex("p"), Term::integer(i)));
        }
        let engine = StreamEngine::new(&store, QueryOptions::default().with_batch_size(4));
        let query = Algebra::triples([TriplePattern::new(
            PatternItem::var("s"),
            PatternItem::Term(ex("p")),
            PatternItem::var("o"),
        )]);
        let batches: Vec<Vec<Solution>> = engine
            .evaluate_batch(&query, Vec::new())
            .try_collect()
            .await
            .expect("batches should succeed");
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_batch_filter_and_select() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::select(
            Algebra::filter(
                Algebra::triples([knows("x", "y")]),
                Expr::equal(Expr::var("x"), Expr::constant(ex("a"))),
            ),
            ["y"],
        );
        let rows = StreamEngine::collect_batches(engine.evaluate_batch(&query, Vec::new()))
            .await
            .expect("batches should succeed");
        assert_eq!(rows, vec![Solution::from_pairs([("y", ex("b"))])]);
    }

    #[tokio::test]
    async fn test_batch_runs_once_per_input() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::triples([knows("x", "y")]);
        let inputs = vec![
            Solution::from_pairs([("x", ex("a"))]),
            Solution::from_pairs([("x", ex("b"))]),
            Solution::from_pairs([("x", ex("c"))]),
        ];
        let rows = StreamEngine::collect_batches(engine.evaluate_batch(&query, inputs))
            .await
            .expect("batches should succeed");
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        engine.cancellation().cancel();
        let query = Algebra::triples([knows("x", "y")]);
        let err = StreamEngine::collect(engine.evaluate(&query, None))
            .await
            .expect_err("cancelled query should fail");
        assert!(matches!(err, EvaluationError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout_mid_stream() {
        let store = knows_store();
        let clock = SimulatedTimeSource::shared(0);
        let options = QueryOptions::default()
            .with_timeout(Some(Duration::from_millis(10)))
            .with_time_source(clock.clone());
        let query = Algebra::triples([knows("x", "y")]);

        let engine = StreamEngine::new(&store, options.clone());
        let mut stream = engine.evaluate(&query, None);
        assert!(matches!(stream.next().await, Some(Ok(_))));
        clock.advance(11);
        assert!(matches!(stream.next().await, Some(Err(EvaluationError::Timeout { .. }))));
        assert!(stream.next().await.is_none());

        clock.set(0);
        let partial = StreamEngine::new(&store, options.with_partial_results_on_timeout(true));
        let mut stream = partial.evaluate(&query, None);
        assert!(matches!(stream.next().await, Some(Ok(_))));
        clock.advance(11);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_property_function() {
        let store = knows_store();
        let engine = StreamEngine::new(&store, QueryOptions::default());
        let query = Algebra::property_function(
            Algebra::identity(),
            PropertyFunctionCall::new("http://example.org/nope", Vec::new(), Vec::new()),
        );
        let err = StreamEngine::collect(engine.evaluate(&query, None))
            .await
            .expect_err("unknown function should fail");
        assert!(matches!(err, EvaluationError::UnknownPropertyFunction(_)));
    }
}
