//! Eager evaluator.
//!
//! `QueryEngine` evaluates an [`Algebra`] tree bottom-up, materializing each
//! operator's result as a [`Multiset`] before handing it to its parent.
//!
//! # Invariants
//!
//! - A BGP that yields no rows evaluates to `Multiset::Null`; an empty BGP
//!   evaluates to `Multiset::Identity`.
//! - The deadline is checked before every join step of a BGP.
//! - Expression errors never escape a single solution except through a
//!   filter configured to fail loudly.
//!
//! # Usage
//!
//! ```
//! use engine::query::{Algebra, PatternItem, QueryEngine, QueryOptions, TriplePattern};
//! use engine::storage::TripleStore;
//! use engine::types::{Quad, Term};
//!
//! let store: TripleStore = [Quad::new(
//!     Term::iri("http://example.org/a"),
//!     Term::iri("http://example.org/knows"),
//!     Term::iri("http://example.org/b"),
//! )]
//! .into_iter()
//! .collect();
//!
//! let query = Algebra::triples([TriplePattern::new(
//!     PatternItem::var("x"),
//!     PatternItem::iri("http://example.org/knows"),
//!     PatternItem::var("y"),
//! )]);
//! let result = QueryEngine::new(&store, QueryOptions::default()).evaluate(&query)?;
//! assert_eq!(result.len(), 1);
//! # Ok::<(), engine::query::EvaluationError>(())
//! ```

use std::cmp::Ordering;

use tracing::{debug, trace, warn};

use super::algebra::{Algebra, BgpItem, OrderCondition};
use super::context::EvaluationContext;
use super::error::EvaluationError;
use super::expression::{Expr, Expression, ExpressionContext};
use super::grouping::Grouper;
use super::multiset::Multiset;
use super::options::QueryOptions;
use super::pattern::{PatternItem, TriplePattern};
use super::property_function::PropertyFunctionContext;
use super::solution::Solution;
use crate::storage::{ActiveGraph, FactPool};
use crate::types::{Term, compare_for_ordering};

/// Whether `solution` passes `filter`.
///
/// With `fail_silently` an expression error drops the solution. Otherwise the
/// error propagates, except for a solution with no bindings at all, which is
/// always dropped quietly.
pub fn filter_accepts(
    filter: &Expr,
    solution: &Solution,
    context: &ExpressionContext<'_>,
    fail_silently: bool,
) -> Result<bool, EvaluationError> {
    match filter.evaluate_boolean(solution, context) {
        Ok(keep) => Ok(keep),
        Err(_) if fail_silently => Ok(false),
        Err(error) if solution.is_empty() => {
            warn!(%error, "filter error on a solution without bindings, dropping it");
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}

/// Copy `solution` with `variable` bound to the value of `expression`.
///
/// An expression error leaves the variable unbound.
pub fn extend_solution(
    solution: &Solution,
    variable: &str,
    expression: &Expr,
    context: &ExpressionContext<'_>,
) -> Result<Solution, EvaluationError> {
    match expression.evaluate(solution, context) {
        Ok(term) => solution.extend(variable, term),
        Err(_) if solution.is_bound(variable) => Err(EvaluationError::Rebind {
            variable: variable.to_owned(),
        }),
        Err(_) => Ok(solution.clone()),
    }
}

/// Comparator for ORDER BY. Expression errors sort as unbound.
#[must_use]
pub fn compare_by_conditions(
    conditions: &[OrderCondition],
    a: &Solution,
    b: &Solution,
    context: &ExpressionContext<'_>,
) -> Ordering {
    for condition in conditions {
        let left = condition.expression.evaluate(a, context).ok();
        let right = condition.expression.evaluate(b, context).ok();
        let ordering = compare_for_ordering(left.as_ref(), right.as_ref());
        let ordering = if condition.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Named graphs a `GRAPH ?g` pattern ranges over under `active`.
#[must_use]
pub fn graphs_in_scope(pool: &dyn FactPool, active: &ActiveGraph) -> Vec<Term> {
    let names = pool.graph_names();
    match active {
        ActiveGraph::Named(allowed) => names.into_iter().filter(|name| allowed.contains(name)).collect(),
        ActiveGraph::Default | ActiveGraph::Union => names,
    }
}

/// Evaluates algebra trees against a fact pool, materializing every result.
pub struct QueryEngine<'a> {
    pool: &'a dyn FactPool,
    options: QueryOptions,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub fn new(pool: &'a dyn FactPool, options: QueryOptions) -> Self {
        Self { pool, options }
    }

    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Evaluate a whole query.
    ///
    /// On timeout with `partial_results_on_timeout` set, an interrupted BGP
    /// yields the rows it had accumulated and the operators above it still
    /// run over them.
    pub fn evaluate(&self, algebra: &Algebra) -> Result<Multiset, EvaluationError> {
        let mut context = EvaluationContext::new(self.pool, &self.options);
        let result = self.process(algebra, &mut context)?;
        Ok(self.present(result))
    }

    fn present(&self, mut result: Multiset) -> Multiset {
        if let Some(order) = &self.options.output_variables {
            result.set_variable_order(order);
        }
        result
    }

    /// Evaluate one operator.
    pub fn process(
        &self,
        algebra: &Algebra,
        context: &mut EvaluationContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        let result = match algebra {
            Algebra::Bgp(items) => self.process_bgp(items, context)?,
            Algebra::Join(left, right) => {
                let left = self.process(left, context)?;
                if left.is_null() {
                    Multiset::Null
                } else {
                    left.join(&self.process(right, context)?)
                }
            }
            Algebra::LeftJoin {
                left,
                right,
                filter,
            } => {
                let left = self.process(left, context)?;
                if left.is_null() {
                    Multiset::Null
                } else {
                    let right = self.process(right, context)?;
                    let expressions = context.expression_context();
                    left.left_join(&right, |joined| {
                        filter.as_ref().is_none_or(|filter| {
                            filter.evaluate_boolean(joined, &expressions).unwrap_or(false)
                        })
                    })
                }
            }
            Algebra::Union(left, right) => {
                let left = self.process(left, context)?;
                left.union(&self.process(right, context)?)
            }
            Algebra::Minus(left, right) => {
                let left = self.process(left, context)?;
                if left.is_null() {
                    Multiset::Null
                } else {
                    left.minus(&self.process(right, context)?)
                }
            }
            Algebra::Extend {
                inner,
                variable,
                expression,
            } => {
                let input = self.process(inner, context)?;
                Self::process_extend(inner, input, variable, expression, context)?
            }
            Algebra::Filter { inner, expression } => {
                let input = self.process(inner, context)?;
                self.process_filter(input, expression, context)?
            }
            Algebra::GroupBy {
                inner,
                clause,
                aggregates,
            } => {
                let input = self.process(inner, context)?;
                let expressions = context.expression_context();
                let mut grouper = Grouper::new(clause.as_ref(), aggregates);
                for solution in input.solutions() {
                    grouper.accept(solution, &expressions);
                }
                let variables = grouper.output_variables();
                let rows = grouper.finish()?;
                Multiset::with_variables(&variables, rows)
            }
            Algebra::Select {
                inner,
                variables,
                select_all,
            } => {
                let input = self.process(inner, context)?;
                Self::process_select(input, variables, *select_all)
            }
            Algebra::Ask(inner) => match self.process(inner, context)? {
                ordinary @ Multiset::Ordinary(_) if ordinary.is_empty() => Multiset::Null,
                Multiset::Ordinary(_) => Multiset::Identity,
                degenerate => degenerate,
            },
            Algebra::Slice {
                inner,
                offset,
                limit,
            } => {
                if *limit == Some(0) {
                    Multiset::Null
                } else {
                    let input = self.process(inner, context)?;
                    Self::process_slice(input, *offset, *limit)
                }
            }
            Algebra::Distinct(inner) => self.process(inner, context)?.distinct(),
            Algebra::OrderBy { inner, conditions } => {
                let mut input = self.process(inner, context)?;
                let expressions = context.expression_context();
                input.sort_by(|a, b| compare_by_conditions(conditions, a, b, &expressions));
                input
            }
            Algebra::Graph { inner, graph } => self.process_graph(inner, graph, context)?,
            Algebra::PropertyFunction { inner, call } => {
                let input = self.process(inner, context)?;
                let function = context
                    .options()
                    .property_functions
                    .get(&call.name)
                    .ok_or_else(|| EvaluationError::UnknownPropertyFunction(call.name.clone()))?;
                let call_context = PropertyFunctionContext {
                    pool: context.pool(),
                    active_graph: context.active_graph(),
                };
                function.evaluate(call, &input, &call_context)?
            }
        };
        debug!(operator = algebra.name(), rows = result.len(), "evaluated");
        Ok(result)
    }

    fn process_bgp(
        &self,
        items: &[BgpItem],
        context: &mut EvaluationContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        let mut running = Multiset::Identity;
        let mut declared: Vec<String> = Vec::new();
        for item in items {
            if let Err(error) = context.check_timeout() {
                if !self.options.partial_results_on_timeout {
                    return Err(error);
                }
                warn!(%error, rows = running.len(), "BGP timed out, keeping partial results");
                break;
            }
            running = match item {
                BgpItem::Triple(pattern) => {
                    let matched = self.match_triple(pattern, context);
                    trace!(pattern = %pattern, rows = matched.len(), "matched triple pattern");
                    if running.is_disjoint_with(&matched) {
                        running.product(&matched)
                    } else {
                        running.join(&matched)
                    }
                }
                BgpItem::Filter(expression) => self.process_filter(running, expression, context)?,
                BgpItem::Bind {
                    variable,
                    expression,
                } => {
                    if declared.contains(variable) {
                        return Err(EvaluationError::Rebind {
                            variable: variable.clone(),
                        });
                    }
                    let expressions = context.expression_context();
                    extend_all(&running, &declared, variable, expression, &expressions)?
                }
            };
            for name in item.variables() {
                if !declared.contains(&name) {
                    declared.push(name);
                }
            }
            if running.is_empty() {
                return Ok(Multiset::Null);
            }
        }
        if self.options.trim_temporary_variables {
            running.trim();
        }
        Ok(running)
    }

    fn match_triple(&self, pattern: &TriplePattern, context: &EvaluationContext<'_>) -> Multiset {
        let rows: Vec<Solution> = self
            .pool
            .match_pattern(pattern, context.active_graph(), None)
            .filter_map(|quad| pattern.bind(quad))
            .collect();
        if rows.is_empty() {
            Multiset::Null
        } else {
            Multiset::with_variables(&pattern.variables(), rows)
        }
    }

    fn process_extend(
        inner: &Algebra,
        input: Multiset,
        variable: &str,
        expression: &Expr,
        context: &EvaluationContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        if input.is_empty() {
            return Ok(input);
        }
        let declared = inner.variables();
        if declared.iter().any(|name| name == variable) || input.contains_variable(variable) {
            return Err(EvaluationError::Rebind {
                variable: variable.to_owned(),
            });
        }
        extend_all(&input, &declared, variable, expression, &context.expression_context())
    }

    fn process_filter(
        &self,
        input: Multiset,
        expression: &Expr,
        context: &EvaluationContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        let expressions = context.expression_context();
        let fail_silently = self.options.fail_silently_on_filter_error;
        let mut failure = None;
        let kept = input.retain(|solution| {
            if failure.is_some() {
                return false;
            }
            match filter_accepts(expression, solution, &expressions, fail_silently) {
                Ok(keep) => keep,
                Err(error) => {
                    failure = Some(error);
                    false
                }
            }
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(kept),
        }
    }

    fn process_select(input: Multiset, variables: &[String], select_all: bool) -> Multiset {
        if select_all {
            return input;
        }
        let rows = input
            .solutions()
            .iter()
            .map(|solution| solution.project(variables))
            .collect();
        Multiset::with_variables(variables, rows)
    }

    fn process_slice(input: Multiset, offset: usize, limit: Option<usize>) -> Multiset {
        match input {
            Multiset::Identity if offset == 0 => Multiset::Identity,
            Multiset::Identity | Multiset::Null => Multiset::Null,
            ordinary => {
                let rows = ordinary
                    .solutions()
                    .iter()
                    .skip(offset)
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect();
                Multiset::with_variables(ordinary.variables(), rows)
            }
        }
    }

    fn process_graph(
        &self,
        inner: &Algebra,
        graph: &PatternItem,
        context: &mut EvaluationContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        match graph {
            PatternItem::Term(name) => {
                let previous = context.replace_active_graph(ActiveGraph::named(name.clone()));
                let result = self.process(inner, context);
                context.replace_active_graph(previous);
                result
            }
            PatternItem::Variable(variable) => {
                let mut variables = inner.variables();
                if !variables.contains(variable) {
                    variables.push(variable.clone());
                }
                let mut rows = Vec::new();
                for name in graphs_in_scope(self.pool, context.active_graph()) {
                    let previous = context.replace_active_graph(ActiveGraph::named(name.clone()));
                    let result = self.process(inner, context);
                    context.replace_active_graph(previous);
                    for solution in result?.solutions() {
                        let mut row = solution.clone();
                        if row.bind(variable, name.clone()) {
                            rows.push(row);
                        }
                    }
                }
                if rows.is_empty() {
                    Ok(Multiset::Null)
                } else {
                    Ok(Multiset::with_variables(&variables, rows))
                }
            }
        }
    }
}

/// Extend every row of `input`, declaring `variable` in the schema.
fn extend_all(
    input: &Multiset,
    declared: &[String],
    variable: &str,
    expression: &Expr,
    context: &ExpressionContext<'_>,
) -> Result<Multiset, EvaluationError> {
    let rows = input
        .solutions()
        .iter()
        .map(|solution| extend_solution(solution, variable, expression, context))
        .collect::<Result<Vec<_>, _>>()?;
    let mut variables: Vec<String> = input.variables().to_vec();
    for name in declared.iter().map(String::as_str).chain([variable]) {
        if !variables.iter().any(|v| v == name) {
            variables.push(name.to_owned());
        }
    }
    Ok(Multiset::with_variables(&variables, rows))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::query::aggregate::BuiltinAggregate;
    use crate::query::error::ExpressionError;
    use crate::query::grouping::GroupingClause;
    use crate::storage::TripleStore;
    use crate::testing::{ex, knows_store};
    use crate::types::Quad;

    fn knows(s: &str, o: &str) -> TriplePattern {
        TriplePattern::new(PatternItem::var(s), PatternItem::Term(ex("knows")), PatternItem::var(o))
    }

    fn engine(store: &TripleStore) -> QueryEngine<'_> {
        QueryEngine::new(store, QueryOptions::default())
    }

    #[test]
    fn test_empty_bgp_is_identity() {
        let store = TripleStore::new();
        let result = engine(&store).evaluate(&Algebra::identity()).expect("evaluate");
        assert!(result.is_identity());
    }

    #[test]
    fn test_bgp_without_matches_is_null() {
        let store = knows_store();
        let pattern = TriplePattern::new(
            PatternItem::var("x"),
            PatternItem::Term(ex("hates")),
            PatternItem::var("y"),
        );
        let result = engine(&store).evaluate(&Algebra::triples([pattern])).expect("evaluate");
        assert!(result.is_null());
    }

    #[test]
    fn test_two_step_join() {
        let store = knows_store();
        let query = Algebra::triples([knows("x", "y"), knows("y", "z")]);
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(
            result.solutions(),
            &[Solution::from_pairs([("x", ex("a")), ("y", ex("b")), ("z", ex("c"))])]
        );
    }

    #[test]
    fn test_blank_nodes_are_trimmed() {
        let store = knows_store();
        let query = Algebra::triples([TriplePattern::new(
            PatternItem::var("x"),
            PatternItem::Term(ex("knows")),
            PatternItem::blank("b0"),
        )]);
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.len(), 2);
        assert_eq!(result.variables(), &["x".to_string()]);

        let keep = QueryEngine::new(&store, QueryOptions::default().with_trim_temporary_variables(false));
        let untrimmed = keep.evaluate(&query).expect("evaluate");
        assert!(untrimmed.contains_variable("_:b0"));
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let store = knows_store();
        let query = Algebra::left_join(
            Algebra::triples([knows("x", "y")]),
            Algebra::triples([knows("y", "z")]),
            None,
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.len(), 2);
        assert!(result.contains_variable("z"));
        assert_eq!(result.solutions().iter().filter(|s| s.is_bound("z")).count(), 1);
    }

    #[test]
    fn test_left_join_filter_rejects_match() {
        let store = knows_store();
        let query = Algebra::left_join(
            Algebra::triples([knows("x", "y")]),
            Algebra::triples([knows("y", "z")]),
            Some(Expr::equal(Expr::var("z"), Expr::constant(ex("nobody")))),
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.len(), 2);
        assert!(result.solutions().iter().all(|s| !s.is_bound("z")));
    }

    #[test]
    fn test_extend_binds_and_tolerates_errors() {
        let store = knows_store();
        let query = Algebra::extend(
            Algebra::triples([knows("x", "y")]),
            "n",
            Expr::plus(Expr::var("x"), Expr::constant(Term::integer(1))),
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.len(), 2);
        assert!(result.contains_variable("n"));
        assert!(result.solutions().iter().all(|s| !s.is_bound("n")));
    }

    #[test]
    fn test_extend_rebind_fails() {
        let store = knows_store();
        let query = Algebra::extend(Algebra::triples([knows("x", "y")]), "y", Expr::var("x"));
        let err = engine(&store).evaluate(&query).expect_err("rebind should fail");
        assert!(matches!(err, EvaluationError::Rebind { variable } if variable == "y"));
    }

    #[test]
    fn test_extend_over_identity_evaluates_once() {
        let store = TripleStore::new();
        let query = Algebra::extend(Algebra::identity(), "one", Expr::constant(Term::integer(1)));
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.solutions(), &[Solution::from_pairs([("one", Term::integer(1))])]);
    }

    #[test]
    fn test_filter_error_policies() {
        let store = knows_store();
        let broken = Expr::greater(Expr::var("missing"), Expr::constant(Term::integer(1)));
        let query = Algebra::filter(Algebra::triples([knows("x", "y")]), broken);

        let silent = engine(&store).evaluate(&query).expect("evaluate");
        assert!(silent.is_empty());

        let loud = QueryEngine::new(&store, QueryOptions::default().with_fail_silently_on_filter_error(false));
        let err = loud.evaluate(&query).expect_err("loud filter should fail");
        assert!(matches!(
            err,
            EvaluationError::Expression(ExpressionError::UnboundVariable(_))
        ));
    }

    #[test]
    fn test_loud_filter_is_lenient_on_empty_solution() {
        let store = TripleStore::new();
        let query = Algebra::filter(Algebra::identity(), Expr::var("missing"));
        let loud = QueryEngine::new(&store, QueryOptions::default().with_fail_silently_on_filter_error(false));
        let result = loud.evaluate(&query).expect("empty solution is filtered leniently");
        assert!(result.is_null());
    }

    #[test]
    fn test_group_by_implicit_count() {
        let store = knows_store();
        let query = Algebra::group_by(
            Algebra::triples([TriplePattern::new(
                PatternItem::var("s"),
                PatternItem::var("p"),
                PatternItem::var("o"),
            )]),
            None,
            vec![BuiltinAggregate::count_all("n").shared()],
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.solutions(), &[Solution::from_pairs([("n", Term::integer(2))])]);
    }

    #[test]
    fn test_group_by_variable() {
        let mut store = knows_store();
        store.insert(Quad::new(ex("a"), ex("knows"), ex("c")));
        let query = Algebra::group_by(
            Algebra::triples([knows("x", "y")]),
            Some(GroupingClause::by_variable("x")),
            vec![BuiltinAggregate::count_all("n").shared()],
        );
        let mut rows = engine(&store).evaluate(&query).expect("evaluate").into_solutions();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                Solution::from_pairs([("n", Term::integer(2)), ("x", ex("a"))]),
                Solution::from_pairs([("n", Term::integer(1)), ("x", ex("b"))]),
            ]
        );
    }

    #[test]
    fn test_select_adds_missing_variables_and_orders() {
        let store = knows_store();
        let query = Algebra::select(Algebra::triples([knows("x", "y")]), ["y", "nope"]);
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.variables(), &["y".to_string(), "nope".to_string()]);
        assert!(result.solutions().iter().all(|s| s.len() == 1));

        let ordered = QueryEngine::new(&store, QueryOptions::default().with_output_variables(["nope", "y"]));
        let result = ordered.evaluate(&query).expect("evaluate");
        assert_eq!(result.variables(), &["nope".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_ask() {
        let store = knows_store();
        let yes = engine(&store)
            .evaluate(&Algebra::ask(Algebra::triples([knows("x", "y")])))
            .expect("evaluate");
        assert!(yes.is_identity());
        let no = engine(&store)
            .evaluate(&Algebra::ask(Algebra::filter(
                Algebra::triples([knows("x", "y")]),
                Expr::constant(Term::boolean(false)),
            )))
            .expect("evaluate");
        assert!(no.is_null());
    }

    #[test]
    fn test_slice_limit_zero_is_empty() {
        let store = knows_store();
        let query = Algebra::slice(Algebra::triples([knows("x", "y")]), 0, Some(0));
        assert!(engine(&store).evaluate(&query).expect("evaluate").is_empty());
    }

    #[test]
    fn test_order_by_descending() {
        let store = knows_store();
        let query = Algebra::order_by(
            Algebra::triples([knows("x", "y")]),
            vec![OrderCondition::descending(Expr::var("x"))],
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        let xs: Vec<&Term> = result.solutions().iter().filter_map(|s| s.get("x")).collect();
        assert_eq!(xs, vec![&ex("b"), &ex("a")]);
    }

    #[test]
    fn test_minus_removes_compatible_rows() {
        let store = knows_store();
        let query = Algebra::minus(
            Algebra::triples([knows("x", "y")]),
            Algebra::triples([TriplePattern::new(
                PatternItem::var("x"),
                PatternItem::Term(ex("knows")),
                PatternItem::Term(ex("c")),
            )]),
        );
        let result = engine(&store).evaluate(&query).expect("evaluate");
        assert_eq!(result.solutions(), &[Solution::from_pairs([("x", ex("a")), ("y", ex("b"))])]);
    }

    #[test]
    fn test_graph_variable_ranges_over_named_graphs() {
        let mut store = TripleStore::new();
        store.insert(Quad::in_graph(ex("a"), ex("p"), ex("b"), ex("g1")));
        store.insert(Quad::in_graph(ex("c"), ex("p"), ex("d"), ex("g2")));
        store.insert(Quad::new(ex("e"), ex("p"), ex("f")));
        let pattern = TriplePattern::new(PatternItem::var("s"), PatternItem::Term(ex("p")), PatternItem::var("o"));

        let query = Algebra::graph(Algebra::triples([pattern.clone()]), PatternItem::var("g"));
        let mut rows = engine(&store).evaluate(&query).expect("evaluate").into_solutions();
        rows.sort();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("g"), Some(&ex("g1")));

        let fixed = Algebra::graph(Algebra::triples([pattern.clone()]), PatternItem::Term(ex("g2")));
        let result = engine(&store).evaluate(&fixed).expect("evaluate");
        assert_eq!(result.solutions(), &[Solution::from_pairs([("s", ex("c")), ("o", ex("d"))])]);

        let default = engine(&store).evaluate(&Algebra::triples([pattern])).expect("evaluate");
        assert_eq!(default.len(), 1);
    }

    #[test]
    fn test_unknown_property_function() {
        let store = knows_store();
        let query = Algebra::property_function(
            Algebra::identity(),
            crate::query::PropertyFunctionCall::new("http://example.org/nope", vec![], vec![]),
        );
        let err = engine(&store).evaluate(&query).expect_err("unknown function");
        assert!(matches!(err, EvaluationError::UnknownPropertyFunction(_)));
    }

    #[test]
    fn test_timeout_with_and_without_partial_results() {
        let store = knows_store();
        let clock = crate::simulation::SimulatedTimeSource::shared(0);
        let query = Algebra::triples([knows("x", "y"), knows("y", "z")]);
        let options = QueryOptions::default()
            .with_timeout(Some(Duration::from_millis(5)))
            .with_time_source(clock.clone());

        // The clock jumps past the deadline after the first pattern.
        clock.set_auto_advance(3);
        let err = QueryEngine::new(&store, options.clone())
            .evaluate(&query)
            .expect_err("query should time out");
        assert!(matches!(err, EvaluationError::Timeout { .. }));

        clock.set(0);
        let partial = QueryEngine::new(&store, options.with_partial_results_on_timeout(true))
            .evaluate(&query)
            .expect("partial results");
        assert_eq!(partial.len(), 2);
    }
}
