//! Aggregate accumulators for GROUP BY.
//!
//! An accumulator is created per group by an [`AggregateFactory`], sees
//! `start`, one `accept` per grouped solution, then `end`, after which
//! `value` holds the result (`None` leaves the output variable unbound).
//!
//! Error policy of the built-ins:
//! - COUNT, SUM, AVG, MIN, MAX, SAMPLE, GROUP_CONCAT and MEDIAN skip
//!   solutions whose expression fails.
//! - SUM and AVG become unbound once a bound non-numeric value is seen.
//! - MODE counts failures as nulls; if nulls are at least as frequent as the
//!   most frequent value the result is unbound.
//! - ANY, ALL and NONE treat a failure as `false`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::expression::{Expr, Expression, ExpressionContext};
use super::solution::Solution;
use crate::types::{Term, compare_for_ordering, xsd};

/// Per-group aggregate state.
pub trait Aggregate: Send {
    /// Output variable the result is bound to.
    fn variable_name(&self) -> &str;

    /// Reset to the empty state.
    fn start(&mut self);

    /// Fold one grouped solution in.
    fn accept(&mut self, solution: &Solution, context: &ExpressionContext<'_>);

    /// Finalize the result.
    fn end(&mut self);

    /// Result after [`Aggregate::end`].
    fn value(&self) -> Option<&Term>;
}

/// Creates fresh accumulators, one per group.
pub trait AggregateFactory: fmt::Debug + Send + Sync {
    fn variable_name(&self) -> &str;

    fn create(&self) -> Box<dyn Aggregate>;
}

/// Built-in aggregate functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateKind {
    /// `COUNT(*)`
    CountAll,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Sample,
    GroupConcat { separator: String },
    Median,
    Mode,
    /// True if the expression is true for some solution.
    Any,
    /// True if the expression is true for every solution.
    All,
    /// True if the expression is true for no solution.
    NoneOf,
}

/// A built-in aggregate bound to an output variable.
#[derive(Debug, Clone)]
pub struct BuiltinAggregate {
    variable: String,
    kind: AggregateKind,
    expression: Option<Expr>,
    distinct: bool,
}

impl BuiltinAggregate {
    #[must_use]
    pub fn new(variable: impl Into<String>, kind: AggregateKind, expression: Expr) -> Self {
        Self {
            variable: variable.into(),
            kind,
            expression: Some(expression),
            distinct: false,
        }
    }

    /// `COUNT(*)`.
    #[must_use]
    pub fn count_all(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            kind: AggregateKind::CountAll,
            expression: None,
            distinct: false,
        }
    }

    #[must_use]
    pub fn count(variable: impl Into<String>, expression: Expr) -> Self {
        Self::new(variable, AggregateKind::Count, expression)
    }

    #[must_use]
    pub fn sum(variable: impl Into<String>, expression: Expr) -> Self {
        Self::new(variable, AggregateKind::Sum, expression)
    }

    #[must_use]
    pub fn avg(variable: impl Into<String>, expression: Expr) -> Self {
        Self::new(variable, AggregateKind::Avg, expression)
    }

    #[must_use]
    pub fn min(variable: impl Into<String>, expression: Expr) -> Self {
        Self::new(variable, AggregateKind::Min, expression)
    }

    #[must_use]
    pub fn max(variable: impl Into<String>, expression: Expr) -> Self {
        Self::new(variable, AggregateKind::Max, expression)
    }

    /// Only distinct values (or distinct solutions for `COUNT(*)`) contribute.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> &AggregateKind {
        &self.kind
    }

    /// Wrap for use in [`super::Algebra::GroupBy`].
    #[must_use]
    pub fn shared(self) -> Arc<dyn AggregateFactory> {
        Arc::new(self)
    }
}

impl AggregateFactory for BuiltinAggregate {
    fn variable_name(&self) -> &str {
        &self.variable
    }

    fn create(&self) -> Box<dyn Aggregate> {
        let mut accumulator = Accumulator {
            definition: self.clone(),
            state: State::Count(0),
            seen_values: HashSet::new(),
            seen_rows: HashSet::new(),
            result: None,
        };
        accumulator.start();
        Box::new(accumulator)
    }
}

enum State {
    Count(i64),
    /// Integral operands are summed exactly in `exact`, the rest in `fractional`.
    Numeric {
        exact: i128,
        fractional: f64,
        count: i64,
        integral: bool,
        invalid: bool,
    },
    Extreme(Option<Term>),
    Concat(Vec<String>),
    Values(Vec<Term>),
    Frequencies {
        counts: HashMap<Term, usize>,
        nulls: usize,
    },
    Truth {
        any_true: bool,
        any_false: bool,
    },
}

struct Accumulator {
    definition: BuiltinAggregate,
    state: State,
    seen_values: HashSet<Term>,
    seen_rows: HashSet<Solution>,
    result: Option<Term>,
}

impl Accumulator {
    fn initial_state(kind: &AggregateKind) -> State {
        match kind {
            AggregateKind::CountAll | AggregateKind::Count => State::Count(0),
            AggregateKind::Sum | AggregateKind::Avg => State::Numeric {
                exact: 0,
                fractional: 0.0,
                count: 0,
                integral: true,
                invalid: false,
            },
            AggregateKind::Min | AggregateKind::Max | AggregateKind::Sample => State::Extreme(None),
            AggregateKind::GroupConcat { .. } => State::Concat(Vec::new()),
            AggregateKind::Median => State::Values(Vec::new()),
            AggregateKind::Mode => State::Frequencies {
                counts: HashMap::new(),
                nulls: 0,
            },
            AggregateKind::Any | AggregateKind::All | AggregateKind::NoneOf => State::Truth {
                any_true: false,
                any_false: false,
            },
        }
    }

    /// `false` when DISTINCT has already seen this value.
    fn first_sighting(&mut self, value: &Term) -> bool {
        !self.definition.distinct || self.seen_values.insert(value.clone())
    }

    fn evaluate(&self, solution: &Solution, context: &ExpressionContext<'_>) -> Option<Term> {
        self.definition
            .expression
            .as_ref()
            .and_then(|expression| expression.evaluate(solution, context).ok())
    }
}

impl Aggregate for Accumulator {
    fn variable_name(&self) -> &str {
        &self.definition.variable
    }

    fn start(&mut self) {
        self.state = Self::initial_state(&self.definition.kind);
        self.seen_values.clear();
        self.seen_rows.clear();
        self.result = None;
    }

    #[allow(clippy::cast_precision_loss)]
    fn accept(&mut self, solution: &Solution, context: &ExpressionContext<'_>) {
        if self.definition.kind == AggregateKind::CountAll {
            if !self.definition.distinct || self.seen_rows.insert(solution.clone()) {
                if let State::Count(count) = &mut self.state {
                    *count += 1;
                }
            }
            return;
        }

        if let State::Truth { any_true, any_false } = &mut self.state {
            let truth = self.definition.expression.as_ref().and_then(|expression| {
                expression.evaluate_boolean(solution, context).ok()
            });
            if truth == Some(true) {
                *any_true = true;
            } else {
                *any_false = true;
            }
            return;
        }

        let Some(value) = self.evaluate(solution, context) else {
            if let State::Frequencies { nulls, .. } = &mut self.state {
                *nulls += 1;
            }
            return;
        };
        if !self.first_sighting(&value) {
            return;
        }

        let is_min = self.definition.kind == AggregateKind::Min;
        let is_sample = self.definition.kind == AggregateKind::Sample;
        match &mut self.state {
            State::Count(count) => *count += 1,
            State::Numeric {
                exact,
                fractional,
                count,
                integral,
                invalid,
            } => match (value.as_i64(), value.as_f64()) {
                (Some(number), _) => {
                    match exact.checked_add(i128::from(number)) {
                        Some(sum) => *exact = sum,
                        None => {
                            *fractional += number as f64;
                            *integral = false;
                        }
                    }
                    *count += 1;
                }
                (None, Some(number)) => {
                    *fractional += number;
                    *count += 1;
                    *integral = false;
                }
                (None, None) => *invalid = true,
            },
            State::Extreme(best) => {
                let replace = match best.as_ref() {
                    None => true,
                    Some(_) if is_sample => false,
                    Some(current) => {
                        let ordering = compare_for_ordering(Some(&value), Some(current));
                        if is_min { ordering.is_lt() } else { ordering.is_gt() }
                    }
                };
                if replace {
                    *best = Some(value);
                }
            }
            State::Concat(parts) => parts.push(value.lexical_form().to_owned()),
            State::Values(values) => values.push(value),
            State::Frequencies { counts, .. } => *counts.entry(value).or_insert(0) += 1,
            State::Truth { .. } => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn end(&mut self) {
        self.result = match &mut self.state {
            State::Count(count) => Some(Term::integer(*count)),
            State::Numeric {
                exact,
                fractional,
                count,
                integral,
                invalid,
            } => {
                let total = *exact as f64 + *fractional;
                if *invalid {
                    None
                } else if self.definition.kind == AggregateKind::Avg {
                    if *count == 0 {
                        Some(Term::integer(0))
                    } else {
                        Some(Term::decimal(total / *count as f64))
                    }
                } else if *integral {
                    Some(Term::typed(exact.to_string(), xsd::INTEGER))
                } else {
                    Some(Term::decimal(total))
                }
            }
            State::Extreme(best) => best.clone(),
            State::Concat(parts) => {
                let separator = match &self.definition.kind {
                    AggregateKind::GroupConcat { separator } => separator.as_str(),
                    _ => " ",
                };
                Some(Term::literal(parts.join(separator)))
            }
            State::Values(values) => {
                values.sort_by(|a, b| compare_for_ordering(Some(a), Some(b)));
                values.get(values.len() / 2).cloned()
            }
            State::Frequencies { counts, nulls } => {
                let mut ranked: Vec<(&Term, &usize)> = counts.iter().collect();
                // Most frequent first; ties go to the smaller term.
                ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                match ranked.first() {
                    Some((term, count)) if **count > *nulls => Some((*term).clone()),
                    _ => None,
                }
            }
            State::Truth { any_true, any_false } => Some(Term::boolean(match self.definition.kind {
                AggregateKind::Any => *any_true,
                AggregateKind::All => !*any_false,
                _ => !*any_true,
            })),
        };
    }

    fn value(&self) -> Option<&Term> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ActiveGraph;

    fn run(factory: &dyn AggregateFactory, rows: &[Solution]) -> Option<Term> {
        let graph = ActiveGraph::Default;
        let context = ExpressionContext::new(&graph);
        let mut aggregate = factory.create();
        aggregate.start();
        for row in rows {
            aggregate.accept(row, &context);
        }
        aggregate.end();
        aggregate.value().cloned()
    }

    fn values(terms: Vec<Option<Term>>) -> Vec<Solution> {
        terms
            .into_iter()
            .map(|term| term.map_or_else(Solution::new, |t| Solution::from_pairs([("v", t)])))
            .collect()
    }

    fn ints(ns: &[i64]) -> Vec<Solution> {
        values(ns.iter().map(|n| Some(Term::integer(*n))).collect())
    }

    #[test]
    fn test_count_all_and_count() {
        let rows = values(vec![Some(Term::integer(1)), None, Some(Term::integer(1))]);
        assert_eq!(run(&BuiltinAggregate::count_all("c"), &rows), Some(Term::integer(3)));
        assert_eq!(
            run(&BuiltinAggregate::count("c", Expr::var("v")), &rows),
            Some(Term::integer(2))
        );
        assert_eq!(
            run(&BuiltinAggregate::count("c", Expr::var("v")).distinct(), &rows),
            Some(Term::integer(1))
        );
        assert_eq!(run(&BuiltinAggregate::count_all("c"), &[]), Some(Term::integer(0)));
    }

    #[test]
    fn test_sum_and_avg() {
        let rows = ints(&[1, 2, 3, 4]);
        assert_eq!(run(&BuiltinAggregate::sum("s", Expr::var("v")), &rows), Some(Term::integer(10)));
        assert_eq!(run(&BuiltinAggregate::avg("a", Expr::var("v")), &rows), Some(Term::decimal(2.5)));

        let mut mixed = ints(&[1]);
        mixed.extend(values(vec![Some(Term::literal("x"))]));
        assert_eq!(run(&BuiltinAggregate::sum("s", Expr::var("v")), &mixed), None);
    }

    #[test]
    fn test_integer_sum_is_exact() {
        let rows = ints(&[9_007_199_254_740_993, 0]);
        assert_eq!(
            run(&BuiltinAggregate::sum("s", Expr::var("v")), &rows),
            Some(Term::integer(9_007_199_254_740_993))
        );

        let rows = ints(&[i64::MAX, i64::MAX]);
        assert_eq!(
            run(&BuiltinAggregate::sum("s", Expr::var("v")), &rows),
            Some(Term::typed("18446744073709551614", xsd::INTEGER))
        );

        let mut mixed = ints(&[1]);
        mixed.extend(values(vec![Some(Term::decimal(0.5))]));
        assert_eq!(run(&BuiltinAggregate::sum("s", Expr::var("v")), &mixed), Some(Term::decimal(1.5)));
    }

    #[test]
    fn test_min_max_skip_unbound() {
        let rows = values(vec![None, Some(Term::integer(10)), Some(Term::integer(2))]);
        assert_eq!(run(&BuiltinAggregate::min("m", Expr::var("v")), &rows), Some(Term::integer(2)));
        assert_eq!(run(&BuiltinAggregate::max("m", Expr::var("v")), &rows), Some(Term::integer(10)));
        assert_eq!(run(&BuiltinAggregate::max("m", Expr::var("v")), &[]), None);
    }

    #[test]
    fn test_median_takes_upper_middle() {
        let rows = ints(&[7, 1, 5, 3]);
        let median = BuiltinAggregate::new("m", AggregateKind::Median, Expr::var("v"));
        assert_eq!(run(&median, &rows), Some(Term::integer(5)));
    }

    #[test]
    fn test_mode_and_nulls() {
        let mode = BuiltinAggregate::new("m", AggregateKind::Mode, Expr::var("v"));
        assert_eq!(run(&mode, &ints(&[1, 2, 2, 3])), Some(Term::integer(2)));
        let mostly_null = values(vec![None, None, Some(Term::integer(1))]);
        assert_eq!(run(&mode, &mostly_null), None);
    }

    #[test]
    fn test_boolean_aggregates() {
        let test = Expr::greater(Expr::var("v"), Expr::constant(Term::integer(1)));
        let rows = values(vec![Some(Term::integer(2)), None]);
        let any = BuiltinAggregate::new("b", AggregateKind::Any, test.clone());
        let all = BuiltinAggregate::new("b", AggregateKind::All, test.clone());
        let none = BuiltinAggregate::new("b", AggregateKind::NoneOf, test);
        assert_eq!(run(&any, &rows), Some(Term::boolean(true)));
        assert_eq!(run(&all, &rows), Some(Term::boolean(false)));
        assert_eq!(run(&none, &rows), Some(Term::boolean(false)));
    }

    #[test]
    fn test_group_concat_and_sample() {
        let rows = values(vec![Some(Term::literal("a")), Some(Term::literal("b"))]);
        let concat = BuiltinAggregate::new(
            "g",
            AggregateKind::GroupConcat {
                separator: ", ".to_string(),
            },
            Expr::var("v"),
        );
        assert_eq!(run(&concat, &rows), Some(Term::literal("a, b")));
        let sample = BuiltinAggregate::new("s", AggregateKind::Sample, Expr::var("v"));
        assert_eq!(run(&sample, &rows), Some(Term::literal("a")));
    }

    #[test]
    fn test_start_resets_state() {
        let factory = BuiltinAggregate::count_all("c");
        let graph = ActiveGraph::Default;
        let context = ExpressionContext::new(&graph);
        let mut aggregate = factory.create();
        aggregate.accept(&Solution::new(), &context);
        aggregate.start();
        aggregate.end();
        assert_eq!(aggregate.value(), Some(&Term::integer(0)));
        assert_eq!(aggregate.variable_name(), "c");
    }
}
