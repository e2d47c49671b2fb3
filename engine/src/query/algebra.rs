//! Algebra trees evaluated by both the eager and the streaming evaluator.
//!
//! A tree is built by a query compiler (outside this crate) or by hand with
//! the constructor functions below.

use std::sync::Arc;

use super::aggregate::AggregateFactory;
use super::expression::{Expr, Expression};
use super::grouping::GroupingClause;
use super::pattern::{PatternItem, TriplePattern};
use super::property_function::PropertyFunctionCall;

/// One item of a basic graph pattern.
#[derive(Debug, Clone)]
pub enum BgpItem {
    Triple(TriplePattern),
    /// A filter applied to the rows built so far.
    Filter(Expr),
    /// A BIND applied to the rows built so far.
    Bind { variable: String, expression: Expr },
}

impl BgpItem {
    #[must_use]
    pub const fn triple(subject: PatternItem, predicate: PatternItem, object: PatternItem) -> Self {
        Self::Triple(TriplePattern::new(subject, predicate, object))
    }

    /// Variables this item can bind.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        match self {
            Self::Triple(pattern) => pattern.variables(),
            Self::Filter(_) => Vec::new(),
            Self::Bind { variable, .. } => vec![variable.clone()],
        }
    }
}

/// ORDER BY key.
#[derive(Debug, Clone)]
pub struct OrderCondition {
    pub expression: Expr,
    pub descending: bool,
}

impl OrderCondition {
    #[must_use]
    pub const fn ascending(expression: Expr) -> Self {
        Self {
            expression,
            descending: false,
        }
    }

    #[must_use]
    pub const fn descending(expression: Expr) -> Self {
        Self {
            expression,
            descending: true,
        }
    }
}

/// An operator tree.
#[derive(Debug, Clone)]
pub enum Algebra {
    Bgp(Vec<BgpItem>),
    Join(Box<Algebra>, Box<Algebra>),
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        filter: Option<Expr>,
    },
    Union(Box<Algebra>, Box<Algebra>),
    Minus(Box<Algebra>, Box<Algebra>),
    Extend {
        inner: Box<Algebra>,
        variable: String,
        expression: Expr,
    },
    Filter {
        inner: Box<Algebra>,
        expression: Expr,
    },
    GroupBy {
        inner: Box<Algebra>,
        clause: Option<GroupingClause>,
        aggregates: Vec<Arc<dyn AggregateFactory>>,
    },
    Select {
        inner: Box<Algebra>,
        variables: Vec<String>,
        select_all: bool,
    },
    Ask(Box<Algebra>),
    Slice {
        inner: Box<Algebra>,
        offset: usize,
        /// `None` is unbounded.
        limit: Option<usize>,
    },
    Distinct(Box<Algebra>),
    OrderBy {
        inner: Box<Algebra>,
        conditions: Vec<OrderCondition>,
    },
    Graph {
        inner: Box<Algebra>,
        graph: PatternItem,
    },
    PropertyFunction {
        inner: Box<Algebra>,
        call: PropertyFunctionCall,
    },
}

fn push_all(names: &mut Vec<String>, more: impl IntoIterator<Item = String>) {
    for name in more {
        if !names.contains(&name) {
            names.push(name);
        }
    }
}

impl Algebra {
    /// The BGP that matches nothing and binds nothing: evaluates to Identity.
    #[must_use]
    pub const fn identity() -> Self {
        Self::Bgp(Vec::new())
    }

    #[must_use]
    pub const fn bgp(items: Vec<BgpItem>) -> Self {
        Self::Bgp(items)
    }

    /// A BGP of triple patterns only.
    #[must_use]
    pub fn triples(patterns: impl IntoIterator<Item = TriplePattern>) -> Self {
        Self::Bgp(patterns.into_iter().map(BgpItem::Triple).collect())
    }

    #[must_use]
    pub fn join(left: Self, right: Self) -> Self {
        Self::Join(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn left_join(left: Self, right: Self, filter: Option<Expr>) -> Self {
        Self::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            filter,
        }
    }

    #[must_use]
    pub fn union(left: Self, right: Self) -> Self {
        Self::Union(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn minus(left: Self, right: Self) -> Self {
        Self::Minus(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn extend(inner: Self, variable: impl Into<String>, expression: Expr) -> Self {
        Self::Extend {
            inner: Box::new(inner),
            variable: variable.into(),
            expression,
        }
    }

    #[must_use]
    pub fn filter(inner: Self, expression: Expr) -> Self {
        Self::Filter {
            inner: Box::new(inner),
            expression,
        }
    }

    #[must_use]
    pub fn group_by(
        inner: Self,
        clause: Option<GroupingClause>,
        aggregates: Vec<Arc<dyn AggregateFactory>>,
    ) -> Self {
        Self::GroupBy {
            inner: Box::new(inner),
            clause,
            aggregates,
        }
    }

    #[must_use]
    pub fn select<S: Into<String>>(inner: Self, variables: impl IntoIterator<Item = S>) -> Self {
        Self::Select {
            inner: Box::new(inner),
            variables: variables.into_iter().map(Into::into).collect(),
            select_all: false,
        }
    }

    /// `SELECT *`.
    #[must_use]
    pub fn select_all(inner: Self) -> Self {
        Self::Select {
            inner: Box::new(inner),
            variables: Vec::new(),
            select_all: true,
        }
    }

    #[must_use]
    pub fn ask(inner: Self) -> Self {
        Self::Ask(Box::new(inner))
    }

    #[must_use]
    pub fn slice(inner: Self, offset: usize, limit: Option<usize>) -> Self {
        Self::Slice {
            inner: Box::new(inner),
            offset,
            limit,
        }
    }

    #[must_use]
    pub fn distinct(inner: Self) -> Self {
        Self::Distinct(Box::new(inner))
    }

    #[must_use]
    pub fn order_by(inner: Self, conditions: Vec<OrderCondition>) -> Self {
        Self::OrderBy {
            inner: Box::new(inner),
            conditions,
        }
    }

    #[must_use]
    pub fn graph(inner: Self, graph: PatternItem) -> Self {
        Self::Graph {
            inner: Box::new(inner),
            graph,
        }
    }

    #[must_use]
    pub fn property_function(inner: Self, call: PropertyFunctionCall) -> Self {
        Self::PropertyFunction {
            inner: Box::new(inner),
            call,
        }
    }

    /// Operator name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bgp(_) => "bgp",
            Self::Join(..) => "join",
            Self::LeftJoin { .. } => "left_join",
            Self::Union(..) => "union",
            Self::Minus(..) => "minus",
            Self::Extend { .. } => "extend",
            Self::Filter { .. } => "filter",
            Self::GroupBy { .. } => "group_by",
            Self::Select { .. } => "select",
            Self::Ask(_) => "ask",
            Self::Slice { .. } => "slice",
            Self::Distinct(_) => "distinct",
            Self::OrderBy { .. } => "order_by",
            Self::Graph { .. } => "graph",
            Self::PropertyFunction { .. } => "property_function",
        }
    }

    /// Variables the operator's output may bind, in first-mention order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        match self {
            Self::Bgp(items) => {
                for item in items {
                    push_all(&mut names, item.variables());
                }
            }
            Self::Join(left, right)
            | Self::LeftJoin { left, right, .. }
            | Self::Union(left, right) => {
                push_all(&mut names, left.variables());
                push_all(&mut names, right.variables());
            }
            Self::Minus(left, _) => push_all(&mut names, left.variables()),
            Self::Extend { inner, variable, .. } => {
                push_all(&mut names, inner.variables());
                push_all(&mut names, [variable.clone()]);
            }
            Self::Filter { inner, .. }
            | Self::Slice { inner, .. }
            | Self::Distinct(inner)
            | Self::OrderBy { inner, .. } => push_all(&mut names, inner.variables()),
            Self::GroupBy {
                clause, aggregates, ..
            } => {
                if let Some(clause) = clause {
                    push_all(&mut names, clause.variables());
                }
                push_all(
                    &mut names,
                    aggregates.iter().map(|a| a.variable_name().to_owned()),
                );
            }
            Self::Select {
                inner,
                variables,
                select_all,
            } => {
                if *select_all {
                    push_all(&mut names, inner.variables());
                } else {
                    push_all(&mut names, variables.iter().cloned());
                }
            }
            Self::Ask(_) => {}
            Self::Graph { inner, graph } => {
                push_all(&mut names, inner.variables());
                push_all(&mut names, graph.variable_name().map(str::to_owned));
            }
            Self::PropertyFunction { inner, call } => {
                push_all(&mut names, inner.variables());
                push_all(&mut names, call.variables());
            }
        }
        names
    }

    /// Variables read by expressions anywhere in the tree.
    #[must_use]
    pub fn expression_variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_expression_variables(&mut names);
        names
    }

    fn collect_expression_variables(&self, names: &mut Vec<String>) {
        match self {
            Self::Bgp(items) => {
                for item in items {
                    match item {
                        BgpItem::Filter(expression) | BgpItem::Bind { expression, .. } => {
                            push_all(names, expression.variables());
                        }
                        BgpItem::Triple(_) => {}
                    }
                }
            }
            Self::Join(left, right) | Self::Union(left, right) | Self::Minus(left, right) => {
                left.collect_expression_variables(names);
                right.collect_expression_variables(names);
            }
            Self::LeftJoin {
                left,
                right,
                filter,
            } => {
                left.collect_expression_variables(names);
                right.collect_expression_variables(names);
                if let Some(filter) = filter {
                    push_all(names, filter.variables());
                }
            }
            Self::Extend {
                inner, expression, ..
            }
            | Self::Filter { inner, expression } => {
                inner.collect_expression_variables(names);
                push_all(names, expression.variables());
            }
            Self::OrderBy { inner, conditions } => {
                inner.collect_expression_variables(names);
                for condition in conditions {
                    push_all(names, condition.expression.variables());
                }
            }
            Self::GroupBy { inner, clause, .. } => {
                inner.collect_expression_variables(names);
                if let Some(clause) = clause {
                    for level in clause.levels() {
                        push_all(names, level.expression.variables());
                    }
                }
            }
            Self::Select { inner, .. }
            | Self::Ask(inner)
            | Self::Slice { inner, .. }
            | Self::Distinct(inner)
            | Self::Graph { inner, .. }
            | Self::PropertyFunction { inner, .. } => inner.collect_expression_variables(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::aggregate::BuiltinAggregate;
    use crate::types::Term;

    fn knows(s: &str, o: &str) -> TriplePattern {
        TriplePattern::new(
            PatternItem::var(s),
            PatternItem::iri("http://example.org/knows"),
            PatternItem::var(o),
        )
    }

    #[test]
    fn test_bgp_variables_include_binds() {
        let bgp = Algebra::bgp(vec![
            BgpItem::Triple(knows("x", "y")),
            BgpItem::Filter(Expr::var("x")),
            BgpItem::Bind {
                variable: "z".to_string(),
                expression: Expr::constant(Term::integer(1)),
            },
        ]);
        assert_eq!(bgp.variables(), vec!["x", "y", "z"]);
        assert!(Algebra::identity().variables().is_empty());
    }

    #[test]
    fn test_join_variables_are_deduplicated() {
        let join = Algebra::join(Algebra::triples([knows("x", "y")]), Algebra::triples([knows("y", "z")]));
        assert_eq!(join.variables(), vec!["x", "y", "z"]);
        assert_eq!(join.name(), "join");
    }

    #[test]
    fn test_select_and_group_variables() {
        let inner = Algebra::triples([knows("x", "y")]);
        assert_eq!(Algebra::select(inner.clone(), ["y"]).variables(), vec!["y"]);
        assert_eq!(Algebra::select_all(inner.clone()).variables(), vec!["x", "y"]);
        let grouped = Algebra::group_by(
            inner,
            Some(GroupingClause::by_variable("x")),
            vec![BuiltinAggregate::count_all("n").shared()],
        );
        assert_eq!(grouped.variables(), vec!["x", "n"]);
    }

    #[test]
    fn test_minus_keeps_left_schema() {
        let minus = Algebra::minus(Algebra::triples([knows("x", "y")]), Algebra::triples([knows("y", "z")]));
        assert_eq!(minus.variables(), vec!["x", "y"]);
    }

    #[test]
    fn test_graph_variable_is_declared() {
        let graph = Algebra::graph(Algebra::triples([knows("x", "y")]), PatternItem::var("g"));
        assert_eq!(graph.variables(), vec!["x", "y", "g"]);
    }

    #[test]
    fn test_expression_variables() {
        let tree = Algebra::filter(
            Algebra::extend(Algebra::identity(), "a", Expr::var("b")),
            Expr::greater(Expr::var("c"), Expr::var("b")),
        );
        assert_eq!(tree.expression_variables(), vec!["b", "c"]);
    }
}
