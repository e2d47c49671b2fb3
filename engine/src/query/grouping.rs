//! Grouping keys and per-group aggregate state.
//!
//! Both evaluators bucket solutions through a [`Grouper`]: the eager one feeds
//! it a materialized multiset, the streaming one feeds it solutions as they
//! arrive and finalizes when its child is exhausted.
//!
//! # Key equality
//!
//! A [`GroupKey`] compares terms with normalized term equality: literals are
//! normalized on construction (`xsd:string` dropped, language tags lower-cased),
//! so two keys are equal exactly when their terms are equal after that
//! normalization. Numeric literals with different lexical forms or datatypes
//! (`"1"^^xsd:integer`, `"01"^^xsd:integer`, `"1.0"^^xsd:decimal`) form
//! different groups. An unbound key position and a key expression that raised
//! an error are kept apart from every bound value and from each other.

use std::collections::HashMap;
use std::sync::Arc;

use super::aggregate::{Aggregate, AggregateFactory};
use super::error::{EvaluationError, ExpressionError};
use super::expression::{Expr, Expression, ExpressionContext};
use super::solution::Solution;
use crate::types::Term;

/// One level of GROUP BY, optionally followed by finer levels.
#[derive(Debug, Clone)]
pub struct GroupingClause {
    pub expression: Expr,
    /// `GROUP BY (expr AS ?alias)`.
    pub alias: Option<String>,
    pub child: Option<Box<GroupingClause>>,
}

impl GroupingClause {
    #[must_use]
    pub const fn new(expression: Expr) -> Self {
        Self {
            expression,
            alias: None,
            child: None,
        }
    }

    /// Group by the value of a variable.
    #[must_use]
    pub fn by_variable(name: impl Into<String>) -> Self {
        Self::new(Expr::var(name))
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Append `next` as the innermost level.
    #[must_use]
    pub fn then(mut self, next: Self) -> Self {
        self.child = Some(Box::new(match self.child.take() {
            Some(child) => child.then(next),
            None => next,
        }));
        self
    }

    /// Variable a level's key value is bound to in the output, if any.
    #[must_use]
    pub fn output_variable(&self) -> Option<&str> {
        self.alias.as_deref().or_else(|| self.expression.as_variable())
    }

    /// This level and every finer level, outermost first.
    pub fn levels(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |clause| clause.child.as_deref())
    }

    /// Output variables of all levels.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.levels().filter_map(Self::output_variable) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    fn key_parts(&self, solution: &Solution, context: &ExpressionContext<'_>, out: &mut Vec<KeyPart>) {
        out.push(match self.expression.evaluate(solution, context) {
            Ok(term) => KeyPart::Value(term),
            Err(ExpressionError::UnboundVariable(_)) => KeyPart::Unbound,
            Err(_) => KeyPart::Error,
        });
        if let Some(child) = &self.child {
            child.key_parts(solution, context, out);
        }
    }
}

/// One position of a grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Value(Term),
    Unbound,
    Error,
}

/// The tuple of evaluated GROUP BY expressions for one solution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<KeyPart>);

impl GroupKey {
    /// Key of `solution` under `clause`; the empty key when there is no clause.
    #[must_use]
    pub fn of(
        clause: Option<&GroupingClause>,
        solution: &Solution,
        context: &ExpressionContext<'_>,
    ) -> Self {
        let mut parts = Vec::new();
        if let Some(clause) = clause {
            clause.key_parts(solution, context, &mut parts);
        }
        Self(parts)
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

struct Group {
    key: GroupKey,
    aggregates: Vec<Box<dyn Aggregate>>,
}

/// Buckets solutions by key and accumulates aggregates per bucket.
pub struct Grouper<'a> {
    clause: Option<&'a GroupingClause>,
    factories: &'a [Arc<dyn AggregateFactory>],
    index: HashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl<'a> Grouper<'a> {
    #[must_use]
    pub fn new(clause: Option<&'a GroupingClause>, factories: &'a [Arc<dyn AggregateFactory>]) -> Self {
        Self {
            clause,
            factories,
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    /// Number of groups seen so far.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Output schema: key variables, then aggregate variables.
    #[must_use]
    pub fn output_variables(&self) -> Vec<String> {
        let mut names = self.clause.map(GroupingClause::variables).unwrap_or_default();
        for factory in self.factories {
            let name = factory.variable_name();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    fn open_group(&mut self, key: GroupKey) -> usize {
        let aggregates = self
            .factories
            .iter()
            .map(|factory| {
                let mut aggregate = factory.create();
                aggregate.start();
                aggregate
            })
            .collect();
        let position = self.groups.len();
        self.index.insert(key.clone(), position);
        self.groups.push(Group { key, aggregates });
        position
    }

    /// Add one solution to its group.
    pub fn accept(&mut self, solution: &Solution, context: &ExpressionContext<'_>) {
        let key = GroupKey::of(self.clause, solution, context);
        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => self.open_group(key),
        };
        if let Some(group) = self.groups.get_mut(position) {
            for aggregate in &mut group.aggregates {
                aggregate.accept(solution, context);
            }
        }
    }

    /// Finalize every group into one output solution, in first-seen order.
    ///
    /// Without a grouping clause there is always exactly one group, even for
    /// empty input. Fails with [`EvaluationError::Rebind`] when an aggregate
    /// writes to a variable that a grouping key already bound.
    pub fn finish(mut self) -> Result<Vec<Solution>, EvaluationError> {
        if self.clause.is_none() && self.groups.is_empty() {
            self.open_group(GroupKey::default());
        }
        let clause = self.clause;
        let mut rows = Vec::with_capacity(self.groups.len());
        for mut group in self.groups {
            let mut row = Solution::new();
            if let Some(clause) = clause {
                for (level, part) in clause.levels().zip(group.key.parts()) {
                    if let (Some(name), KeyPart::Value(term)) = (level.output_variable(), part) {
                        row.bind(name, term.clone());
                    }
                }
            }
            for aggregate in &mut group.aggregates {
                aggregate.end();
                let name = aggregate.variable_name();
                if row.is_bound(name) {
                    return Err(EvaluationError::Rebind {
                        variable: name.to_owned(),
                    });
                }
                if let Some(value) = aggregate.value() {
                    row.bind(name, value.clone());
                }
            }
            rows.push(row);
        }
        tracing::trace!(groups = rows.len(), "finished grouping");
        Ok(rows)
    }
}
