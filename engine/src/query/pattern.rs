//! Triple patterns: templates matched against stored facts.

use std::fmt;

use super::solution::{Solution, TEMPORARY_VARIABLE_PREFIX};
use crate::types::{Quad, Term};

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternItem {
    /// A fixed term that must match exactly.
    Term(Term),
    /// A variable that binds to whatever term appears in this position.
    Variable(String),
}

impl PatternItem {
    /// A named variable.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// A blank node in a pattern: an anonymous variable removed by trimming.
    #[must_use]
    pub fn blank(label: &str) -> Self {
        Self::Variable(format!("{TEMPORARY_VARIABLE_PREFIX}{label}"))
    }

    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Term(Term::iri(iri))
    }

    #[must_use]
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            Self::Term(_) => None,
        }
    }

    /// The term this position is fixed to, given the bindings in `input`.
    #[must_use]
    pub fn resolve<'a>(&'a self, input: Option<&'a Solution>) -> Option<&'a Term> {
        match self {
            Self::Term(term) => Some(term),
            Self::Variable(name) => input.and_then(|solution| solution.get(name)),
        }
    }
}

impl From<Term> for PatternItem {
    fn from(term: Term) -> Self {
        match term {
            Term::Variable(name) => Self::Variable(name),
            other => Self::Term(other),
        }
    }
}

impl fmt::Display for PatternItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term(term) => write!(f, "{term}"),
            Self::Variable(name) => write!(f, "?{name}"),
        }
    }
}

/// A subject/predicate/object template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: PatternItem,
    pub predicate: PatternItem,
    pub object: PatternItem,
}

impl TriplePattern {
    #[must_use]
    pub const fn new(subject: PatternItem, predicate: PatternItem, object: PatternItem) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    fn positions(&self) -> [&PatternItem; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Variables of the pattern in position order, without duplicates.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.positions().iter().filter_map(|item| item.variable_name()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    /// Terms each position is fixed to under `input`: `[subject, predicate, object]`.
    #[must_use]
    pub fn resolve(&self, input: Option<&Solution>) -> [Option<Term>; 3] {
        self.positions()
            .map(|item| item.resolve(input).cloned())
    }

    /// Turn a matching fact into a solution over this pattern's variables.
    ///
    /// Returns `None` when the fact does not fit: a fixed term differs or a
    /// repeated variable would need two different values.
    #[must_use]
    pub fn bind(&self, quad: &Quad) -> Option<Solution> {
        let mut solution = Solution::new();
        let values = [&quad.subject, &quad.predicate, &quad.object];
        for (item, value) in self.positions().into_iter().zip(values) {
            match item {
                PatternItem::Term(term) => {
                    if term != value {
                        return None;
                    }
                }
                PatternItem::Variable(name) => {
                    if !solution.bind(name, value.clone()) {
                        return None;
                    }
                }
            }
        }
        Some(solution)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knows(s: &str, o: &str) -> Quad {
        Quad::new(Term::iri(s), Term::iri("knows"), Term::iri(o))
    }

    #[test]
    fn test_variables_dedup() {
        let pattern = TriplePattern::new(
            PatternItem::var("x"),
            PatternItem::iri("knows"),
            PatternItem::var("x"),
        );
        assert_eq!(pattern.variables(), vec!["x".to_string()]);
    }

    #[test]
    fn test_bind_repeated_variable() {
        let pattern = TriplePattern::new(
            PatternItem::var("x"),
            PatternItem::iri("knows"),
            PatternItem::var("x"),
        );
        assert!(pattern.bind(&knows("a", "b")).is_none());
        let solution = pattern.bind(&knows("a", "a")).expect("self loop matches");
        assert_eq!(solution.get("x"), Some(&Term::iri("a")));
    }

    #[test]
    fn test_resolve_uses_input() {
        let pattern = TriplePattern::new(
            PatternItem::var("x"),
            PatternItem::iri("knows"),
            PatternItem::var("y"),
        );
        let input = Solution::from_pairs([("y", Term::iri("b"))]);
        let [s, p, o] = pattern.resolve(Some(&input));
        assert_eq!(s, None);
        assert_eq!(p, Some(Term::iri("knows")));
        assert_eq!(o, Some(Term::iri("b")));
    }

    #[test]
    fn test_blank_is_temporary_variable() {
        let item = PatternItem::blank("b0");
        assert_eq!(item.variable_name(), Some("_:b0"));
        assert_eq!(PatternItem::from(Term::variable("v")), PatternItem::var("v"));
    }
}
