//! Variable bindings produced by pattern matching.
//!
//! A `Solution` maps variable names to terms. A variable that is absent is
//! unbound; there is no separate "bound to null" state. Solutions handed
//! downstream are only changed through copy-and-extend ([`Solution::extend`])
//! or by joining two compatible solutions into a new one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::EvaluationError;
use crate::types::Term;

/// Prefix of engine-generated variables (blank nodes in patterns).
pub const TEMPORARY_VARIABLE_PREFIX: &str = "_:";

/// Whether `name` is an engine-generated temporary variable.
#[must_use]
pub fn is_temporary_variable(name: &str) -> bool {
    name.starts_with(TEMPORARY_VARIABLE_PREFIX)
}

/// A set of variable bindings.
///
/// Serializes as a map from variable name to term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution {
    bindings: BTreeMap<String, Term>,
}

impl Solution {
    /// The solution with no bindings.
    pub const EMPTY: Self = Self::new();

    #[must_use]
    pub const fn new() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Build a solution from `(variable, term)` pairs. Later pairs win.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Term)>,
        S: Into<String>,
    {
        Self {
            bindings: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Get the value bound to `variable`.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings.get(variable)
    }

    #[must_use]
    pub fn is_bound(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate bindings in variable-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of the bound variables.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Bind a variable while the solution is still being built.
    ///
    /// Returns `false` (and leaves the solution untouched) if the variable is
    /// already bound to a different term.
    pub fn bind(&mut self, variable: &str, term: Term) -> bool {
        match self.bindings.get(variable) {
            Some(existing) => *existing == term,
            None => {
                self.bindings.insert(variable.to_owned(), term);
                true
            }
        }
    }

    /// Copy this solution and add one binding.
    ///
    /// Fails with [`EvaluationError::Rebind`] if `variable` is already bound.
    pub fn extend(&self, variable: &str, term: Term) -> Result<Self, EvaluationError> {
        if self.is_bound(variable) {
            return Err(EvaluationError::Rebind {
                variable: variable.to_owned(),
            });
        }
        let mut extended = self.clone();
        extended.bindings.insert(variable.to_owned(), term);
        Ok(extended)
    }

    /// Remove a binding, returning its value.
    pub fn remove(&mut self, variable: &str) -> Option<Term> {
        self.bindings.remove(variable)
    }

    /// Two solutions are compatible when every shared variable has the same value.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .bindings
            .iter()
            .all(|(name, value)| large.bindings.get(name).is_none_or(|v| v == value))
    }

    /// Whether the two solutions bind at least one common variable.
    #[must_use]
    pub fn shares_variable_with(&self, other: &Self) -> bool {
        self.bindings.keys().any(|name| other.bindings.contains_key(name))
    }

    /// Combine two solutions, or `None` if they disagree on a shared variable.
    #[must_use]
    pub fn join(&self, other: &Self) -> Option<Self> {
        if !self.is_compatible_with(other) {
            return None;
        }
        let mut merged = self.clone();
        merged.merge(other);
        Some(merged)
    }

    /// Copy bindings from `other` that this solution does not have yet.
    pub fn merge(&mut self, other: &Self) {
        for (name, value) in &other.bindings {
            if !self.bindings.contains_key(name) {
                self.bindings.insert(name.clone(), value.clone());
            }
        }
    }

    /// Keep only the listed variables.
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, variables: &[S]) -> Self {
        Self {
            bindings: variables
                .iter()
                .filter_map(|name| {
                    let name = name.as_ref();
                    self.bindings
                        .get(name)
                        .map(|value| (name.to_owned(), value.clone()))
                })
                .collect(),
        }
    }

    /// Drop all engine-generated temporary variables.
    pub fn trim_temporaries(&mut self) {
        self.bindings.retain(|name, _| !is_temporary_variable(name));
    }
}

impl<S: Into<String>> FromIterator<(S, Term)> for Solution {
    fn from_iter<I: IntoIterator<Item = (S, Term)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::iri(s)
    }

    #[test]
    fn test_serializes_as_binding_map() {
        let solution = Solution::from_pairs([("x", iri("a")), ("n", Term::integer(3))]);
        let json = serde_json::to_value(&solution).expect("serialize solution");
        assert_eq!(json["x"], serde_json::json!({ "Iri": "a" }));
        assert_eq!(json.as_object().map(serde_json::Map::len), Some(2));

        let restored: Solution = serde_json::from_value(json).expect("deserialize solution");
        assert_eq!(restored, solution);
        assert_eq!(restored.get("n").and_then(Term::as_i64), Some(3));
    }

    #[test]
    fn test_bind_and_get() {
        let mut solution = Solution::new();
        assert!(solution.is_empty());
        assert!(solution.bind("x", iri("a")));
        assert!(solution.bind("x", iri("a")));
        assert!(!solution.bind("x", iri("b")));
        assert_eq!(solution.get("x"), Some(&iri("a")));
        assert_eq!(solution.len(), 1);
    }

    #[test]
    fn test_extend_rejects_rebind() {
        let solution = Solution::from_pairs([("x", iri("a"))]);
        let extended = solution.extend("y", iri("b")).expect("y is free");
        assert_eq!(extended.len(), 2);
        assert_eq!(solution.len(), 1);
        assert_eq!(
            solution.extend("x", iri("c")),
            Err(EvaluationError::Rebind {
                variable: "x".to_string()
            })
        );
    }

    #[test]
    fn test_compatibility_and_join() {
        let a = Solution::from_pairs([("x", iri("a")), ("y", iri("b"))]);
        let b = Solution::from_pairs([("y", iri("b")), ("z", iri("c"))]);
        let c = Solution::from_pairs([("y", iri("other"))]);

        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
        assert!(a.is_compatible_with(&Solution::new()));

        let joined = a.join(&b).expect("compatible solutions join");
        assert_eq!(joined.len(), 3);
        assert!(a.join(&c).is_none());
    }

    #[test]
    fn test_shares_variable() {
        let a = Solution::from_pairs([("x", iri("a"))]);
        let b = Solution::from_pairs([("y", iri("a"))]);
        assert!(!a.shares_variable_with(&b));
        assert!(a.shares_variable_with(&a));
    }

    #[test]
    fn test_project_and_trim() {
        let mut solution = Solution::from_pairs([
            ("x", iri("a")),
            ("_:b0", iri("b")),
            ("y", iri("c")),
        ]);
        let projected = solution.project(&["x", "missing"]);
        assert_eq!(projected, Solution::from_pairs([("x", iri("a"))]));
        assert_eq!(projected.project(&["x", "missing"]), projected);

        solution.trim_temporaries();
        assert_eq!(solution.variables().collect::<Vec<_>>(), vec!["x", "y"]);
    }
}
