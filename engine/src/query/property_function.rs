//! Property functions ("magic properties").
//!
//! A triple pattern whose predicate names a registered function is evaluated
//! by that function instead of by pattern matching. The function receives the
//! child's multiset as its input bindings and returns a new multiset.
//!
//! Functions are looked up in the [`PropertyFunctionRegistry`] carried by the
//! query options; there is no process-wide registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::error::EvaluationError;
use super::multiset::Multiset;
use super::pattern::{PatternItem, TriplePattern};
use super::solution::Solution;
use crate::storage::{ActiveGraph, FactPool};
use crate::types::Term;

/// Predicate IRI of the built-in full-text match.
pub const TEXT_QUERY: &str = "http://jena.apache.org/text#query";

/// A property function use site: `(subject...) name (object...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFunctionCall {
    pub name: String,
    pub subject: Vec<PatternItem>,
    pub object: Vec<PatternItem>,
}

impl PropertyFunctionCall {
    #[must_use]
    pub fn new(name: impl Into<String>, subject: Vec<PatternItem>, object: Vec<PatternItem>) -> Self {
        Self {
            name: name.into(),
            subject,
            object,
        }
    }

    /// Variables on either side of the call.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .subject
            .iter()
            .chain(&self.object)
            .filter_map(PatternItem::variable_name)
        {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        names
    }
}

/// What a property function can read besides its input.
#[derive(Clone, Copy)]
pub struct PropertyFunctionContext<'a> {
    pub pool: &'a dyn FactPool,
    pub active_graph: &'a ActiveGraph,
}

/// A pluggable evaluator for a magic property.
pub trait PropertyFunction: fmt::Debug + Send + Sync {
    /// IRI the function is registered under.
    fn name(&self) -> &str;

    /// Variables the function may bind for `call`.
    fn variables(&self, call: &PropertyFunctionCall) -> Vec<String> {
        call.variables()
    }

    fn evaluate(
        &self,
        call: &PropertyFunctionCall,
        input: &Multiset,
        context: &PropertyFunctionContext<'_>,
    ) -> Result<Multiset, EvaluationError>;
}

/// Property functions available to a query.
#[derive(Debug, Clone, Default)]
pub struct PropertyFunctionRegistry {
    functions: HashMap<String, Arc<dyn PropertyFunction>>,
}

impl PropertyFunctionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in functions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(TextMatch);
        registry
    }

    /// Register a function, replacing any previous one of the same name.
    pub fn register(&mut self, function: impl PropertyFunction + 'static) {
        self.functions
            .insert(function.name().to_owned(), Arc::new(function));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PropertyFunction>> {
        self.functions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Case-insensitive substring search over literal objects.
///
/// `?s text:query "term"` binds `?s` to every subject having a literal object
/// that contains `term`. `(?s ?lit) text:query "term"` also binds `?lit` to
/// the matching literal. The search string may be a variable bound by the
/// input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMatch;

impl TextMatch {
    fn search_text(call: &PropertyFunctionCall, input: &Solution) -> Result<String, EvaluationError> {
        let failure = |message: &str| EvaluationError::PropertyFunction {
            name: call.name.clone(),
            message: message.to_owned(),
        };
        let item = call
            .object
            .first()
            .ok_or_else(|| failure("missing search string"))?;
        match item.resolve(Some(input)) {
            Some(Term::Literal(literal)) => Ok(literal.lexical().to_lowercase()),
            Some(_) => Err(failure("search string must be a literal")),
            None => Err(failure("search string is unbound")),
        }
    }
}

impl PropertyFunction for TextMatch {
    fn name(&self) -> &str {
        TEXT_QUERY
    }

    fn evaluate(
        &self,
        call: &PropertyFunctionCall,
        input: &Multiset,
        context: &PropertyFunctionContext<'_>,
    ) -> Result<Multiset, EvaluationError> {
        let subject = call.subject.first().ok_or_else(|| EvaluationError::PropertyFunction {
            name: call.name.clone(),
            message: "missing subject".to_owned(),
        })?;
        let matched = call.subject.get(1).and_then(PatternItem::variable_name);
        let scan = TriplePattern::new(
            subject.clone(),
            PatternItem::blank("text_predicate"),
            PatternItem::blank("text_object"),
        );

        let mut rows = Vec::new();
        for solution in input.solutions() {
            let needle = Self::search_text(call, solution)?;
            let mut seen = HashSet::new();
            for quad in context
                .pool
                .match_pattern(&scan, context.active_graph, Some(solution))
            {
                let Term::Literal(literal) = &quad.object else {
                    continue;
                };
                if !literal.lexical().to_lowercase().contains(&needle) {
                    continue;
                }
                let mut found = Solution::new();
                if let Some(name) = subject.variable_name() {
                    found.bind(name, quad.subject.clone());
                }
                if let Some(name) = matched {
                    found.bind(name, quad.object.clone());
                }
                if let Some(joined) = solution.join(&found) {
                    if seen.insert(joined.clone()) {
                        rows.push(joined);
                    }
                }
            }
        }

        tracing::debug!(rows = rows.len(), "text match");
        if rows.is_empty() {
            return Ok(Multiset::Null);
        }
        let mut variables = input.variables().to_vec();
        for name in self.variables(call) {
            if !variables.contains(&name) {
                variables.push(name);
            }
        }
        Ok(Multiset::with_variables(&variables, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TripleStore;
    use crate::types::Quad;

    fn store() -> TripleStore {
        let label = Term::iri("http://www.w3.org/2000/01/rdf-schema#label");
        [
            Quad::new(Term::iri("http://x/a"), label.clone(), Term::literal("Rust Programming")),
            Quad::new(Term::iri("http://x/b"), label.clone(), Term::literal("Gardening")),
            Quad::new(Term::iri("http://x/c"), label, Term::lang("rusty nails", "en")),
        ]
        .into_iter()
        .collect()
    }

    fn call(subject: Vec<PatternItem>, query: &str) -> PropertyFunctionCall {
        PropertyFunctionCall::new(TEXT_QUERY, subject, vec![PatternItem::Term(Term::literal(query))])
    }

    #[test]
    fn test_text_match_is_case_insensitive() {
        let store = store();
        let graph = ActiveGraph::Default;
        let context = PropertyFunctionContext {
            pool: &store,
            active_graph: &graph,
        };
        let out = TextMatch
            .evaluate(&call(vec![PatternItem::var("s")], "RUST"), &Multiset::Identity, &context)
            .expect("text match should succeed");
        let mut subjects: Vec<&Term> = out.solutions().iter().filter_map(|s| s.get("s")).collect();
        subjects.sort();
        assert_eq!(subjects, vec![&Term::iri("http://x/a"), &Term::iri("http://x/c")]);
    }

    #[test]
    fn test_text_match_binds_literal_and_joins_input() {
        let store = store();
        let graph = ActiveGraph::Default;
        let context = PropertyFunctionContext {
            pool: &store,
            active_graph: &graph,
        };
        let input = Multiset::from_solutions(vec![Solution::from_pairs([("s", Term::iri("http://x/c"))])]);
        let out = TextMatch
            .evaluate(
                &call(vec![PatternItem::var("s"), PatternItem::var("lit")], "rust"),
                &input,
                &context,
            )
            .expect("text match should succeed");
        assert_eq!(out.len(), 1);
        assert_eq!(out.solutions()[0].get("lit"), Some(&Term::lang("rusty nails", "en")));
        assert!(out.contains_variable("lit"));
    }

    #[test]
    fn test_text_match_without_hits_is_null() {
        let store = store();
        let graph = ActiveGraph::Default;
        let context = PropertyFunctionContext {
            pool: &store,
            active_graph: &graph,
        };
        let out = TextMatch
            .evaluate(&call(vec![PatternItem::var("s")], "cobol"), &Multiset::Identity, &context)
            .expect("text match should succeed");
        assert!(out.is_null());
    }

    #[test]
    fn test_unbound_search_string_fails() {
        let store = store();
        let graph = ActiveGraph::Default;
        let context = PropertyFunctionContext {
            pool: &store,
            active_graph: &graph,
        };
        let unbound = PropertyFunctionCall::new(TEXT_QUERY, vec![PatternItem::var("s")], vec![PatternItem::var("q")]);
        let err = TextMatch
            .evaluate(&unbound, &Multiset::Identity, &context)
            .expect_err("unbound search string should fail");
        assert!(matches!(err, EvaluationError::PropertyFunction { .. }));
    }

    #[test]
    fn test_registry_builtins() {
        let registry = PropertyFunctionRegistry::with_builtins();
        assert!(registry.contains(TEXT_QUERY));
        assert_eq!(registry.names(), vec![TEXT_QUERY]);
        assert!(PropertyFunctionRegistry::new().get(TEXT_QUERY).is_none());
    }
}
