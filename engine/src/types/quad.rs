//! Stored facts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Term;

/// A subject/predicate/object fact, optionally in a named graph.
///
/// `graph == None` places the fact in the default graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Option<Term>,
}

impl Quad {
    /// A fact in the default graph.
    #[must_use]
    pub const fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    /// A fact in the named graph `graph`.
    #[must_use]
    pub const fn in_graph(subject: Term, predicate: Term, object: Term, graph: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: Some(graph),
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " {graph}")?;
        }
        write!(f, " .")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Literal;

    #[test]
    fn test_display_default_and_named() {
        let quad = Quad::new(Term::iri("s"), Term::iri("p"), Term::literal("o"));
        assert_eq!(quad.to_string(), "<s> <p> \"o\" .");
        let named = Quad::in_graph(Term::iri("s"), Term::iri("p"), Term::iri("o"), Term::iri("g"));
        assert_eq!(named.to_string(), "<s> <p> <o> <g> .");
    }

    #[test]
    fn test_json_keeps_graph_and_literal_tags() {
        let quad = Quad::in_graph(
            Term::blank("b0"),
            Term::iri("p"),
            Term::lang("chat", "fr"),
            Term::iri("g"),
        );
        let json = serde_json::to_string(&quad).expect("serialize quad");
        let restored: Quad = serde_json::from_str(&json).expect("deserialize quad");
        assert_eq!(restored, quad);
        assert_eq!(restored.object.as_literal().and_then(Literal::language), Some("fr"));

        let default_graph = Quad::new(Term::iri("s"), Term::iri("p"), Term::integer(1));
        let json = serde_json::to_value(&default_graph).expect("serialize quad");
        assert!(json["graph"].is_null());
    }
}
