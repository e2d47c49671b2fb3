//! Graph terms: IRIs, literals, blank nodes and variables.
//!
//! Terms are normalized at construction so that structural equality is term
//! equality: an `xsd:string` datatype is dropped (a plain literal and an
//! explicit `xsd:string` literal are the same term) and language tags are
//! lower-cased. Numeric literals that denote the same value but differ in
//! lexical form or datatype (`"1"^^xsd:integer` vs `"1.0"^^xsd:decimal`)
//! remain distinct terms.
//!
//! # Ordering
//!
//! The derived total order ranks kinds as
//! `BlankNode < Literal < Iri < Variable`, then compares contents. It is used
//! by the index trees. Value-aware ordering for ORDER BY and MIN/MAX is
//! [`compare_for_ordering`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known XML Schema datatype IRIs.
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";

    /// Datatypes whose lexical forms parse as numbers.
    pub const NUMERIC: [&str; 6] = [INTEGER, LONG, INT, DECIMAL, DOUBLE, FLOAT];

    /// Datatypes holding whole numbers.
    pub const INTEGRAL: [&str; 3] = [INTEGER, LONG, INT];
}

/// A literal value with optional datatype or language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    datatype: Option<String>,
    language: Option<String>,
}

impl Literal {
    /// A plain literal.
    #[must_use]
    pub fn simple(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        }
    }

    /// A datatyped literal. `xsd:string` collapses to a plain literal.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Self {
            lexical: lexical.into(),
            datatype: (datatype != xsd::STRING).then_some(datatype),
            language: None,
        }
    }

    /// A language-tagged literal. The tag is stored lower-cased.
    #[must_use]
    pub fn with_language(lexical: impl Into<String>, language: &str) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.to_ascii_lowercase()),
        }
    }

    #[must_use]
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    #[must_use]
    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Whether this literal has a numeric datatype.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.datatype
            .as_deref()
            .is_some_and(|dt| xsd::NUMERIC.contains(&dt))
    }

    /// Whether this literal is a plain or language-tagged string.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        self.datatype.is_none()
    }

    /// Numeric value, if the datatype is numeric and the lexical form parses.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        if !self.is_numeric() {
            return None;
        }
        self.lexical.trim().parse::<f64>().ok()
    }

    /// Integer value for integral datatypes.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        let datatype = self.datatype.as_deref()?;
        if !xsd::INTEGRAL.contains(&datatype) {
            return None;
        }
        self.lexical.trim().parse::<i64>().ok()
    }

    /// Boolean value for `xsd:boolean` literals.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if self.datatype.as_deref() != Some(xsd::BOOLEAN) {
            return None;
        }
        match self.lexical.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

/// A graph term.
///
/// Variant order defines the cross-kind total order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    BlankNode(String),
    Literal(Literal),
    Iri(String),
    Variable(String),
}

impl Term {
    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    #[must_use]
    pub fn blank(id: impl Into<String>) -> Self {
        Self::BlankNode(id.into())
    }

    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// A plain string literal.
    #[must_use]
    pub fn literal(lexical: impl Into<String>) -> Self {
        Self::Literal(Literal::simple(lexical))
    }

    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal::typed(lexical, datatype))
    }

    #[must_use]
    pub fn lang(lexical: impl Into<String>, language: &str) -> Self {
        Self::Literal(Literal::with_language(lexical, language))
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), xsd::INTEGER)
    }

    #[must_use]
    pub fn double(value: f64) -> Self {
        Self::typed(format_double(value), xsd::DOUBLE)
    }

    #[must_use]
    pub fn decimal(value: f64) -> Self {
        Self::typed(format_double(value), xsd::DECIMAL)
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::typed(if value { "true" } else { "false" }, xsd::BOOLEAN)
    }

    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_iri(&self) -> bool {
        matches!(self, Self::Iri(_))
    }

    #[must_use]
    pub const fn is_blank(&self) -> bool {
        matches!(self, Self::BlankNode(_))
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.as_literal().is_some_and(Literal::is_numeric)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_literal().and_then(Literal::as_f64)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_literal().and_then(Literal::as_i64)
    }

    /// Effective boolean value.
    ///
    /// Booleans are themselves, numerics are true when non-zero and not NaN,
    /// strings are true when non-empty. Anything else has no EBV.
    #[must_use]
    pub fn effective_boolean_value(&self) -> Option<bool> {
        let literal = self.as_literal()?;
        if let Some(value) = literal.as_bool() {
            return Some(value);
        }
        if literal.is_numeric() {
            return literal.as_f64().map(|n| n != 0.0 && !n.is_nan());
        }
        if literal.is_string() {
            return Some(!literal.lexical().is_empty());
        }
        None
    }

    /// String form used by `STR()` and text matching.
    #[must_use]
    pub fn lexical_form(&self) -> &str {
        match self {
            Self::BlankNode(id) | Self::Iri(id) | Self::Variable(id) => id,
            Self::Literal(literal) => literal.lexical(),
        }
    }
}

fn format_double(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Order two possibly-unbound values for sorting.
///
/// Unbound sorts first, numerics compare by value, everything else by the
/// term order.
#[must_use]
pub fn compare_for_ordering(a: Option<&Term>, b: Option<&Term>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(m), Some(n)) => m.partial_cmp(&n).unwrap_or_else(|| x.cmp(y)),
            _ => x.cmp(y),
        },
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.lexical.replace('"', "\\\""))?;
        if let Some(language) = &self.language {
            write!(f, "@{language}")
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^<{datatype}>")
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankNode(id) => write!(f, "_:{id}"),
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Variable(name) => write!(f, "?{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xsd_string_is_plain_literal() {
        assert_eq!(Term::typed("a", xsd::STRING), Term::literal("a"));
    }

    #[test]
    fn test_language_tags_are_case_insensitive() {
        assert_eq!(Term::lang("chat", "FR"), Term::lang("chat", "fr"));
        assert_ne!(Term::lang("chat", "fr"), Term::literal("chat"));
    }

    #[test]
    fn test_numeric_lexical_forms_stay_distinct() {
        let one = Term::integer(1);
        let one_decimal = Term::typed("1.0", xsd::DECIMAL);
        assert_ne!(one, one_decimal);
        assert_eq!(
            compare_for_ordering(Some(&one), Some(&one_decimal)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_kind_order() {
        let blank = Term::blank("b");
        let literal = Term::literal("z");
        let iri = Term::iri("http://a");
        let variable = Term::variable("a");
        assert!(blank < literal);
        assert!(literal < iri);
        assert!(iri < variable);
    }

    #[test]
    fn test_effective_boolean_value() {
        assert_eq!(Term::boolean(true).effective_boolean_value(), Some(true));
        assert_eq!(Term::integer(0).effective_boolean_value(), Some(false));
        assert_eq!(Term::double(2.5).effective_boolean_value(), Some(true));
        assert_eq!(Term::literal("").effective_boolean_value(), Some(false));
        assert_eq!(Term::iri("http://a").effective_boolean_value(), None);
    }

    #[test]
    fn test_unbound_sorts_first() {
        let two = Term::integer(2);
        let ten = Term::integer(10);
        assert_eq!(compare_for_ordering(None, Some(&two)), Ordering::Less);
        assert_eq!(compare_for_ordering(Some(&two), Some(&ten)), Ordering::Less);
    }

    #[test]
    fn test_display() {
        assert_eq!(Term::iri("http://x").to_string(), "<http://x>");
        assert_eq!(Term::lang("hi", "en").to_string(), "\"hi\"@en");
        assert_eq!(
            Term::integer(3).to_string(),
            format!("\"3\"^^<{}>", xsd::INTEGER)
        );
        assert_eq!(Term::double(2.0).lexical_form(), "2.0");
    }
}
