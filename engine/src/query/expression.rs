//! Expression evaluation over a single solution.
//!
//! [`Expression`] is the pluggable contract; [`Expr`] is the built-in
//! expression tree and also wraps custom implementations. Evaluation returns a
//! term or a recoverable [`ExpressionError`]; callers decide whether the error
//! drops the solution, leaves a variable unbound, or propagates.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::error::ExpressionError;
use super::solution::Solution;
use crate::storage::ActiveGraph;
use crate::types::{Term, xsd};

/// What an expression can see besides the solution itself.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionContext<'a> {
    pub active_graph: &'a ActiveGraph,
}

impl<'a> ExpressionContext<'a> {
    #[must_use]
    pub const fn new(active_graph: &'a ActiveGraph) -> Self {
        Self { active_graph }
    }
}

/// A function from a solution to a term.
pub trait Expression: fmt::Debug + Send + Sync {
    fn evaluate(
        &self,
        solution: &Solution,
        context: &ExpressionContext<'_>,
    ) -> Result<Term, ExpressionError>;

    /// Variables the expression reads.
    fn variables(&self) -> Vec<String>;

    /// Evaluate and reduce to an effective boolean value.
    fn evaluate_boolean(
        &self,
        solution: &Solution,
        context: &ExpressionContext<'_>,
    ) -> Result<bool, ExpressionError> {
        let term = self.evaluate(solution, context)?;
        term.effective_boolean_value()
            .ok_or_else(|| ExpressionError::TypeError(format!("{term} has no boolean value")))
    }
}

/// Built-in expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Variable(String),
    Constant(Term),
    Bound(String),
    Equal(Box<Expr>, Box<Expr>),
    NotEqual(Box<Expr>, Box<Expr>),
    Less(Box<Expr>, Box<Expr>),
    LessOrEqual(Box<Expr>, Box<Expr>),
    Greater(Box<Expr>, Box<Expr>),
    GreaterOrEqual(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Str(Box<Expr>),
    IsIri(Box<Expr>),
    IsLiteral(Box<Expr>),
    IsBlank(Box<Expr>),
    /// Substring test on string literals.
    Contains(Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// First argument that evaluates without error.
    Coalesce(Vec<Expr>),
    Custom(Arc<dyn Expression>),
}

impl Expr {
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    #[must_use]
    pub const fn constant(term: Term) -> Self {
        Self::Constant(term)
    }

    #[must_use]
    pub fn equal(left: Self, right: Self) -> Self {
        Self::Equal(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn less(left: Self, right: Self) -> Self {
        Self::Less(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn greater(left: Self, right: Self) -> Self {
        Self::Greater(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn plus(left: Self, right: Self) -> Self {
        Self::Add(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn quotient(left: Self, right: Self) -> Self {
        Self::Divide(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    #[must_use]
    pub fn str(inner: Self) -> Self {
        Self::Str(Box::new(inner))
    }

    #[must_use]
    pub fn custom(expression: impl Expression + 'static) -> Self {
        Self::Custom(Arc::new(expression))
    }

    /// Name of the variable when the expression is a bare variable.
    #[must_use]
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Self::Variable(name) | Self::Bound(name) => push_name(out, name),
            Self::Constant(_) => {}
            Self::Custom(custom) => {
                for name in custom.variables() {
                    push_name(out, &name);
                }
            }
            Self::Not(inner)
            | Self::Str(inner)
            | Self::IsIri(inner)
            | Self::IsLiteral(inner)
            | Self::IsBlank(inner) => inner.collect_variables(out),
            Self::Equal(a, b)
            | Self::NotEqual(a, b)
            | Self::Less(a, b)
            | Self::LessOrEqual(a, b)
            | Self::Greater(a, b)
            | Self::GreaterOrEqual(a, b)
            | Self::And(a, b)
            | Self::Or(a, b)
            | Self::Add(a, b)
            | Self::Subtract(a, b)
            | Self::Multiply(a, b)
            | Self::Divide(a, b)
            | Self::Contains(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Self::If(c, a, b) => {
                c.collect_variables(out);
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Self::Coalesce(items) => {
                for item in items {
                    item.collect_variables(out);
                }
            }
        }
    }
}

fn push_name(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|n| n == name) {
        out.push(name.to_owned());
    }
}

#[derive(Clone, Copy)]
enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

fn numeric_operand(term: &Term) -> Result<f64, ExpressionError> {
    term.as_f64()
        .ok_or_else(|| ExpressionError::TypeError(format!("{term} is not numeric")))
}

fn is_integral(term: &Term) -> bool {
    term.as_literal()
        .and_then(|literal| literal.datatype())
        .is_some_and(|dt| xsd::INTEGRAL.contains(&dt))
}

fn uses_double(term: &Term) -> bool {
    term.as_literal()
        .and_then(|literal| literal.datatype())
        .is_some_and(|dt| dt == xsd::DOUBLE || dt == xsd::FLOAT)
}

#[allow(clippy::cast_possible_truncation)] // Integral operands came from i64 lexical forms
fn arithmetic(op: Arithmetic, left: &Term, right: &Term) -> Result<Term, ExpressionError> {
    let a = numeric_operand(left)?;
    let b = numeric_operand(right)?;
    if matches!(op, Arithmetic::Divide) && b == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    let value = match op {
        Arithmetic::Add => a + b,
        Arithmetic::Subtract => a - b,
        Arithmetic::Multiply => a * b,
        Arithmetic::Divide => a / b,
    };
    if !matches!(op, Arithmetic::Divide) && is_integral(left) && is_integral(right) {
        return Ok(Term::integer(value as i64));
    }
    if uses_double(left) || uses_double(right) {
        Ok(Term::double(value))
    } else {
        Ok(Term::decimal(value))
    }
}

/// Value comparison used by `<`, `>`, `<=` and `>=`.
fn compare_values(left: &Term, right: &Term) -> Result<Ordering, ExpressionError> {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| ExpressionError::TypeError("NaN is not comparable".to_string()));
    }
    match (left.as_literal(), right.as_literal()) {
        (Some(a), Some(b)) if a.is_string() && b.is_string() => Ok(a.lexical().cmp(b.lexical())),
        (Some(a), Some(b)) if a.datatype().is_some() && a.datatype() == b.datatype() => {
            Ok(a.lexical().cmp(b.lexical()))
        }
        _ => Err(ExpressionError::TypeError(format!(
            "cannot compare {left} with {right}"
        ))),
    }
}

/// RDF term equality, with numerics compared by value.
fn terms_equal(left: &Term, right: &Term) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn string_operand(term: &Term) -> Result<&str, ExpressionError> {
    match term.as_literal() {
        Some(literal) if literal.is_string() => Ok(literal.lexical()),
        _ => Err(ExpressionError::TypeError(format!("{term} is not a string literal"))),
    }
}

impl Expression for Expr {
    fn evaluate(
        &self,
        solution: &Solution,
        context: &ExpressionContext<'_>,
    ) -> Result<Term, ExpressionError> {
        let eval = |e: &Self| e.evaluate(solution, context);
        let truth = |e: &Self| e.evaluate_boolean(solution, context);
        match self {
            Self::Variable(name) => solution
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnboundVariable(name.clone())),
            Self::Constant(term) => Ok(term.clone()),
            Self::Bound(name) => Ok(Term::boolean(solution.is_bound(name))),
            Self::Equal(a, b) => Ok(Term::boolean(terms_equal(&eval(a)?, &eval(b)?))),
            Self::NotEqual(a, b) => Ok(Term::boolean(!terms_equal(&eval(a)?, &eval(b)?))),
            Self::Less(a, b) => Ok(Term::boolean(compare_values(&eval(a)?, &eval(b)?)?.is_lt())),
            Self::LessOrEqual(a, b) => {
                Ok(Term::boolean(compare_values(&eval(a)?, &eval(b)?)?.is_le()))
            }
            Self::Greater(a, b) => Ok(Term::boolean(compare_values(&eval(a)?, &eval(b)?)?.is_gt())),
            Self::GreaterOrEqual(a, b) => {
                Ok(Term::boolean(compare_values(&eval(a)?, &eval(b)?)?.is_ge()))
            }
            // Three-valued logic: a definite answer from either side wins over an error.
            Self::And(a, b) => match (truth(a), truth(b)) {
                (Ok(false), _) | (_, Ok(false)) => Ok(Term::boolean(false)),
                (Ok(true), Ok(true)) => Ok(Term::boolean(true)),
                (Err(error), _) | (_, Err(error)) => Err(error),
            },
            Self::Or(a, b) => match (truth(a), truth(b)) {
                (Ok(true), _) | (_, Ok(true)) => Ok(Term::boolean(true)),
                (Ok(false), Ok(false)) => Ok(Term::boolean(false)),
                (Err(error), _) | (_, Err(error)) => Err(error),
            },
            Self::Not(inner) => Ok(Term::boolean(!truth(inner)?)),
            Self::Add(a, b) => arithmetic(Arithmetic::Add, &eval(a)?, &eval(b)?),
            Self::Subtract(a, b) => arithmetic(Arithmetic::Subtract, &eval(a)?, &eval(b)?),
            Self::Multiply(a, b) => arithmetic(Arithmetic::Multiply, &eval(a)?, &eval(b)?),
            Self::Divide(a, b) => arithmetic(Arithmetic::Divide, &eval(a)?, &eval(b)?),
            Self::Str(inner) => match eval(inner)? {
                Term::Iri(iri) => Ok(Term::literal(iri)),
                Term::Literal(literal) => Ok(Term::literal(literal.lexical())),
                other => Err(ExpressionError::TypeError(format!("STR is undefined for {other}"))),
            },
            Self::IsIri(inner) => Ok(Term::boolean(eval(inner)?.is_iri())),
            Self::IsLiteral(inner) => Ok(Term::boolean(eval(inner)?.is_literal())),
            Self::IsBlank(inner) => Ok(Term::boolean(eval(inner)?.is_blank())),
            Self::Contains(haystack, needle) => {
                let haystack = eval(haystack)?;
                let needle = eval(needle)?;
                Ok(Term::boolean(
                    string_operand(&haystack)?.contains(string_operand(&needle)?),
                ))
            }
            Self::If(condition, then, otherwise) => {
                if truth(condition)? {
                    eval(then)
                } else {
                    eval(otherwise)
                }
            }
            Self::Coalesce(items) => items
                .iter()
                .find_map(|item| eval(item).ok())
                .ok_or_else(|| {
                    ExpressionError::InvalidArgument("COALESCE had no error-free argument".to_string())
                }),
            Self::Custom(custom) => custom.evaluate(solution, context),
        }
    }

    fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Expr, solution: &Solution) -> Result<Term, ExpressionError> {
        expr.evaluate(solution, &ExpressionContext::new(&ActiveGraph::Default))
    }

    fn row() -> Solution {
        Solution::from_pairs([
            ("n", Term::integer(4)),
            ("d", Term::double(0.5)),
            ("s", Term::literal("hello world")),
            ("i", Term::iri("http://example.org/a")),
        ])
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let result = eval(&Expr::var("missing"), &row());
        assert_eq!(result, Err(ExpressionError::UnboundVariable("missing".to_string())));
        assert_eq!(eval(&Expr::Bound("missing".to_string()), &row()), Ok(Term::boolean(false)));
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        let sum = Expr::plus(Expr::var("n"), Expr::constant(Term::integer(3)));
        assert_eq!(eval(&sum, &row()), Ok(Term::integer(7)));
        let mixed = Expr::plus(Expr::var("n"), Expr::var("d"));
        assert_eq!(eval(&mixed, &row()), Ok(Term::double(4.5)));
    }

    #[test]
    fn test_division_by_zero() {
        let division = Expr::quotient(Expr::var("n"), Expr::constant(Term::integer(0)));
        assert_eq!(eval(&division, &row()), Err(ExpressionError::DivisionByZero));
    }

    #[test]
    fn test_comparisons() {
        let lt = Expr::less(Expr::var("d"), Expr::var("n"));
        assert_eq!(eval(&lt, &row()), Ok(Term::boolean(true)));
        let bad = Expr::less(Expr::var("i"), Expr::var("n"));
        assert!(matches!(eval(&bad, &row()), Err(ExpressionError::TypeError(_))));
        let eq = Expr::equal(Expr::var("n"), Expr::constant(Term::decimal(4.0)));
        assert_eq!(eval(&eq, &row()), Ok(Term::boolean(true)));
    }

    #[test]
    fn test_three_valued_logic() {
        let error = Expr::var("missing");
        let yes = Expr::constant(Term::boolean(true));
        let no = Expr::constant(Term::boolean(false));
        assert_eq!(
            eval(&Expr::and(error.clone(), no.clone()), &row()),
            Ok(Term::boolean(false))
        );
        assert!(eval(&Expr::and(error.clone(), yes.clone()), &row()).is_err());
        assert_eq!(eval(&Expr::or(error, yes), &row()), Ok(Term::boolean(true)));
        assert_eq!(eval(&Expr::negate(no), &row()), Ok(Term::boolean(true)));
    }

    #[test]
    fn test_string_functions() {
        let contains = Expr::Contains(
            Box::new(Expr::var("s")),
            Box::new(Expr::constant(Term::literal("world"))),
        );
        assert_eq!(eval(&contains, &row()), Ok(Term::boolean(true)));
        assert_eq!(
            eval(&Expr::str(Expr::var("i")), &row()),
            Ok(Term::literal("http://example.org/a"))
        );
    }

    #[test]
    fn test_coalesce_and_variables() {
        let expr = Expr::Coalesce(vec![Expr::var("missing"), Expr::var("n")]);
        assert_eq!(eval(&expr, &row()), Ok(Term::integer(4)));
        assert_eq!(expr.variables(), vec!["missing".to_string(), "n".to_string()]);
    }
}
