//! Error types for query evaluation.
//!
//! Two layers:
//! - [`ExpressionError`] is recoverable and scoped to one solution. The
//!   operator that evaluated the expression decides whether to swallow it.
//! - [`EvaluationError`] aborts the current query.

use std::fmt;

/// A recoverable failure while evaluating an expression for one solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// A variable referenced by the expression is not bound.
    UnboundVariable(String),
    /// An operand has the wrong kind of term.
    TypeError(String),
    /// Division by zero in numeric arithmetic.
    DivisionByZero,
    /// A function received an argument it cannot handle.
    InvalidArgument(String),
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundVariable(name) => write!(f, "variable ?{name} is unbound"),
            Self::TypeError(message) => write!(f, "type error: {message}"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
        }
    }
}

impl std::error::Error for ExpressionError {}

/// A failure that aborts evaluation of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// An assignment tried to bind a variable that is already bound or declared.
    Rebind { variable: String },
    /// The query ran past its deadline.
    Timeout { elapsed_ms: u64, limit_ms: u64 },
    /// The query was cancelled by its caller.
    Cancelled,
    /// An expression error surfaced because filters were configured to fail loudly.
    Expression(ExpressionError),
    /// No handler is registered for a property function.
    UnknownPropertyFunction(String),
    /// A property function handler failed.
    PropertyFunction { name: String, message: String },
    /// The algebra tree is structurally invalid.
    Malformed(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rebind { variable } => {
                write!(f, "cannot assign to ?{variable}: it is already bound")
            }
            Self::Timeout {
                elapsed_ms,
                limit_ms,
            } => write!(
                f,
                "query timed out after {elapsed_ms}ms (limit {limit_ms}ms)"
            ),
            Self::Cancelled => write!(f, "query was cancelled"),
            Self::Expression(error) => write!(f, "expression evaluation failed: {error}"),
            Self::UnknownPropertyFunction(name) => {
                write!(f, "no handler registered for property function <{name}>")
            }
            Self::PropertyFunction { name, message } => {
                write!(f, "property function <{name}> failed: {message}")
            }
            Self::Malformed(message) => write!(f, "malformed algebra: {message}"),
        }
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Expression(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ExpressionError> for EvaluationError {
    fn from(error: ExpressionError) -> Self {
        Self::Expression(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let rebind = EvaluationError::Rebind {
            variable: "x".to_string(),
        };
        assert_eq!(rebind.to_string(), "cannot assign to ?x: it is already bound");

        let timeout = EvaluationError::Timeout {
            elapsed_ms: 12,
            limit_ms: 10,
        };
        assert_eq!(timeout.to_string(), "query timed out after 12ms (limit 10ms)");
    }

    #[test]
    fn test_expression_error_is_source() {
        let error = EvaluationError::from(ExpressionError::DivisionByZero);
        let source = error.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("division by zero"));
    }
}
