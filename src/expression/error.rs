//! Error types for expression building and evaluation.

use crate::expression::ExpressionType;
use thiserror::Error;

/// Errors that can occur while building or evaluating an expression.
///
/// Everything except [`ExpressionError::Fatal`] is a user-facing error: a
/// malformed expression, an unknown name or a value that cannot be
/// converted. `Fatal` marks a broken invariant (for example asking a DOUBLE
/// evaluator for a string) and must never be turned into a missing value.
#[derive(Error, Debug, Clone)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    FunctionArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("Function {function} expects {expected} as argument {position}, got {actual}")]
    FunctionInputType {
        function: String,
        position: usize,
        expected: String,
        actual: ExpressionType,
    },

    #[error("Invalid input for function {function} (argument {position}): {message}")]
    FunctionInput {
        function: String,
        position: usize,
        message: String,
    },

    #[error("Function {function}: '{name}' is not a type constant")]
    InvalidTypeConstant { function: String, name: String },

    #[error("Function {function} requires a constant value as argument {position}")]
    NonConstantArgument { function: String, position: usize },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Unknown macro: {name}")]
    UnknownMacro { name: String },

    #[error("Function {function} could not resolve attribute '{name}': {source}")]
    AttributeEvaluation {
        function: String,
        name: String,
        #[source]
        source: Box<ExpressionError>,
    },

    #[error("Function {function} failed to evaluate '{expression}': {source}")]
    SubexpressionEvaluation {
        function: String,
        expression: String,
        #[source]
        source: Box<ExpressionError>,
    },

    #[error("Function {function}: value of type {actual} does not match requested type {expected}")]
    TypeNotMatching {
        function: String,
        expected: ExpressionType,
        actual: ExpressionType,
    },

    #[error("Expression evaluation was stopped")]
    Cancelled,

    #[error("Internal expression error: {0}")]
    Fatal(String),
}

impl ExpressionError {
    /// Whether this error reports a broken invariant rather than a problem
    /// with the expression or the data it reads.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExpressionError::Fatal(_) => true,
            ExpressionError::AttributeEvaluation { source, .. }
            | ExpressionError::SubexpressionEvaluation { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    pub(crate) fn input(function: &str, position: usize, message: impl Into<String>) -> Self {
        ExpressionError::FunctionInput {
            function: function.to_string(),
            position,
            message: message.into(),
        }
    }

    pub(crate) fn input_type(
        function: &str,
        position: usize,
        expected: impl Into<String>,
        actual: ExpressionType,
    ) -> Self {
        ExpressionError::FunctionInputType {
            function: function.to_string(),
            position,
            expected: expected.into(),
            actual,
        }
    }
}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExpressionError::FunctionArgumentCount {
            function: "lag".to_string(),
            expected: "2 to 3".to_string(),
            actual: 1,
        };
        assert_eq!(err.to_string(), "Function lag expects 2 to 3 arguments, got 1");

        let err = ExpressionError::input_type("finite", 1, "INTEGER or DOUBLE", ExpressionType::String);
        assert_eq!(
            err.to_string(),
            "Function finite expects INTEGER or DOUBLE as argument 1, got STRING"
        );

        let err = ExpressionError::TypeNotMatching {
            function: "lead".to_string(),
            expected: ExpressionType::Boolean,
            actual: ExpressionType::Instant,
        };
        assert_eq!(
            err.to_string(),
            "Function lead: value of type INSTANT does not match requested type BOOLEAN"
        );

        let err = ExpressionError::UnknownMacro {
            name: "run".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown macro: run");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ExpressionError::Fatal("wrong accessor".to_string()).is_fatal());
        assert!(!ExpressionError::Cancelled.is_fatal());

        let wrapped = ExpressionError::SubexpressionEvaluation {
            function: "eval".to_string(),
            expression: "x".to_string(),
            source: Box::new(ExpressionError::Fatal("broken".to_string())),
        };
        assert!(wrapped.is_fatal());

        let wrapped = ExpressionError::AttributeEvaluation {
            function: "attribute".to_string(),
            name: "y".to_string(),
            source: Box::new(ExpressionError::UnknownVariable {
                name: "y".to_string(),
            }),
        };
        assert!(!wrapped.is_fatal());
    }
}
