//! InfluxQL error types
//!
//! Errors raised while parsing query text and while evaluating time bounds in
//! a WHERE clause.

use thiserror::Error;

/// Errors that can occur while parsing InfluxQL text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing but whitespace was given
    #[error("Empty query")]
    Empty,

    /// The grammar did not match
    #[error("Syntax error at offset {offset} near '{near}'")]
    Syntax { offset: usize, near: String },

    /// A statement parsed but text remained after it
    #[error("Unexpected input after statement: '{0}'")]
    TrailingInput(String),

    /// A statement other than SELECT
    #[error("Unsupported statement: {0} (only SELECT is supported)")]
    UnsupportedStatement(String),

    /// `parse_statement` was given zero or several statements
    #[error("Expected exactly one statement, found {0}")]
    StatementCount(usize),

    /// Parentheses nested deeper than the parser accepts
    #[error("Expression nesting depth {depth} exceeds limit {limit}")]
    NestingTooDeep { depth: usize, limit: usize },
}

/// Errors raised while extracting time bounds from a condition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeConditionError {
    /// `time` compared with an operator that does not describe a bound
    #[error("Invalid time comparison operator: {0}")]
    InvalidOperator(String),

    /// `time` used inside an OR, which cannot be expressed as one range
    #[error("Cannot use OR with time conditions: {0}")]
    OrWithTime(String),

    /// The right-hand side of a time comparison is not a time value
    #[error("Invalid time value: {0}")]
    InvalidValue(String),

    /// A string literal that is neither RFC3339 nor `YYYY-MM-DD[ HH:MM:SS]`
    #[error("Unable to parse time string '{0}'")]
    InvalidTimeString(String),

    /// Arithmetic left the representable range of instants
    #[error("Time value out of range: {0}")]
    OutOfRange(String),

    /// The condition tree nests deeper than the evaluator walks
    #[error("Condition nesting exceeds depth limit {limit}")]
    TooDeep { limit: usize },
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::UnsupportedStatement("SHOW".to_string());
        assert_eq!(
            err.to_string(),
            "Unsupported statement: SHOW (only SELECT is supported)"
        );

        let err = TimeConditionError::InvalidOperator("!=".to_string());
        assert_eq!(err.to_string(), "Invalid time comparison operator: !=");
    }
}
