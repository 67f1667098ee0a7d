//! Translation error types
//!
//! Every failure names the first construct that could not be translated. No
//! partial output is produced alongside an error.

use thiserror::Error;

use crate::influxql::{ParseError, TimeConditionError};
use crate::promql::{DurationError, MatcherError};

/// Errors that can occur while translating a statement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    /// Wrong number or kind of sources or fields
    #[error("Unsupported statement shape: {0}")]
    Shape(String),

    /// A field that is neither a reference nor a call
    #[error("Unsupported field expression: {0}")]
    UnsupportedField(String),

    /// A GROUP BY dimension other than a tag, `*` or `time(...)`
    #[error("Unsupported GROUP BY dimension: {0}")]
    UnsupportedDimension(String),

    /// A comparison operator with no label matcher counterpart
    #[error("Unsupported operator in condition: {0}")]
    UnsupportedOperator(String),

    /// A condition leaf that is not `tag <op> 'literal'`
    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),

    /// A function called with the wrong number of arguments
    #[error("Function {name}() expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// The time bounds in the WHERE clause could not be evaluated
    #[error("Invalid time range: {0}")]
    TimeRange(#[from] TimeConditionError),

    /// A window that is not a valid duration
    #[error("Invalid window '{input}': {source}")]
    DurationParse {
        input: String,
        #[source]
        source: DurationError,
    },

    /// GROUP BY tags without an aggregate function
    #[error("GROUP BY {0:?} requires an aggregate function")]
    GroupWithoutAggregate(Vec<String>),

    /// An aggregate function with no PromQL mapping
    #[error("Unknown aggregate function: {0}()")]
    UnknownAggregate(String),

    /// A cross-series aggregate applied to every field of a measurement
    #[error("Aggregate {function}() cannot be applied to all fields of '{measurement}'")]
    WildcardFieldNotAggregable {
        function: String,
        measurement: String,
    },

    /// A label matcher that failed validation
    #[error("Invalid label matcher: {0}")]
    InvalidMatcher(#[from] MatcherError),

    /// Input nested deeper than the configured limit
    #[error("Expression nesting exceeds depth limit {limit}")]
    DepthLimitExceeded { limit: usize },

    /// Query text with other than exactly one statement
    #[error("Expected exactly one statement, found {0}")]
    StatementCount(usize),

    /// Query text that could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for translation operations
pub type TranslateResult<T> = Result<T, TranslateError>;
