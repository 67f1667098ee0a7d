//! PromQL construction errors

use thiserror::Error;

/// Errors raised while building a label matcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    /// Label names may not be empty
    #[error("Label matcher has an empty label name")]
    EmptyName,

    /// The value of a `=~` or `!~` matcher does not compile
    #[error("Invalid regex '{pattern}' in label matcher: {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// Errors raised while parsing a Prometheus duration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("Empty duration string")]
    Empty,

    #[error("Not a valid duration string: '{0}'")]
    Invalid(String),

    #[error("Duration out of range: '{0}'")]
    Overflow(String),
}
