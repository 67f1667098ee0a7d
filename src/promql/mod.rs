//! PromQL back end
//!
//! Expression nodes for the subset of PromQL (plus the MetricsQL `or` filter
//! and `union`/`label_set` functions) that translated queries use.
//!
//! ```rust
//! use influxql2promql::promql::{Matcher, Matchers, MatchOp, VectorSelector};
//!
//! let matchers = Matchers::new(vec![Matcher::new(MatchOp::Re, "host", "web-.*").unwrap()]);
//! let vs = VectorSelector::new(Some("cpu_usage".to_string()), matchers);
//! assert_eq!(vs.to_string(), r#"cpu_usage{host=~"web-.*"}"#);
//! ```

mod ast;
mod duration;
mod error;

pub use ast::{
    quote_label_value, AggregateExpr, AggregateOp, Call, Expr, Function, MatchOp, Matcher,
    Matchers, MatrixSelector, NumberLiteral, StringLiteral, ValueType, VectorSelector,
    METRIC_NAME,
};
pub use duration::{format_duration, parse_duration};
pub use error::{DurationError, MatcherError};
