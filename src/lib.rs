//! # influxql2promql
//!
//! Translates InfluxQL `SELECT` statements into PromQL (with MetricsQL
//! extensions), returning the expression text and any absolute time range
//! lifted out of the WHERE clause.
//!
//! ## Translation rules
//!
//! - **Metric names**: field `f` of measurement `m` is the metric `m_f`;
//!   `SELECT *` selects `{__name__=~"^m_.*"}`
//! - **Aggregates**: `mean` → `avg_over_time`, `last` → `last_over_time`,
//!   `integral` → `integrate`, ... applied to a range selector
//! - **Conditions**: tag comparisons become label matchers; OR becomes the
//!   MetricsQL `or` filter
//! - **Grouping**: `GROUP BY time(w), tags` sets the range to `w` and wraps
//!   the result in `avg by(tags) (...)`
//!
//! ## Modules
//!
//! - [`influxql`]: InfluxQL AST, parser and time-bound evaluation
//! - [`promql`]: PromQL expression tree and rendering
//! - [`translator`]: the translation engine
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use influxql2promql::translate;
//!
//! let promql = translate(r#"SELECT free FROM "disk" WHERE host = 'h1' AND path = '/opt'"#).unwrap();
//! assert_eq!(promql, r#"disk_free{host="h1",path="/opt"}"#);
//! ```

pub mod config;
pub mod influxql;
pub mod promql;
pub mod translator;

pub use translator::{
    translate, translate_with_time_range, TimeRange, TranslateError, TranslateResult, Translation,
    Translator, TranslatorOptions,
};
