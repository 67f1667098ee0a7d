//! InfluxQL front end
//!
//! Parses the SELECT subset of InfluxQL that the translator understands:
//!
//! - **AST**: statement, source, field, expression and dimension nodes
//! - **Parser**: turn query text into the AST
//! - **Time**: pull `time` bounds out of a WHERE clause
//!
//! # Query Language
//!
//! ```text
//! SELECT field [AS alias] [, field ...]
//! FROM [db.rp.]measurement | /regex/ | (subquery)
//! [WHERE tag = 'value' AND tag =~ /re/ AND time > now() - 1h]
//! [GROUP BY time(5m), tag [, tag ...] | *] [fill(none)]
//! ```
//!
//! # Example
//!
//! ```rust
//! use influxql2promql::influxql::{parse_statement, Expr};
//!
//! let stmt = parse_statement("SELECT mean(usage) FROM cpu GROUP BY host").unwrap();
//! let select = stmt.as_select();
//! assert_eq!(select.fields[0].expr, Expr::call("mean", vec![Expr::var("usage")]));
//! ```

mod ast;
mod error;
mod parser;
mod time;

pub use ast::{
    format_duration, BinaryOp, Dimension, Expr, Field, Fill, Measurement, Query, SelectStatement,
    Source, Statement,
};
pub use error::{ParseError, ParseResult, TimeConditionError};
pub use parser::{
    is_reserved, parse_expr, parse_query, parse_statement, MAX_EXPR_DEPTH, MAX_NESTING_DEPTH,
};
pub use time::{condition_time_bounds, NowValuer, TimeBounds};
