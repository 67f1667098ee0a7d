//! InfluxQL to PromQL translation
//!
//! A statement is translated in stages:
//!
//! - **metric**: `SELECT f FROM m` reads the metric `m_f`
//! - **aggregate**: nested calls become a chain of PromQL functions
//! - **time_range**: `time` comparisons are lifted out of the WHERE clause
//! - **condition**: the remaining WHERE clause becomes label matchers
//! - **group**: GROUP BY yields the window, the tags and the `*` flag
//! - **assemble**: the pieces are combined into one PromQL expression
//!
//! # Example
//!
//! ```rust
//! use influxql2promql::translator::translate;
//!
//! let promql = translate(r#"SELECT mean("in") FROM "swap" WHERE host =~ /re/ GROUP BY time(2d), host"#)
//!     .unwrap();
//! assert_eq!(promql, r#"avg by(host) (avg_over_time(swap_in{host=~"re"}[2d]))"#);
//! ```

mod aggregate;
mod assemble;
mod condition;
mod error;
mod group;
mod metric;
mod time_range;

pub use aggregate::{lookup_aggregate, resolve_aggregate_chain, AggregateMapping, AGGREGATE_MAPPINGS};
pub use assemble::{assemble, assemble_union, UNION_RESULT_LABEL};
pub use condition::{translate_condition, ConditionLimits};
pub use error::{TranslateError, TranslateResult};
pub use group::{resolve_group, Grouping};
pub use metric::{resolve_metric_name, MetricName};
pub use time_range::{extract_time_range, TimeRange};

use chrono::{DateTime, Utc};

use crate::influxql::{parse_query, Expr, SelectStatement, Statement};
use crate::promql;

/// Translator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorOptions {
    /// Range used for aggregates when GROUP BY has no `time(...)`
    pub default_window: String,
    /// Maximum nesting of field calls and condition trees
    pub max_depth: usize,
    /// Maximum number of OR groups a condition may expand to
    pub max_or_groups: usize,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            default_window: "1m".to_string(),
            max_depth: 64,
            max_or_groups: 64,
        }
    }
}

/// A translated statement
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// The PromQL expression tree
    pub expr: promql::Expr,
    /// `expr` rendered as text
    pub query: String,
    /// Time range lifted from the WHERE clause
    pub time_range: Option<TimeRange>,
}

/// Translates InfluxQL statements into PromQL
#[derive(Debug, Clone, Default)]
pub struct Translator {
    options: TranslatorOptions,
}

impl Translator {
    pub fn new(options: TranslatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TranslatorOptions {
        &self.options
    }

    /// Translate a statement, evaluating `now()` as the current time
    pub fn translate(&self, stmt: &Statement) -> TranslateResult<Translation> {
        self.translate_at(stmt, Utc::now())
    }

    /// Translate a statement, evaluating `now()` as `now`
    pub fn translate_at(&self, stmt: &Statement, now: DateTime<Utc>) -> TranslateResult<Translation> {
        let select = stmt.as_select();

        let (expr, time_range) = if select.fields.len() > 1 {
            self.translate_union(select, now)?
        } else {
            self.translate_single(select, now)?
        };

        let query = expr.to_string();
        tracing::debug!(promql = %query, "translated statement");
        Ok(Translation {
            expr,
            query,
            time_range,
        })
    }

    /// Parse and translate query text holding exactly one statement
    pub fn translate_str(&self, input: &str) -> TranslateResult<Translation> {
        self.translate_str_at(input, Utc::now())
    }

    pub fn translate_str_at(&self, input: &str, now: DateTime<Utc>) -> TranslateResult<Translation> {
        let query = parse_query(input)?;
        let [stmt] = query.statements.as_slice() else {
            return Err(TranslateError::StatementCount(query.statements.len()));
        };
        self.translate_at(stmt, now)
    }

    fn condition_limits(&self) -> ConditionLimits {
        ConditionLimits {
            max_depth: self.options.max_depth,
            max_or_groups: self.options.max_or_groups,
        }
    }

    /// Strip time bounds, then translate what is left of the WHERE clause
    fn matchers(
        &self,
        select: &SelectStatement,
        now: DateTime<Utc>,
    ) -> TranslateResult<(promql::Matchers, Option<TimeRange>)> {
        let (residual, time_range) = extract_time_range(select.condition.as_ref(), now)?;
        let matchers = translate_condition(residual.as_ref(), &self.condition_limits())?;
        Ok((matchers, time_range))
    }

    fn translate_single(
        &self,
        select: &SelectStatement,
        now: DateTime<Utc>,
    ) -> TranslateResult<(promql::Expr, Option<TimeRange>)> {
        let max_depth = self.options.max_depth;
        let metric = resolve_metric_name(&select.sources, &select.fields, max_depth)?;
        let chain = resolve_aggregate_chain(&select.fields, max_depth)?;
        let (matchers, time_range) = self.matchers(select, now)?;
        let grouping = resolve_group(&select.dimensions)?;

        let expr = assemble(
            &metric,
            matchers,
            &chain,
            &grouping,
            &self.options.default_window,
        )?;
        Ok((expr, time_range))
    }

    /// Several aggregated fields of one measurement, each labelled by
    /// `<chain>_<metric>` and combined with `union`
    fn translate_union(
        &self,
        select: &SelectStatement,
        now: DateTime<Utc>,
    ) -> TranslateResult<(promql::Expr, Option<TimeRange>)> {
        let max_depth = self.options.max_depth;
        let measurement = metric::measurement_name(&select.sources)?;

        let mut fields = Vec::with_capacity(select.fields.len());
        for field in &select.fields {
            if !matches!(field.expr, Expr::Call { .. }) {
                return Err(TranslateError::Shape(format!(
                    "every field of a multi-field query must be an aggregate, found {}",
                    field.expr
                )));
            }
            let metric = metric::field_metric_name(measurement, &field.expr, max_depth)?;
            if metric.wildcard {
                return Err(TranslateError::Shape(format!(
                    "wildcard field {} cannot be combined with other fields",
                    field.expr
                )));
            }
            let chain = aggregate::field_aggregate_chain(&field.expr, max_depth)?;
            fields.push((metric, chain));
        }

        let (matchers, time_range) = self.matchers(select, now)?;
        let grouping = resolve_group(&select.dimensions)?;

        let mut parts = Vec::with_capacity(fields.len());
        for (metric, chain) in fields {
            let expr = assemble(
                &metric,
                matchers.clone(),
                &chain,
                &grouping,
                &self.options.default_window,
            )?;
            parts.push((format!("{}_{}", chain.join("_"), metric.name), expr));
        }

        tracing::debug!(fields = parts.len(), "translating fields as a union");
        Ok((assemble_union(parts), time_range))
    }
}

/// Translate query text with default options
pub fn translate(input: &str) -> TranslateResult<String> {
    Translator::default().translate_str(input).map(|t| t.query)
}

/// Translate query text with default options, also returning the time range
pub fn translate_with_time_range(input: &str) -> TranslateResult<(String, Option<TimeRange>)> {
    Translator::default()
        .translate_str(input)
        .map(|t| (t.query, t.time_range))
}
