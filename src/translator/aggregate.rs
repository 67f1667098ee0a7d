//! Aggregate chain resolution
//!
//! `abs(mean(x))` resolves to the chain `["abs", "mean"]`: the first name is
//! the outermost function of the translated expression.

use crate::influxql::{Expr, Field};
use crate::promql::{Function, ValueType};

use super::error::{TranslateError, TranslateResult};
use super::metric::single_field;

/// How an InfluxQL aggregate maps onto a PromQL function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateMapping {
    /// InfluxQL function name
    pub influx: &'static str,
    /// PromQL/MetricsQL function name
    pub promql: &'static str,
    /// Argument kind the PromQL function takes
    pub arg_type: ValueType,
    /// Merges series, so it cannot be applied across different fields
    pub cross_series: bool,
}

const fn mapping(
    influx: &'static str,
    promql: &'static str,
    arg_type: ValueType,
    cross_series: bool,
) -> AggregateMapping {
    AggregateMapping {
        influx,
        promql,
        arg_type,
        cross_series,
    }
}

/// Supported aggregates
pub const AGGREGATE_MAPPINGS: &[AggregateMapping] = &[
    mapping("abs", "abs", ValueType::Vector, false),
    mapping("sum", "sum", ValueType::Vector, true),
    mapping("mean", "avg_over_time", ValueType::Matrix, false),
    mapping("last", "last_over_time", ValueType::Matrix, false),
    mapping("count", "count", ValueType::Matrix, true),
    mapping("stddev", "stddev_over_time", ValueType::Matrix, false),
    mapping("median", "median_over_time", ValueType::Matrix, false),
    mapping("max", "max_over_time", ValueType::Matrix, false),
    mapping("min", "min_over_time", ValueType::Matrix, false),
    mapping("mode", "mode_over_time", ValueType::Matrix, false),
    mapping("integral", "integrate", ValueType::Matrix, false),
    mapping("distinct", "distinct", ValueType::Matrix, true),
];

/// Look up the mapping for an InfluxQL aggregate name
pub fn lookup_aggregate(name: &str) -> TranslateResult<&'static AggregateMapping> {
    AGGREGATE_MAPPINGS
        .iter()
        .find(|m| m.influx == name)
        .ok_or_else(|| TranslateError::UnknownAggregate(name.to_string()))
}

impl AggregateMapping {
    /// The PromQL function signature
    pub fn function(&self) -> Function {
        Function::new(self.promql, vec![self.arg_type], ValueType::Vector)
    }
}

/// Resolve the aggregate chain of a statement's only field
///
/// A bare field reference yields an empty chain.
pub fn resolve_aggregate_chain(fields: &[Field], max_depth: usize) -> TranslateResult<Vec<String>> {
    let field = single_field(fields)?;
    let chain = field_aggregate_chain(&field.expr, max_depth)?;
    tracing::debug!(chain = ?chain, "resolved aggregate chain");
    Ok(chain)
}

pub(crate) fn field_aggregate_chain(expr: &Expr, max_depth: usize) -> TranslateResult<Vec<String>> {
    let mut chain = Vec::new();
    let mut current = expr;

    while let Expr::Call { name, args } = current {
        if chain.len() >= max_depth {
            return Err(TranslateError::DepthLimitExceeded { limit: max_depth });
        }
        let [arg] = args.as_slice() else {
            return Err(TranslateError::Arity {
                name: name.clone(),
                expected: 1,
                found: args.len(),
            });
        };
        chain.push(name.clone());
        current = arg;
    }

    Ok(chain)
}
