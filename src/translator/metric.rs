//! Metric name resolution
//!
//! A field `f` of measurement `m` is stored in Prometheus as the metric
//! `m_f`. Selecting `*` selects every metric with the `m_` prefix.

use crate::influxql::{Expr, Field, Source};

use super::error::{TranslateError, TranslateResult};

/// The metric a statement reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricName {
    /// `measurement_field`, or just the measurement when `wildcard` is set
    pub name: String,
    /// The field was `*`: select all fields of the measurement
    pub wildcard: bool,
}

impl MetricName {
    /// Regex over `__name__` that selects every field of the measurement
    pub fn wildcard_pattern(&self) -> String {
        format!("^{}_.*", self.name)
    }
}

/// Resolve the metric name from a statement's only source and only field
pub fn resolve_metric_name(
    sources: &[Source],
    fields: &[Field],
    max_depth: usize,
) -> TranslateResult<MetricName> {
    let measurement = measurement_name(sources)?;
    let field = single_field(fields)?;

    let metric = field_metric_name(measurement, &field.expr, max_depth)?;
    tracing::debug!(metric = %metric.name, wildcard = metric.wildcard, "resolved metric name");
    Ok(metric)
}

/// The name of the statement's single plain measurement
pub(crate) fn measurement_name(sources: &[Source]) -> TranslateResult<&str> {
    let [source] = sources else {
        return Err(TranslateError::Shape(format!(
            "expected exactly one source, found {}",
            sources.len()
        )));
    };

    match source {
        Source::Measurement(m) if m.regex.is_none() && !m.name.is_empty() => Ok(&m.name),
        other => Err(TranslateError::Shape(format!(
            "source must be a named measurement, found {}",
            other
        ))),
    }
}

pub(crate) fn single_field(fields: &[Field]) -> TranslateResult<&Field> {
    match fields {
        [field] => Ok(field),
        _ => Err(TranslateError::Shape(format!(
            "expected exactly one field, found {}",
            fields.len()
        ))),
    }
}

/// Unwrap calls around `expr` down to the referenced field
pub(crate) fn field_metric_name(
    measurement: &str,
    expr: &Expr,
    max_depth: usize,
) -> TranslateResult<MetricName> {
    let mut current = expr;
    let mut depth = 0;

    loop {
        match current {
            Expr::VarRef(field) => {
                return Ok(MetricName {
                    name: format!("{}_{}", measurement, field),
                    wildcard: false,
                })
            }
            Expr::Wildcard => {
                return Ok(MetricName {
                    name: measurement.to_string(),
                    wildcard: true,
                })
            }
            Expr::Call { name, args } => {
                depth += 1;
                if depth > max_depth {
                    return Err(TranslateError::DepthLimitExceeded { limit: max_depth });
                }
                let [arg] = args.as_slice() else {
                    return Err(TranslateError::Arity {
                        name: name.clone(),
                        expected: 1,
                        found: args.len(),
                    });
                };
                current = arg;
            }
            other => return Err(TranslateError::UnsupportedField(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::{parse_statement, Measurement, SelectStatement};

    fn select(query: &str) -> SelectStatement {
        parse_statement(query).unwrap().as_select().clone()
    }

    fn resolve(query: &str) -> TranslateResult<MetricName> {
        let stmt = select(query);
        resolve_metric_name(&stmt.sources, &stmt.fields, 64)
    }

    #[test]
    fn test_plain_and_nested_fields() {
        let metric = resolve("SELECT free FROM disk").unwrap();
        assert_eq!(metric.name, "disk_free");
        assert!(!metric.wildcard);

        let metric = resolve("SELECT abs(mean(bps_recv)) FROM vm_netio").unwrap();
        assert_eq!(metric.name, "vm_netio_bps_recv");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let stmt = select(r#"SELECT mean("in") FROM "swap""#);
        let first = resolve_metric_name(&stmt.sources, &stmt.fields, 64).unwrap();
        let second = resolve_metric_name(&stmt.sources, &stmt.fields, 64).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "swap_in");
    }

    #[test]
    fn test_wildcard() {
        let metric = resolve("SELECT last(*) FROM mem").unwrap();
        assert_eq!(metric.name, "mem");
        assert!(metric.wildcard);
        assert_eq!(metric.wildcard_pattern(), "^mem_.*");
    }

    #[test]
    fn test_shape_errors() {
        assert!(matches!(
            resolve("SELECT a, b FROM m"),
            Err(TranslateError::Shape(_))
        ));
        assert!(matches!(
            resolve("SELECT a FROM m1, m2"),
            Err(TranslateError::Shape(_))
        ));
        assert!(matches!(
            resolve("SELECT a FROM /cpu.*/"),
            Err(TranslateError::Shape(_))
        ));
        assert!(matches!(
            resolve("SELECT a FROM (SELECT b FROM m)"),
            Err(TranslateError::Shape(_))
        ));
    }

    #[test]
    fn test_qualified_measurement_uses_name() {
        let metric = resolve(r#"SELECT free FROM "telegraf"."autogen"."disk""#).unwrap();
        assert_eq!(metric.name, "disk_free");
    }

    #[test]
    fn test_unsupported_fields() {
        assert!(matches!(
            resolve("SELECT a + 1 FROM m"),
            Err(TranslateError::UnsupportedField(_))
        ));
        assert!(matches!(
            resolve("SELECT mean('x') FROM m"),
            Err(TranslateError::UnsupportedField(_))
        ));
        assert!(matches!(
            resolve("SELECT percentile(a, 95) FROM m"),
            Err(TranslateError::Arity { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let sources = vec![Source::Measurement(Measurement {
            name: "m".to_string(),
            ..Default::default()
        })];
        let mut expr = Expr::var("x");
        for _ in 0..10 {
            expr = Expr::call("abs", vec![expr]);
        }
        let fields = vec![Field::new(expr)];
        assert!(resolve_metric_name(&sources, &fields, 10).is_ok());
        assert_eq!(
            resolve_metric_name(&sources, &fields, 9),
            Err(TranslateError::DepthLimitExceeded { limit: 9 })
        );
    }
}
