//! Expression assembly
//!
//! Builds the PromQL tree from the resolved pieces:
//!
//! ```text
//! avg by(tags) ( f1( f2( metric{matchers}[window] ) ) )
//! ```

use crate::promql::{
    parse_duration, AggregateExpr, AggregateOp, Call, Expr, Function, MatchOp, Matcher, Matchers,
    MatrixSelector, StringLiteral, ValueType, VectorSelector, METRIC_NAME,
};

use super::aggregate::lookup_aggregate;
use super::error::{TranslateError, TranslateResult};
use super::group::Grouping;
use super::metric::MetricName;

/// Label `label_set` attaches to each member of a multi-field union
pub const UNION_RESULT_LABEL: &str = "__union_result__";

/// Assemble one field's expression
///
/// `chain` is outermost first. Without a chain the result is an instant
/// selector; with one it is applied to a range selector over the GROUP BY
/// window, or `default_window` when none was given.
pub fn assemble(
    metric: &MetricName,
    mut matchers: Matchers,
    chain: &[String],
    grouping: &Grouping,
    default_window: &str,
) -> TranslateResult<Expr> {
    let name = if metric.wildcard {
        matchers.append(Matcher::new(
            MatchOp::Re,
            METRIC_NAME,
            metric.wildcard_pattern(),
        )?);
        None
    } else {
        matchers.append(Matcher::metric_name(metric.name.as_str()));
        Some(metric.name.clone())
    };
    let selector = VectorSelector::new(name, matchers);

    let mut expr: Expr = if chain.is_empty() {
        if !grouping.tags.is_empty() {
            return Err(TranslateError::GroupWithoutAggregate(grouping.tags.clone()));
        }
        selector.into()
    } else {
        let window = grouping.window.as_deref().unwrap_or(default_window);
        let range = parse_duration(window).map_err(|source| TranslateError::DurationParse {
            input: window.to_string(),
            source,
        })?;
        tracing::debug!(window = window, "using lookbehind window");
        MatrixSelector::new(selector, range).into()
    };

    for op in chain.iter().rev() {
        let mapping = lookup_aggregate(op)?;
        if metric.wildcard && mapping.cross_series {
            return Err(TranslateError::WildcardFieldNotAggregable {
                function: op.clone(),
                measurement: metric.name.clone(),
            });
        }
        expr = Call::new(mapping.function(), vec![expr]).into();
    }

    if !grouping.tags.is_empty() && !grouping.wildcard {
        expr = AggregateExpr::new(AggregateOp::Avg, grouping.tags.clone(), expr).into();
    }

    Ok(expr)
}

/// Combine per-field expressions into
/// `union(label_set(expr, "__union_result__", "label"), ...)`
pub fn assemble_union(parts: Vec<(String, Expr)>) -> Expr {
    let label_set = Function::new(
        "label_set",
        vec![ValueType::Vector, ValueType::String, ValueType::String],
        ValueType::Vector,
    );

    let args: Vec<Expr> = parts
        .into_iter()
        .map(|(label, expr)| {
            Call::new(
                label_set.clone(),
                vec![
                    expr,
                    Expr::StringLiteral(StringLiteral::new(UNION_RESULT_LABEL)),
                    Expr::StringLiteral(StringLiteral::new(label)),
                ],
            )
            .into()
        })
        .collect();

    let union = Function::new("union", vec![ValueType::Vector; args.len()], ValueType::Vector);
    Call::new(union, args).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str) -> MetricName {
        MetricName {
            name: name.to_string(),
            wildcard: false,
        }
    }

    fn chain(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn grouping(window: Option<&str>, tags: &[&str], wildcard: bool) -> Grouping {
        Grouping {
            window: window.map(str::to_string),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            wildcard,
        }
    }

    fn host_re() -> Matchers {
        Matchers::new(vec![Matcher::new(MatchOp::Re, "host", "re").unwrap()])
    }

    #[test]
    fn test_bare_selector() {
        let expr = assemble(&metric("disk_free"), Matchers::empty(), &[], &Grouping::default(), "1m")
            .unwrap();
        assert_eq!(expr.to_string(), "disk_free");
        assert_eq!(expr.value_type(), ValueType::Vector);
    }

    #[test]
    fn test_default_window() {
        let expr = assemble(&metric("cpu_usage"), Matchers::empty(), &chain(&["mean"]), &Grouping::default(), "1m")
            .unwrap();
        assert_eq!(expr.to_string(), "avg_over_time(cpu_usage[1m])");
    }

    #[test]
    fn test_grouped_average() {
        let expr = assemble(
            &metric("swap_in"),
            host_re(),
            &chain(&["mean"]),
            &grouping(Some("2d"), &["host"], false),
            "1m",
        )
        .unwrap();
        assert_eq!(
            expr.to_string(),
            r#"avg by(host) (avg_over_time(swap_in{host=~"re"}[2d]))"#
        );
    }

    #[test]
    fn test_chain_nesting() {
        let expr = assemble(
            &metric("vm_netio_bps_recv"),
            Matchers::empty(),
            &chain(&["abs", "mean"]),
            &grouping(Some("1w"), &["vm_name", "vm_id"], false),
            "1m",
        )
        .unwrap();
        assert_eq!(
            expr.to_string(),
            "avg by(vm_name, vm_id) (abs(avg_over_time(vm_netio_bps_recv[1w])))"
        );
    }

    #[test]
    fn test_group_wildcard_skips_wrap() {
        let expr = assemble(
            &metric("cpu_usage"),
            Matchers::empty(),
            &chain(&["count"]),
            &grouping(Some("2m"), &["host"], true),
            "1m",
        )
        .unwrap();
        assert_eq!(expr.to_string(), "count(cpu_usage[2m])");
    }

    #[test]
    fn test_wildcard_field() {
        let mem = MetricName {
            name: "mem".to_string(),
            wildcard: true,
        };
        let expr = assemble(&mem, Matchers::empty(), &chain(&["last"]), &Grouping::default(), "1m")
            .unwrap();
        assert_eq!(expr.to_string(), r#"last_over_time({__name__=~"^mem_.*"}[1m])"#);

        let expr = assemble(&mem, Matchers::empty(), &[], &Grouping::default(), "1m").unwrap();
        assert_eq!(expr.to_string(), r#"{__name__=~"^mem_.*"}"#);

        assert!(matches!(
            assemble(&mem, Matchers::empty(), &chain(&["sum"]), &Grouping::default(), "1m"),
            Err(TranslateError::WildcardFieldNotAggregable { .. })
        ));
    }

    #[test]
    fn test_or_groups_each_get_name() {
        let matchers = Matchers::with_groups(vec![
            vec![Matcher::new(MatchOp::Equal, "a", "x").unwrap()],
            vec![Matcher::new(MatchOp::Equal, "b", "y").unwrap()],
        ]);
        let expr = assemble(&metric("m_f"), matchers, &[], &Grouping::default(), "1m").unwrap();
        assert_eq!(expr.to_string(), r#"m_f{a="x" or b="y"}"#);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            assemble(&metric("m_f"), Matchers::empty(), &[], &grouping(None, &["host"], false), "1m"),
            Err(TranslateError::GroupWithoutAggregate(vec!["host".to_string()]))
        );
        assert!(matches!(
            assemble(&metric("m_f"), Matchers::empty(), &chain(&["mean"]), &grouping(Some("5x"), &[], false), "1m"),
            Err(TranslateError::DurationParse { .. })
        ));
        assert_eq!(
            assemble(&metric("m_f"), Matchers::empty(), &chain(&["spread"]), &Grouping::default(), "1m"),
            Err(TranslateError::UnknownAggregate("spread".to_string()))
        );
    }

    #[test]
    fn test_union() {
        let sum = assemble(&metric("disk_free"), Matchers::empty(), &chain(&["sum"]), &Grouping::default(), "1m")
            .unwrap();
        let mean = assemble(&metric("disk_used"), Matchers::empty(), &chain(&["mean"]), &Grouping::default(), "1m")
            .unwrap();
        let expr = assemble_union(vec![
            ("sum_disk_free".to_string(), sum),
            ("mean_disk_used".to_string(), mean),
        ]);
        assert_eq!(
            expr.to_string(),
            concat!(
                r#"union(label_set(sum(disk_free[1m]), "__union_result__", "sum_disk_free"), "#,
                r#"label_set(avg_over_time(disk_used[1m]), "__union_result__", "mean_disk_used"))"#
            )
        );
    }
}
