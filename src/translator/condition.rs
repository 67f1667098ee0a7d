//! WHERE clause translation
//!
//! Each `tag <op> 'value'` leaf becomes one label matcher. The boolean tree is
//! normalised to disjunctive normal form: every AND-conjunction becomes a
//! matcher group and groups are joined with the MetricsQL `or` filter. An
//! AND-only tree yields a single group in traversal order.

use crate::influxql::{BinaryOp, Expr};
use crate::promql::{MatchOp, Matcher, Matchers};

use super::error::{TranslateError, TranslateResult};

/// Bounds on the work condition translation may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionLimits {
    /// Maximum depth of the boolean tree
    pub max_depth: usize,
    /// Maximum number of OR groups after distribution
    pub max_or_groups: usize,
}

impl Default for ConditionLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_or_groups: 64,
        }
    }
}

/// Translate a (time-free) condition into label matchers
///
/// An absent condition yields no matchers.
pub fn translate_condition(
    cond: Option<&Expr>,
    limits: &ConditionLimits,
) -> TranslateResult<Matchers> {
    let Some(cond) = cond else {
        return Ok(Matchers::empty());
    };

    let groups = disjunction(cond, 0, limits)?;
    let matchers = Matchers::with_groups(groups);
    tracing::debug!(
        groups = matchers.groups.len(),
        matchers = matchers.len(),
        "translated condition"
    );
    Ok(matchers)
}

fn disjunction(
    expr: &Expr,
    depth: usize,
    limits: &ConditionLimits,
) -> TranslateResult<Vec<Vec<Matcher>>> {
    if depth >= limits.max_depth {
        return Err(TranslateError::DepthLimitExceeded {
            limit: limits.max_depth,
        });
    }

    match expr {
        Expr::Paren(inner) => disjunction(inner, depth + 1, limits),
        Expr::Binary {
            op: BinaryOp::Or, ..
        } => {
            let mut groups = Vec::new();
            for operand in chain_operands(expr, BinaryOp::Or) {
                let operand = disjunction(operand, depth + 1, limits)?;
                check_group_count(groups.len() + operand.len(), expr, limits)?;
                groups.extend(operand);
            }
            Ok(groups)
        }
        Expr::Binary {
            op: BinaryOp::And, ..
        } => {
            let mut groups = vec![Vec::new()];
            for operand in chain_operands(expr, BinaryOp::And) {
                let operand = disjunction(operand, depth + 1, limits)?;
                check_group_count(groups.len().saturating_mul(operand.len()), expr, limits)?;

                let mut product = Vec::with_capacity(groups.len() * operand.len());
                for left in &groups {
                    for right in &operand {
                        let mut group = Vec::with_capacity(left.len() + right.len());
                        group.extend(left.iter().cloned());
                        group.extend(right.iter().cloned());
                        product.push(group);
                    }
                }
                groups = product;
            }
            Ok(groups)
        }
        Expr::Binary { op, lhs, rhs } => Ok(vec![vec![leaf_matcher(*op, lhs, rhs, expr)?]]),
        other => Err(TranslateError::UnsupportedCondition(other.to_string())),
    }
}

/// Operands of a run of `op`, left to right, walked without recursion so a
/// flat chain costs one level of depth
fn chain_operands(expr: &Expr, op: BinaryOp) -> Vec<&Expr> {
    let mut operands = Vec::new();
    let mut pending = vec![expr];
    while let Some(next) = pending.pop() {
        match next {
            Expr::Binary { op: o, lhs, rhs } if *o == op => {
                pending.push(rhs);
                pending.push(lhs);
            }
            other => operands.push(other),
        }
    }
    operands
}

fn check_group_count(count: usize, expr: &Expr, limits: &ConditionLimits) -> TranslateResult<()> {
    if count > limits.max_or_groups {
        return Err(TranslateError::UnsupportedCondition(format!(
            "{} expands to {} OR groups (limit {})",
            expr, count, limits.max_or_groups
        )));
    }
    Ok(())
}

fn leaf_matcher(op: BinaryOp, lhs: &Expr, rhs: &Expr, leaf: &Expr) -> TranslateResult<Matcher> {
    let match_op = match op {
        BinaryOp::Eq => MatchOp::Equal,
        BinaryOp::NotEq => MatchOp::NotEqual,
        BinaryOp::EqRegex => MatchOp::Re,
        BinaryOp::NotEqRegex => MatchOp::NotRe,
        other => return Err(TranslateError::UnsupportedOperator(other.to_string())),
    };

    let Expr::VarRef(key) = lhs else {
        return Err(TranslateError::UnsupportedCondition(leaf.to_string()));
    };
    let value = match rhs {
        Expr::StringLit(s) | Expr::RegexLit(s) => s,
        _ => return Err(TranslateError::UnsupportedCondition(leaf.to_string())),
    };

    Ok(Matcher::new(match_op, key.as_str(), value.as_str())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::parse_expr;

    fn translate(cond: &str) -> TranslateResult<Matchers> {
        translate_condition(Some(&parse_expr(cond).unwrap()), &ConditionLimits::default())
    }

    fn m(op: MatchOp, name: &str, value: &str) -> Matcher {
        Matcher::new(op, name, value).unwrap()
    }

    #[test]
    fn test_absent_condition() {
        let matchers = translate_condition(None, &ConditionLimits::default()).unwrap();
        assert!(matchers.is_empty());
    }

    #[test]
    fn test_and_keeps_traversal_order() {
        let matchers = translate("a = 'x' AND b =~ /y/").unwrap();
        assert_eq!(
            matchers.groups,
            vec![vec![m(MatchOp::Equal, "a", "x"), m(MatchOp::Re, "b", "y")]]
        );

        let matchers = translate("z != 'x' AND a !~ /y/").unwrap();
        assert_eq!(
            matchers.groups,
            vec![vec![m(MatchOp::NotEqual, "z", "x"), m(MatchOp::NotRe, "a", "y")]]
        );
    }

    #[test]
    fn test_or_groups() {
        let matchers = translate("a = 'x' OR b = 'y'").unwrap();
        assert_eq!(matchers.to_string(), r#"a="x" or b="y""#);

        let matchers = translate("a = 'x' AND b = 'y' OR c = 'z'").unwrap();
        assert_eq!(matchers.to_string(), r#"a="x",b="y" or c="z""#);
    }

    #[test]
    fn test_and_distributes_over_or() {
        let matchers = translate("a = '1' AND (b = '2' OR c = '3')").unwrap();
        assert_eq!(matchers.to_string(), r#"a="1",b="2" or a="1",c="3""#);
    }

    #[test]
    fn test_group_limit() {
        let limits = ConditionLimits {
            max_depth: 64,
            max_or_groups: 3,
        };
        let cond = parse_expr("(a = '1' OR a = '2') AND (b = '1' OR b = '2')").unwrap();
        assert!(matches!(
            translate_condition(Some(&cond), &limits),
            Err(TranslateError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let limits = ConditionLimits {
            max_depth: 2,
            max_or_groups: 64,
        };
        let cond = parse_expr("((a = '1'))").unwrap();
        assert_eq!(
            translate_condition(Some(&cond), &limits),
            Err(TranslateError::DepthLimitExceeded { limit: 2 })
        );
    }

    #[test]
    fn test_flat_chains_count_as_one_level() {
        let chain = |terms: usize, op: &str| {
            (0..terms)
                .map(|i| format!("a{} = 'v'", i))
                .collect::<Vec<_>>()
                .join(op)
        };

        let matchers = translate(&chain(65, " AND ")).unwrap();
        assert_eq!(matchers.groups.len(), 1);
        assert_eq!(matchers.len(), 65);
        assert_eq!(matchers.groups[0][64], m(MatchOp::Equal, "a64", "v"));

        let matchers = translate(&chain(64, " OR ")).unwrap();
        assert_eq!(matchers.groups.len(), 64);

        // Alternating operators still nest
        let limits = ConditionLimits {
            max_depth: 4,
            max_or_groups: 64,
        };
        let cond = parse_expr("a = '1' AND b = '2' AND (c = '3' OR d = '4' OR e = '5')").unwrap();
        assert!(translate_condition(Some(&cond), &limits).is_ok());
        let cond = parse_expr("a = '1' AND (c = '3' OR (d = '4' AND e = '5'))").unwrap();
        assert_eq!(
            translate_condition(Some(&cond), &limits),
            Err(TranslateError::DepthLimitExceeded { limit: 4 })
        );
    }

    #[test]
    fn test_unsupported_operators() {
        assert_eq!(
            translate("a > 'x'"),
            Err(TranslateError::UnsupportedOperator(">".to_string()))
        );
        assert!(matches!(
            translate("a = 'x' AND b <= 'y'"),
            Err(TranslateError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_malformed_leaves() {
        assert!(matches!(
            translate("'x' = a"),
            Err(TranslateError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            translate("a = 5"),
            Err(TranslateError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            translate("a = b"),
            Err(TranslateError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            translate("host"),
            Err(TranslateError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            translate("a =~ /(oops/"),
            Err(TranslateError::InvalidMatcher(_))
        ));
    }
}
