//! Time condition evaluation
//!
//! Splits `time <op> value` comparisons out of a WHERE clause and evaluates
//! them against a fixed "now" into a pair of optional bounds.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::influxql::ast::{BinaryOp, Expr};
use crate::influxql::error::TimeConditionError;
use crate::influxql::parser::MAX_EXPR_DEPTH;

/// Supplies the instant `now()` evaluates to
#[derive(Debug, Clone, Copy)]
pub struct NowValuer {
    pub now: DateTime<Utc>,
}

impl NowValuer {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// Lower and upper time bounds; `None` leaves that side open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBounds {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl TimeBounds {
    /// True when neither side is bounded
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// The overlap of two bounds: the later minimum and the earlier maximum
    pub fn intersect(self, other: TimeBounds) -> TimeBounds {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        TimeBounds { min, max }
    }
}

/// Remove time comparisons from `cond`, returning what is left of the
/// condition (if anything) and the bounds the removed comparisons describe.
///
/// Trees deeper than [`MAX_EXPR_DEPTH`] fail with `TooDeep`.
pub fn condition_time_bounds(
    cond: &Expr,
    valuer: &NowValuer,
) -> Result<(Option<Expr>, TimeBounds), TimeConditionError> {
    split_time(cond, valuer, 0)
}

fn check_depth(depth: usize) -> Result<(), TimeConditionError> {
    if depth >= MAX_EXPR_DEPTH {
        return Err(TimeConditionError::TooDeep {
            limit: MAX_EXPR_DEPTH,
        });
    }
    Ok(())
}

fn split_time(
    cond: &Expr,
    valuer: &NowValuer,
    depth: usize,
) -> Result<(Option<Expr>, TimeBounds), TimeConditionError> {
    check_depth(depth)?;
    match cond {
        Expr::Paren(inner) => {
            let (residual, bounds) = split_time(inner, valuer, depth + 1)?;
            Ok((residual.map(Expr::paren), bounds))
        }
        Expr::Binary { op, lhs, rhs } if op.is_connective() => {
            let (lhs_expr, lhs_bounds) = split_time(lhs, valuer, depth + 1)?;
            let (rhs_expr, rhs_bounds) = split_time(rhs, valuer, depth + 1)?;

            if *op == BinaryOp::Or && !(lhs_bounds.is_unbounded() && rhs_bounds.is_unbounded()) {
                return Err(TimeConditionError::OrWithTime(cond.to_string()));
            }

            let residual = match (lhs_expr, rhs_expr) {
                (Some(l), Some(r)) => Some(Expr::binary(*op, l, r)),
                (l, r) => l.or(r),
            };
            Ok((residual, lhs_bounds.intersect(rhs_bounds)))
        }
        Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
            let (op, value) = if lhs.is_time_ref() {
                (*op, rhs.as_ref())
            } else if rhs.is_time_ref() {
                (op.reverse(), lhs.as_ref())
            } else {
                return Ok((Some(cond.clone()), TimeBounds::default()));
            };
            let bounds = comparison_bounds(op, value, valuer, depth + 1)?;
            Ok((None, bounds))
        }
        other => Ok((Some(other.clone()), TimeBounds::default())),
    }
}

fn comparison_bounds(
    op: BinaryOp,
    value: &Expr,
    valuer: &NowValuer,
    depth: usize,
) -> Result<TimeBounds, TimeConditionError> {
    let one_nano = Duration::nanoseconds(1);
    let out_of_range = || TimeConditionError::OutOfRange(value.to_string());

    match op {
        BinaryOp::Gt | BinaryOp::Gte | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Eq => {}
        other => return Err(TimeConditionError::InvalidOperator(other.to_string())),
    }

    let t = eval_time(value, valuer, depth)?;
    let bounds = match op {
        BinaryOp::Gt => TimeBounds {
            min: Some(t.checked_add_signed(one_nano).ok_or_else(out_of_range)?),
            max: None,
        },
        BinaryOp::Gte => TimeBounds {
            min: Some(t),
            max: None,
        },
        BinaryOp::Lt => TimeBounds {
            min: None,
            max: Some(t.checked_sub_signed(one_nano).ok_or_else(out_of_range)?),
        },
        BinaryOp::Lte => TimeBounds {
            min: None,
            max: Some(t),
        },
        _ => TimeBounds {
            min: Some(t),
            max: Some(t),
        },
    };
    Ok(bounds)
}

/// Evaluate an expression that must denote an absolute instant
fn eval_time(
    expr: &Expr,
    valuer: &NowValuer,
    depth: usize,
) -> Result<DateTime<Utc>, TimeConditionError> {
    check_depth(depth)?;
    match expr {
        Expr::Call { name, args } if name == "now" && args.is_empty() => Ok(valuer.now),
        Expr::TimeLit(t) => Ok(*t),
        Expr::StringLit(s) => parse_time_string(s),
        Expr::Paren(inner) => eval_time(inner, valuer, depth + 1),
        Expr::DurationLit(d) => d
            .num_nanoseconds()
            .map(|n| Utc.timestamp_nanos(n))
            .ok_or_else(|| TimeConditionError::OutOfRange(expr.to_string())),
        Expr::IntegerLit(n) => Ok(Utc.timestamp_nanos(*n)),
        Expr::NumberLit(n) if n.is_finite() => Ok(Utc.timestamp_nanos(*n as i64)),
        Expr::Binary { op, lhs, rhs } if matches!(op, BinaryOp::Add | BinaryOp::Sub) => {
            let base = eval_time(lhs, valuer, depth + 1)?;
            let offset = eval_duration(rhs, depth + 1)?;
            let shifted = if *op == BinaryOp::Add {
                base.checked_add_signed(offset)
            } else {
                base.checked_sub_signed(offset)
            };
            shifted.ok_or_else(|| TimeConditionError::OutOfRange(expr.to_string()))
        }
        other => Err(TimeConditionError::InvalidValue(other.to_string())),
    }
}

fn eval_duration(expr: &Expr, depth: usize) -> Result<Duration, TimeConditionError> {
    check_depth(depth)?;
    match expr {
        Expr::DurationLit(d) => Ok(*d),
        Expr::IntegerLit(n) => Ok(Duration::nanoseconds(*n)),
        Expr::Paren(inner) => eval_duration(inner, depth + 1),
        other => Err(TimeConditionError::InvalidValue(other.to_string())),
    }
}

/// Parse RFC3339 or `YYYY-MM-DD[ HH:MM:SS[.fff]]` (UTC)
fn parse_time_string(s: &str) -> Result<DateTime<Utc>, TimeConditionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| TimeConditionError::InvalidTimeString(s.to_string()))
}
