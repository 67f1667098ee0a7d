//! Time range extraction
//!
//! PromQL selectors carry no time filter, so `time` comparisons are removed
//! from the WHERE clause and returned to the caller as an absolute range to
//! pass as the query's start/end.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::influxql::{condition_time_bounds, Expr, NowValuer};

use super::error::TranslateResult;

/// Absolute time range of a translated query
///
/// An open lower bound stays `None`; an open upper bound is the evaluation
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub min: Option<DateTime<Utc>>,
    pub max: DateTime<Utc>,
}

impl TimeRange {
    /// Lower bound as epoch milliseconds
    pub fn min_millis(&self) -> Option<i64> {
        self.min.map(|t| t.timestamp_millis())
    }

    /// Upper bound as epoch milliseconds
    pub fn max_millis(&self) -> i64 {
        self.max.timestamp_millis()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min {
            Some(min) => write!(f, "[{}, {}]", min.to_rfc3339(), self.max.to_rfc3339()),
            None => write!(f, "[-inf, {}]", self.max.to_rfc3339()),
        }
    }
}

/// Split `cond` into its non-time residual and its time range
///
/// Returns no range when the condition has no time comparison.
pub fn extract_time_range(
    cond: Option<&Expr>,
    now: DateTime<Utc>,
) -> TranslateResult<(Option<Expr>, Option<TimeRange>)> {
    let Some(cond) = cond else {
        return Ok((None, None));
    };

    let (residual, bounds) = condition_time_bounds(cond, &NowValuer::new(now))?;
    if bounds.is_unbounded() {
        return Ok((residual, None));
    }

    let range = TimeRange {
        min: bounds.min,
        max: bounds.max.unwrap_or(now),
    };
    tracing::debug!(range = %range, "extracted time range");
    Ok((residual, Some(range)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::{parse_expr, TimeConditionError};
    use crate::translator::TranslateError;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn extract(cond: &str) -> TranslateResult<(Option<Expr>, Option<TimeRange>)> {
        extract_time_range(Some(&parse_expr(cond).unwrap()), now())
    }

    #[test]
    fn test_no_condition() {
        assert_eq!(extract_time_range(None, now()).unwrap(), (None, None));
        let (residual, range) = extract("host = 'a'").unwrap();
        assert!(residual.is_some());
        assert!(range.is_none());
    }

    #[test]
    fn test_open_upper_bound_is_now() {
        let (residual, range) = extract("time > now() - 1h").unwrap();
        assert!(residual.is_none());
        let range = range.unwrap();
        assert_eq!(
            range.min,
            Some(now() - Duration::hours(1) + Duration::nanoseconds(1))
        );
        assert_eq!(range.max, now());
    }

    #[test]
    fn test_open_lower_bound_stays_open() {
        let (_, range) = extract("time <= '2024-02-01T00:00:00Z'").unwrap();
        let range = range.unwrap();
        assert!(range.min.is_none());
        assert_eq!(range.max, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_absolute_millis() {
        let (_, range) =
            extract("time >= 1698163200000ms and time <= 1698335999000ms").unwrap();
        let range = range.unwrap();
        assert_eq!(range.min_millis(), Some(1_698_163_200_000));
        assert_eq!(range.max_millis(), 1_698_335_999_000);
        assert_eq!(
            range.min.unwrap().to_rfc3339(),
            "2023-10-24T16:00:00+00:00"
        );
    }

    #[test]
    fn test_residual_keeps_tags() {
        let (residual, _) = extract("host = 'a' AND time > now() - 5m AND dc = 'x'").unwrap();
        assert_eq!(
            residual.unwrap().to_string(),
            "host = 'a' AND dc = 'x'"
        );
    }

    #[test]
    fn test_errors_are_wrapped() {
        let err = extract("time > now() - 1h OR host = 'a'").unwrap_err();
        assert!(matches!(
            err,
            TranslateError::TimeRange(TimeConditionError::OrWithTime(_))
        ));
    }

    #[test]
    fn test_serialize() {
        let range = TimeRange {
            min: None,
            max: now(),
        };
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, r#"{"min":null,"max":"2024-03-01T00:00:00Z"}"#);
    }
}
