//! Prometheus duration syntax
//!
//! Durations are written as a sequence of unit terms from largest to smallest,
//! e.g. `1h30m` or `2w3d`. Units: `y` (365 days), `w`, `d`, `h`, `m`, `s`, `ms`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::error::DurationError;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: u64 = 7 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: u64 = 365 * MILLIS_PER_DAY;

/// Units in the order they must appear, with their length in milliseconds
const UNITS: [(&str, u64); 7] = [
    ("y", MILLIS_PER_YEAR),
    ("w", MILLIS_PER_WEEK),
    ("d", MILLIS_PER_DAY),
    ("h", MILLIS_PER_HOUR),
    ("m", MILLIS_PER_MINUTE),
    ("s", MILLIS_PER_SECOND),
    ("ms", 1),
];

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")
            .unwrap_or_else(|e| unreachable!("duration regex is valid: {e}"))
    })
}

/// Parse a Prometheus duration string such as `5m` or `1h30m`
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    // A bare zero is the one unit-less form allowed
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let caps = duration_regex()
        .captures(s)
        .ok_or_else(|| DurationError::Invalid(s.to_string()))?;

    let mut total: u64 = 0;
    for (i, (_, millis)) in UNITS.iter().enumerate() {
        let Some(m) = caps.get(i + 1) else {
            continue;
        };
        let n: u64 = m
            .as_str()
            .parse()
            .map_err(|_| DurationError::Overflow(s.to_string()))?;
        total = n
            .checked_mul(*millis)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| DurationError::Overflow(s.to_string()))?;
    }

    Ok(Duration::from_millis(total))
}

/// Render a duration with the largest units first (`7d` renders as `1w`)
///
/// Sub-millisecond precision is dropped.
pub fn format_duration(d: &Duration) -> String {
    let mut ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, millis) in UNITS {
        let millis = u128::from(millis);
        let n = ms / millis;
        if n > 0 {
            out.push_str(&n.to_string());
            out.push_str(unit);
            ms -= n * millis;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86_400));
        assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(7 * 86_400));
        assert_eq!(parse_duration("1y").unwrap(), Duration::from_secs(365 * 86_400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(
            parse_duration("1d2h3m4s5ms").unwrap(),
            Duration::from_millis(86_400_000 + 7_200_000 + 180_000 + 4_000 + 5)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(parse_duration("5x"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("30m1h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("1.5h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-1m"), Err(DurationError::Invalid(_))));
        assert!(matches!(
            parse_duration("99999999999999999999y"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_canonical() {
        assert_eq!(format_duration(&Duration::ZERO), "0s");
        assert_eq!(format_duration(&Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(&Duration::from_secs(5_400)), "1h30m");
        assert_eq!(format_duration(&Duration::from_secs(7 * 86_400)), "1w");
        assert_eq!(format_duration(&Duration::from_millis(1_500)), "1s500ms");
    }

    #[test]
    fn test_window_round_trip() {
        for (input, canonical) in [("7d", "1w"), ("2d", "2d"), ("90m", "1h30m"), ("1m", "1m")] {
            let d = parse_duration(input).unwrap();
            assert_eq!(format_duration(&d), canonical);
            assert_eq!(parse_duration(canonical).unwrap(), d);
        }
    }
}
