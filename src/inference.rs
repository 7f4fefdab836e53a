use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{ColumnKind, Value};

/// Missing value tokens
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "NULL", "NaN", "NaT", ".", "-", "--", "missing", "None", "#N/A",
];

// Date shapes the reporting tables use; values are validated by chrono after
// the shape matches.
static DATE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // ISO format: 2024-01-15
        (Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap(), "%Y-%m-%d"),
        // ISO with dots: 2024.01.15
        (Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").unwrap(), "%Y.%m.%d"),
    ]
});

static DATETIME_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap(),
            "%Y-%m-%d %H:%M:%S",
        ),
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$").unwrap(),
            "%Y-%m-%dT%H:%M:%S",
        ),
        // SQL Server style fractional seconds: 2024-01-15 00:00:00.000
        (
            Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}\.\d+$").unwrap(),
            "%Y-%m-%d %H:%M:%S%.f",
        ),
    ]
});

/// Check if a value represents a missing value
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    MISSING_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Parse a date or datetime string into a calendar date.
/// The time part of a datetime is dropped.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for (pattern, format) in DATE_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            return NaiveDate::parse_from_str(trimmed, format).ok();
        }
    }

    for (pattern, format) in DATETIME_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            let normalized = trimmed.replacen('T', " ", 1);
            let format = format.replacen('T', " ", 1);
            return NaiveDateTime::parse_from_str(&normalized, &format)
                .ok()
                .map(|dt| dt.date());
        }
    }
    None
}

/// Check if a value is a valid date
pub fn is_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Infer the kind of a column from its values.
///
/// Text columns count as dates when at least half of their non-missing
/// values parse as dates; the rest will be coerced to missing.
pub fn infer_kind<'a, I>(values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut numeric = 0usize;
    let mut dates = 0usize;
    let mut text = 0usize;
    let mut text_dates = 0usize;

    for value in values {
        match value {
            Value::Null => {}
            Value::Integer(_) => numeric += 1,
            Value::Float(f) if f.is_nan() => {}
            Value::Float(_) => numeric += 1,
            Value::Date(_) => dates += 1,
            Value::Text(s) if is_missing(s) => {}
            Value::Text(s) => {
                text += 1;
                if is_date(s) {
                    text_dates += 1;
                }
            }
        }
    }

    let present = numeric + dates + text;
    if present == 0 {
        ColumnKind::Empty
    } else if numeric == present {
        ColumnKind::Numeric
    } else if numeric == 0 && text_dates > 0 && (dates + text_dates) * 2 >= present {
        ColumnKind::Date
    } else if numeric == 0 && dates == present {
        ColumnKind::Date
    } else {
        ColumnKind::Text
    }
}

/// Coerce one value to a date; anything that is not a date becomes Null
pub fn coerce_date(value: &Value) -> Value {
    match value {
        Value::Date(d) => Value::Date(*d),
        Value::Text(s) => parse_date(s).map(Value::Date).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Normalise a text cell: missing tokens become Null
pub fn normalize_missing(value: Value) -> Value {
    match value {
        Value::Text(ref s) if is_missing(s) => Value::Null,
        Value::Float(f) if f.is_nan() => Value::Null,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_is_missing() {
        assert!(is_missing(""));
        assert!(is_missing("NA"));
        assert!(is_missing("null"));
        assert!(is_missing("NULL"));
        assert!(is_missing("NaT"));
        assert!(!is_missing("0"));
        assert!(!is_missing("IRTT"));
    }

    #[test]
    fn test_parse_iso_date_round_trip() {
        for s in ["2021-01-10", "2020-02-29", "1999-12-31"] {
            let d = parse_date(s).unwrap();
            assert_eq!(d.format("%Y-%m-%d").to_string(), s);
        }
    }

    #[test]
    fn test_parse_datetime_drops_time() {
        let d = parse_date("2022-05-01 13:45:00").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
        let d = parse_date("2022-05-01T00:00:00").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
        let d = parse_date("2022-05-01 00:00:00.000").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2022, 5, 1).unwrap());
    }

    #[test]
    fn test_malformed_dates_are_none() {
        assert!(parse_date("2021-02-30").is_none());
        assert!(parse_date("2021-13-01").is_none());
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_infer_kind_numeric() {
        let values = vec![Value::Integer(1), Value::Float(2.5), Value::Null];
        assert_eq!(infer_kind(&values), ColumnKind::Numeric);
    }

    #[test]
    fn test_infer_kind_date_strings() {
        let values = vec![text("2021-01-10"), text("garbage"), text("2021-01-11"), Value::Null];
        assert_eq!(infer_kind(&values), ColumnKind::Date);
    }

    #[test]
    fn test_infer_kind_free_text() {
        let values = vec![text("IRTT"), text("PTL"), text("2021-01-11")];
        assert_eq!(infer_kind(&values), ColumnKind::Text);
    }

    #[test]
    fn test_infer_kind_empty() {
        let values = vec![Value::Null, text("NULL")];
        assert_eq!(infer_kind(&values), ColumnKind::Empty);
    }

    #[test]
    fn test_coerce_date() {
        assert!(matches!(coerce_date(&text("2021-01-10")), Value::Date(_)));
        assert_eq!(coerce_date(&text("2021-01-32")), Value::Null);
        assert_eq!(coerce_date(&Value::Integer(3)), Value::Null);
    }
}
