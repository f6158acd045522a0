//! Date normalization.

use chrono::{Datelike, NaiveDate};

use crate::config::DateFormat;

/// Parse a date string with the configured pattern.
///
/// Returns `None` for anything that does not parse or is out of range; bad
/// dates never fail a run. When the pattern has a `%Y` field the year must
/// have four digits. Whitespace is only accepted where the pattern has some.
pub fn parse_date(value: &str, format: &DateFormat) -> Option<NaiveDate> {
    let pattern_has_space = format.as_str().chars().any(char::is_whitespace);
    if !pattern_has_space && value.chars().any(char::is_whitespace) {
        return None;
    }
    let date = NaiveDate::parse_from_str(value, format.as_str()).ok()?;
    if format.as_str().contains("%Y") && !(1000..=9999).contains(&date.year()) {
        return None;
    }
    Some(date)
}

/// Parse an optional date column value, counting unparseable non-null input.
pub(crate) fn derive_date(
    value: Option<&str>,
    format: &DateFormat,
    unparseable: &mut usize,
) -> Option<NaiveDate> {
    let raw = value?;
    let parsed = parse_date(raw, format);
    if parsed.is_none() {
        *unparseable += 1;
    }
    parsed
}
