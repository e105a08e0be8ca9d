//! Permissive date parsing and ISO-8601 formatting for `born_at`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Formats with an explicit UTC offset, tried after RFC 3339 and RFC 2822.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%b %d %Y %I:%M %p",
    "%B %d %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
    // asctime, once the weekday is stripped
    "%b %d %H:%M:%S %Y",
];

// Slash dates are month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Month and year only; the day is taken as the 1st.
const MONTH_YEAR_FORMATS: &[&str] = &["%B %Y", "%b %Y", "%Y-%m"];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const NAIVE_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Reasons a `born_at` value could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    /// The string held no date text.
    #[error("empty date string")]
    Empty,

    /// No supported format matched.
    #[error("unrecognized date format: {0:?}")]
    Unrecognized(String),

    /// Epoch milliseconds outside the representable range.
    #[error("epoch milliseconds out of range: {0}")]
    OutOfRange(i64),
}

/// Converts epoch milliseconds to an ISO-8601 UTC timestamp.
///
/// # Errors
///
/// Returns [`DateParseError::OutOfRange`] when `millis` has no calendar representation.
pub fn from_epoch_millis(millis: i64) -> Result<String, DateParseError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        .ok_or(DateParseError::OutOfRange(millis))
}

/// Parses a date string in any supported format and reformats it as ISO-8601.
///
/// Inputs carrying an offset keep it (`+00:00` for `Z` and for a trailing
/// `UTC`/`GMT`); inputs without one come back naive. Date-only inputs are
/// midnight. A leading weekday name is ignored. Four-digit-year formats only
/// match when the input really spells the year with four digits, so short
/// years never land in the first century.
///
/// # Errors
///
/// Returns [`DateParseError::Empty`] for blank input and
/// [`DateParseError::Unrecognized`] when no format matches.
pub fn parse_permissive(input: &str) -> Result<String, DateParseError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false));
    }

    let body = strip_weekday(text);
    if let Some(local) = strip_utc_zone(body) {
        if let Some(dt) = parse_naive(local) {
            return Ok(dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, false));
        }
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(body, format) {
            if spells_year(body, dt.year()) {
                return Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false));
            }
        }
    }
    if let Some(dt) = parse_naive(body) {
        return Ok(dt.format(NAIVE_OUTPUT_FORMAT).to_string());
    }

    Err(DateParseError::Unrecognized(text.to_string()))
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    if let Some(date) = parse_compact_date(text) {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            if !format.contains("%Y") || spells_year(text, dt.year()) {
                return Some(dt);
            }
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if !format.contains("%Y") || spells_year(text, date.year()) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
    }
    let with_day = format!("{text} 1");
    for format in MONTH_YEAR_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&with_day, &format!("{format} %d")) {
            if spells_year(text, date.year()) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
    }
    None
}

/// `YYYYMMDD` with no separators.
fn parse_compact_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = text[..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// True when `year` appears in `text` as a standalone four-digit number.
fn spells_year(text: &str, year: i32) -> bool {
    let expected = format!("{year:04}");
    text.split(|c: char| !c.is_ascii_digit())
        .any(|digits| digits == expected)
}

fn strip_weekday(text: &str) -> &str {
    let Some((first, rest)) = text.split_once(char::is_whitespace) else {
        return text;
    };
    let word = first.trim_end_matches(',').to_ascii_lowercase();
    let is_weekday = WEEKDAYS
        .iter()
        .any(|day| *day == word || (word.len() == 3 && day.starts_with(&word)));
    if is_weekday { rest.trim_start() } else { text }
}

fn strip_utc_zone(text: &str) -> Option<&str> {
    let (local, zone) = text.rsplit_once(char::is_whitespace)?;
    (zone.eq_ignore_ascii_case("utc") || zone.eq_ignore_ascii_case("gmt"))
        .then(|| local.trim_end())
}
