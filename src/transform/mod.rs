//! Field normalization for animal records.
//!
//! Transformation is pure and total: it never fails and never touches I/O.
//! Only two fields are rewritten; everything else is copied as-is.
//!
//! - `friends`: comma-separated string → array of trimmed, non-empty names;
//!   absent or falsy → `[]`; any other shape passes through.
//! - `born_at`: epoch milliseconds or a date string → ISO-8601 string;
//!   unparsable → `null` with a warning; absent, falsy or other shapes pass through.

pub mod dates;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::model::{NormalizedRecord, RawRecord};

pub use dates::DateParseError;

const FRIENDS_FIELD: &str = "friends";
const BORN_AT_FIELD: &str = "born_at";

/// Normalizes one raw record.
///
/// # Example
///
/// ```
/// use animal_etl::transform::transform_animal;
/// use serde_json::json;
///
/// let raw = json!({"id": 1, "friends": "Ann, Bo", "born_at": 1609459200000_i64});
/// let normalized = transform_animal(raw.as_object().unwrap());
///
/// assert_eq!(normalized.get("friends"), Some(&json!(["Ann", "Bo"])));
/// assert_eq!(normalized.get("born_at"), Some(&json!("2021-01-01T00:00:00+00:00")));
/// ```
#[must_use]
pub fn transform_animal(raw: &RawRecord) -> NormalizedRecord {
    let mut fields = raw.clone();

    let friends = match fields.get(FRIENDS_FIELD) {
        Some(value) if !is_falsy(value) => normalize_friends(value),
        _ => Some(Value::Array(Vec::new())),
    };
    if let Some(friends) = friends {
        fields.insert(FRIENDS_FIELD.to_string(), friends);
    }

    if let Some(value) = fields.get(BORN_AT_FIELD) {
        let replacement = match normalize_born_at(value) {
            BornAt::Unchanged => None,
            BornAt::Normalized(iso) => Some(Value::String(iso)),
            BornAt::Invalid(error) => {
                warn!(
                    id = ?fields.get("id"),
                    born_at = %value,
                    %error,
                    "could not parse born_at, setting it to null"
                );
                Some(Value::Null)
            }
        };
        if let Some(replacement) = replacement {
            fields.insert(BORN_AT_FIELD.to_string(), replacement);
        }
    }

    NormalizedRecord::from_fields(fields)
}

/// Normalizes every record, preserving order.
#[must_use]
#[instrument(skip(raw), fields(count = raw.len()))]
pub fn transform_batch(raw: &[RawRecord]) -> Vec<NormalizedRecord> {
    raw.iter().map(transform_animal).collect()
}

/// Splits a truthy `friends` string; returns `None` to leave other shapes untouched.
fn normalize_friends(value: &Value) -> Option<Value> {
    let Value::String(text) = value else {
        return None;
    };
    Some(Value::Array(
        text.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| Value::String(name.to_string()))
            .collect(),
    ))
}

enum BornAt {
    Unchanged,
    Normalized(String),
    Invalid(DateParseError),
}

fn normalize_born_at(value: &Value) -> BornAt {
    if is_falsy(value) {
        return BornAt::Unchanged;
    }
    let result = match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => match number.as_i64() {
            Some(millis) => dates::from_epoch_millis(millis),
            None => Err(DateParseError::OutOfRange(i64::MAX)),
        },
        Value::String(text) => dates::parse_permissive(text),
        _ => return BornAt::Unchanged,
    };
    match result {
        Ok(iso) => BornAt::Normalized(iso),
        Err(error) => BornAt::Invalid(error),
    }
}

/// JSON truthiness: `null`, `false`, zero, and empty strings/arrays/objects are falsy.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
