//! Wire types shared by the pipeline stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque integer key of one source animal record.
pub type AnimalId = i64;

/// A full animal record as returned by the detail endpoint.
///
/// Only `id` is guaranteed; every other field is source-defined.
pub type RawRecord = Map<String, Value>;

/// One entry of a listing page. Fields other than `id` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ListingItem {
    /// Identifier used to fetch the full record.
    pub id: AnimalId,
}

/// Response envelope of the listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Page {
    /// Listing entries in server order; absent or `null` means an empty page.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ListingItem>,
    /// Total page count declared by the server, if any.
    ///
    /// Decoded leniently: integral floats are accepted, fractional values
    /// round up, and anything that is not a positive count (negative, zero,
    /// non-numeric) decodes as `Some(0)`, which ends the scan after the
    /// current page.
    #[serde(default, deserialize_with = "lenient_total_pages")]
    pub total_pages: Option<u64>,
}

impl Page {
    /// Total pages, treating a missing value as "this is the last known page".
    #[must_use]
    pub fn total_pages_or(&self, current_page: u64) -> u64 {
        self.total_pages.unwrap_or(current_page)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ListingItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ListingItem>>::deserialize(deserializer)?.unwrap_or_default())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn lenient_total_pages<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let total = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => Some(match number.as_u64() {
            Some(count) => count,
            None => number
                .as_f64()
                .filter(|count| count.is_finite() && *count > 0.0)
                .map_or(0, |count| count.ceil().min(u64::MAX as f64) as u64),
        }),
        Some(_) => Some(0),
    };
    Ok(total)
}

/// An animal record after `friends` and `born_at` normalization.
///
/// Serializes as the plain JSON object, so a slice of these is the upload body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Map<String, Value>);

impl NormalizedRecord {
    /// Wraps an already-normalized field map.
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns the field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the record identifier when present and integral.
    #[must_use]
    pub fn id(&self) -> Option<AnimalId> {
        self.0.get("id").and_then(Value::as_i64)
    }

    /// Returns a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}
