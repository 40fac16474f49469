//! Record schema check with a permissive fallback
//!
//! A candidate that does not fit [`ListingRecord`] is repaired field by
//! field instead of being dropped. Both outcomes carry a usable record.

use crate::listing::coerce::{derive_id, int_from_text, numeric_from_text};
use crate::listing::ListingRecord;
use serde_json::{Map, Value};

/// Untyped record as assembled from one markup fragment
pub type CandidateRecord = Map<String, Value>;

/// Outcome of validating a candidate record
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The candidate matched the schema as-is
    Valid(ListingRecord),

    /// The candidate was repaired into a minimal valid record
    Degraded(ListingRecord, String),
}

impl Validation {
    /// Returns the record regardless of how it was obtained
    pub fn into_record(self) -> ListingRecord {
        match self {
            Self::Valid(record) | Self::Degraded(record, _) => record,
        }
    }

    pub fn record(&self) -> &ListingRecord {
        match self {
            Self::Valid(record) | Self::Degraded(record, _) => record,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }
}

/// Validates a candidate against the record schema
///
/// `id`, `url`, `brand` and `model` must be strings, `year` an integer and
/// `price` a number; the id must also be non-empty. Anything else is
/// optional but must have the right type when present.
pub fn validate(candidate: CandidateRecord) -> Validation {
    let strict = serde_json::from_value::<ListingRecord>(Value::Object(candidate.clone()));

    let reason = match strict {
        Ok(record) if !record.id.is_empty() => return Validation::Valid(record),
        Ok(_) => "id is empty".to_string(),
        Err(e) => e.to_string(),
    };

    let payload = Value::Object(candidate.clone());
    tracing::warn!(
        %reason,
        %payload,
        "Listing failed validation, keeping a degraded record"
    );

    Validation::Degraded(degrade(&candidate), reason)
}

/// Coerces each field of a candidate into the schema as far as possible
fn degrade(candidate: &CandidateRecord) -> ListingRecord {
    let url = text_field(candidate, "url").unwrap_or_default();
    let brand = text_field(candidate, "brand").unwrap_or_default();
    let model = text_field(candidate, "model").unwrap_or_default();

    let id = text_field(candidate, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| {
            let title = format!("{} {}", brand, model);
            derive_id(Some(&url), Some(title.trim()))
        });

    ListingRecord {
        id,
        year: int_field(candidate, "year")
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or(0),
        price: float_field(candidate, "price").unwrap_or(0.0),
        currency: text_field(candidate, "currency"),
        engine_capacity_cc: float_field(candidate, "engine_capacity_cc"),
        engine_power: int_field(candidate, "engine_power").and_then(|p| u32::try_from(p).ok()),
        mileage_km: int_field(candidate, "mileage_km"),
        location: text_field(candidate, "location"),
        fuel_type: text_field(candidate, "fuel_type"),
        url,
        brand,
        model,
    }
}

fn text_field(candidate: &CandidateRecord, key: &str) -> Option<String> {
    match candidate.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn float_field(candidate: &CandidateRecord, key: &str) -> Option<f64> {
    match candidate.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => numeric_from_text(s),
        _ => None,
    }
}

fn int_field(candidate: &CandidateRecord, key: &str) -> Option<u64> {
    match candidate.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => int_from_text(s),
        _ => None,
    }
}
