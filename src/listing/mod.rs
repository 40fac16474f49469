//! Listing extraction: from page markup to vehicle records
//!
//! This module contains everything between a fetched page and a record
//! ready for storage:
//! - Field coercers that turn inconsistent text into typed values
//! - The record schema and its validate-or-degrade step
//! - The markup extractor that finds listing fragments on a page

mod coerce;
mod parser;
mod selectors;
mod validate;

pub use coerce::{
    capitalize, derive_id, extract_currency, int_from_text, numeric_from_text, resolve_url,
};
pub use parser::{split_brand_model, Extractor};
pub use selectors::ListingSelectors;
pub use validate::{validate, CandidateRecord, Validation};

use serde::{Deserialize, Serialize};

/// One vehicle listing as persisted to the JSONL file
///
/// `year` and `price` are always present (`0` when unknown); every other
/// field past `model` may be `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub url: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub currency: Option<String>,
    pub engine_capacity_cc: Option<f64>,
    pub engine_power: Option<u32>,
    pub mileage_km: Option<u64>,
    pub location: Option<String>,
    pub fuel_type: Option<String>,
}

impl ListingRecord {
    /// Key used for in-run deduplication: the id, or the url when the id is blank
    pub fn dedup_key(&self) -> Option<&str> {
        [self.id.as_str(), self.url.as_str()]
            .into_iter()
            .find(|key| !key.is_empty())
    }
}
