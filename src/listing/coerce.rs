//! Text-to-value coercers used by the extractor
//!
//! Every function here is total: bad input yields `None` (or a fallback
//! value), never a panic or an error.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use url::Url;

static CURRENCY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([A-Z]{2,4}|zł|PLN|EUR|USD)").expect("hardcoded regex pattern is valid")
});

static OFFER_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/oferta/(\d+)").expect("hardcoded regex pattern is valid"));

/// Length of the hex digest used as a fallback listing id
const HASH_ID_LEN: usize = 12;

/// Parses a localized number such as `"89 000 zł"` or `"12,5"`
///
/// Keeps only digits, commas and periods (so grouping spaces and unit
/// suffixes vanish), turns commas into decimal points and parses the rest.
pub fn numeric_from_text(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses an integer from text by discarding every non-digit character
///
/// `"225 275 km"` becomes `225275`; text with no digits yields `None`.
pub fn int_from_text(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Extracts a currency code from a price or currency label
///
/// The local `zł` glyph maps to `PLN`; any other 2-4 letter token is
/// returned upper-cased.
pub fn extract_currency(text: &str) -> Option<String> {
    let found = CURRENCY_REGEX.find(text.trim())?;
    let code = found.as_str().to_uppercase();
    if code == "ZŁ" {
        Some("PLN".to_string())
    } else {
        Some(code)
    }
}

/// Derives a stable listing id
///
/// Uses the numeric `/oferta/<digits>` segment of the URL when present;
/// otherwise a short SHA-256 digest of `url|title`, so identical inputs
/// always produce the same id.
pub fn derive_id(url: Option<&str>, title: Option<&str>) -> String {
    if let Some(caps) = url.and_then(|u| OFFER_ID_REGEX.captures(u)) {
        return caps[1].to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(url.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(title.unwrap_or("").as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_ID_LEN);
    digest
}

/// Resolves a possibly relative link against the page it was found on
pub fn resolve_url(base: &str, href: Option<&str>) -> Option<String> {
    let href = href.map(str::trim).filter(|h| !h.is_empty())?;

    match Url::parse(base) {
        Ok(base) => base.join(href).ok().map(|u| u.to_string()),
        Err(_) => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// Upper-cases the first character and lower-cases the rest
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
