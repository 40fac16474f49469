//! HTML extractor for listing pages
//!
//! This module turns one page of search results into listing records:
//! - Finds every listing container in the markup
//! - Pulls title, link, price, parameters, annotation and location from each
//! - Coerces the text into typed fields and validates the result

use crate::listing::coerce::{
    capitalize, derive_id, extract_currency, int_from_text, numeric_from_text, resolve_url,
};
use crate::listing::selectors::ListingSelectors;
use crate::listing::validate::{validate, CandidateRecord, Validation};
use crate::listing::ListingRecord;
use crate::ScraperError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

static ENGINE_CAPACITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{3,4})\s?cm3").expect("hardcoded regex pattern is valid"));

static ENGINE_POWER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{2,4})\s?(KM|kW)").expect("hardcoded regex pattern is valid")
});

/// Separator between the items of the annotation line
const ANNOTATION_DELIMITER: char = '•';

/// Parameter labels for each field, English keys first then the site's Polish labels
const YEAR_KEYS: &[&str] = &["year", "rok produkcji"];
const MILEAGE_KEYS: &[&str] = &["mileage", "przebieg"];
const FUEL_TYPE_KEYS: &[&str] = &["fuel_type", "rodzaj paliwa"];

/// Compiled form of [`ListingSelectors`]
#[derive(Debug)]
struct CompiledSelectors {
    container: Selector,
    title_link: Selector,
    price: Selector,
    currency: Selector,
    parameters: Selector,
    term: Selector,
    definition: Selector,
    annotation: Selector,
    location: Selector,
}

/// Extracts listing records from search-result pages
#[derive(Debug)]
pub struct Extractor {
    selectors: CompiledSelectors,
    id_attribute: String,
}

/// Raw text pulled from one listing fragment, before coercion
#[derive(Debug, Default)]
struct FragmentFields {
    id_attribute: Option<String>,
    title: Option<String>,
    href: Option<String>,
    price_text: Option<String>,
    currency_text: Option<String>,
    parameters: HashMap<String, String>,
    annotation: Option<String>,
    location: Option<String>,
}

impl Extractor {
    /// Creates an extractor using the default otomoto.pl selectors
    pub fn new() -> crate::Result<Self> {
        Self::with_selectors(&ListingSelectors::default())
    }

    /// Creates an extractor from custom selectors
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - All selectors compiled
    /// * `Err(ScraperError::Selector)` - One of the selectors is not valid CSS
    pub fn with_selectors(selectors: &ListingSelectors) -> crate::Result<Self> {
        Ok(Self {
            selectors: CompiledSelectors {
                container: compile(&selectors.container)?,
                title_link: compile(&selectors.title_link)?,
                price: compile(&selectors.price)?,
                currency: compile(&selectors.currency)?,
                parameters: compile(&selectors.parameters)?,
                term: compile("dt")?,
                definition: compile("dd")?,
                annotation: compile(&selectors.annotation)?,
                location: compile(&selectors.location)?,
            },
            id_attribute: selectors.id_attribute.clone(),
        })
    }

    /// Extracts listing records from a page, in document order
    ///
    /// Degraded records are included. Fragments without an id attribute,
    /// title or link are skipped; nothing else reduces the count.
    ///
    /// # Example
    ///
    /// ```
    /// use otomoto_scraper::listing::Extractor;
    ///
    /// let html = r#"<article data-id="A1">
    ///     <h2 class="etydmma0"><a href="/oferta/1">BMW Seria 5</a></h2>
    /// </article>"#;
    /// let records = Extractor::new().unwrap().extract(html, "https://www.otomoto.pl/");
    /// assert_eq!(records[0].brand, "BMW");
    /// ```
    pub fn extract(&self, markup: &str, base_url: &str) -> Vec<ListingRecord> {
        self.extract_validated(markup, base_url)
            .into_iter()
            .map(Validation::into_record)
            .collect()
    }

    /// Like [`Extractor::extract`] but keeps the validation outcome per record
    pub fn extract_validated(&self, markup: &str, base_url: &str) -> Vec<Validation> {
        let document = Html::parse_document(markup);

        let fragments: Vec<ElementRef> = document.select(&self.selectors.container).collect();
        tracing::debug!("Found {} listing fragments", fragments.len());

        fragments
            .into_iter()
            .filter_map(|fragment| self.parse_fragment(fragment, base_url))
            .collect()
    }

    /// Builds and validates a record from one listing fragment
    fn parse_fragment(&self, fragment: ElementRef, base_url: &str) -> Option<Validation> {
        let fields = self.read_fields(fragment);
        let url = resolve_url(base_url, fields.href.as_deref());

        if fields.id_attribute.is_none() && fields.title.is_none() && url.is_none() {
            tracing::debug!("Skipping listing fragment without id, title or link");
            return None;
        }

        Some(validate(self.assemble(fields, url)))
    }

    /// Reads the raw text of every sub-element of interest
    fn read_fields(&self, fragment: ElementRef) -> FragmentFields {
        let s = &self.selectors;
        let title_link = fragment.select(&s.title_link).next();

        FragmentFields {
            id_attribute: fragment
                .value()
                .attr(&self.id_attribute)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            title: title_link.map(text_of).filter(|t| !t.is_empty()),
            href: title_link
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
            price_text: first_text(fragment, &s.price),
            currency_text: first_text(fragment, &s.currency),
            parameters: fragment
                .select(&s.parameters)
                .next()
                .map(|dl| self.read_parameters(dl))
                .unwrap_or_default(),
            annotation: first_text(fragment, &s.annotation),
            location: first_text(fragment, &s.location),
        }
    }

    /// Pairs `<dt>` and `<dd>` entries of a definition list, keys lower-cased
    fn read_parameters(&self, list: ElementRef) -> HashMap<String, String> {
        list.select(&self.selectors.term)
            .zip(list.select(&self.selectors.definition))
            .map(|(term, definition)| (text_of(term).to_lowercase(), text_of(definition)))
            .collect()
    }

    /// Merges coerced fields into an untyped candidate record
    fn assemble(&self, fields: FragmentFields, url: Option<String>) -> CandidateRecord {
        let (brand, model) = split_brand_model(fields.title.as_deref());

        let id = fields
            .id_attribute
            .clone()
            .unwrap_or_else(|| derive_id(url.as_deref(), fields.title.as_deref()));

        let price = fields.price_text.as_deref().and_then(numeric_from_text);
        let currency = fields
            .currency_text
            .as_deref()
            .and_then(extract_currency)
            .or_else(|| fields.price_text.as_deref().and_then(extract_currency));

        let year = parameter(&fields.parameters, YEAR_KEYS).and_then(|y| y.parse::<i32>().ok());
        let mileage = parameter(&fields.parameters, MILEAGE_KEYS).and_then(int_from_text);
        let fuel_type = parameter(&fields.parameters, FUEL_TYPE_KEYS).map(capitalize);

        let (engine_capacity, engine_power) = fields
            .annotation
            .as_deref()
            .map(parse_annotation)
            .unwrap_or((None, None));

        let candidate = json!({
            "id": id,
            "url": url.unwrap_or_default(),
            "brand": brand,
            "model": model,
            "year": year.unwrap_or(0),
            "price": price.unwrap_or(0.0),
            "currency": currency,
            "engine_capacity_cc": engine_capacity,
            "engine_power": engine_power,
            "mileage_km": mileage,
            "location": fields.location,
            "fuel_type": fuel_type,
        });

        match candidate {
            Value::Object(map) => map,
            _ => CandidateRecord::new(),
        }
    }
}

/// Splits a listing title into brand (first word) and model (the rest)
pub fn split_brand_model(title: Option<&str>) -> (String, String) {
    let mut words = title.unwrap_or("").split_whitespace();
    match words.next() {
        Some(brand) => (brand.to_string(), words.collect::<Vec<_>>().join(" ")),
        None => (String::new(), String::new()),
    }
}

/// Scans the annotation line for engine capacity (cm3) and power (KM/kW)
///
/// The line is split on `•`; the first item matching each pattern wins.
fn parse_annotation(text: &str) -> (Option<f64>, Option<u32>) {
    let mut capacity = None;
    let mut power = None;

    for part in text.split(ANNOTATION_DELIMITER).map(str::trim) {
        if capacity.is_none() {
            capacity = ENGINE_CAPACITY_REGEX
                .captures(part)
                .and_then(|caps| caps[1].parse::<f64>().ok());
        }
        if power.is_none() {
            power = ENGINE_POWER_REGEX
                .captures(part)
                .and_then(|caps| caps[1].parse::<u32>().ok());
        }
    }

    (capacity, power)
}

fn parameter<'a>(parameters: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| parameters.get(*key))
        .map(|value| value.trim())
}

fn compile(selector: &str) -> crate::Result<Selector> {
    Selector::parse(selector).map_err(|e| ScraperError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Text content of an element with whitespace runs collapsed
fn text_of(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(fragment: ElementRef, selector: &Selector) -> Option<String> {
    fragment
        .select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}
