//! CSS selectors describing where listing data lives in the page markup

/// Selectors for listing fragments and their sub-elements
///
/// The defaults follow the search-results markup of otomoto.pl, where every
/// listing root is an `<article>` carrying a `data-id` attribute. Class names
/// there are generated, so they are kept together here rather than spread
/// through the extractor.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    /// Listing root nodes; one match per listing
    pub container: String,

    /// Attribute on the container holding the site's listing id
    pub id_attribute: String,

    /// Heading link carrying the title text and detail URL
    pub title_link: String,

    /// Price amount text
    pub price: String,

    /// Currency label next to the price
    pub currency: String,

    /// Definition list of key/value parameters
    pub parameters: String,

    /// Free-text annotation line (engine capacity, power, notes)
    pub annotation: String,

    /// Location text
    pub location: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: "article[data-id]".to_string(),
            id_attribute: "data-id".to_string(),
            title_link: "h2.etydmma0 > a".to_string(),
            price: "h3.efzkujb1".to_string(),
            currency: "p.efzkujb2".to_string(),
            parameters: "dl.ooa-x6wpd5".to_string(),
            annotation: "p.ooa-nxfgg7".to_string(),
            location: "ul.ooa-1o0axny li p".to_string(),
        }
    }
}
