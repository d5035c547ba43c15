//! Content extraction from fetched pages
//!
//! Review pages embed their state in a Next.js data island:
//! `<script id="__NEXT_DATA__" type="application/json">`. This module pulls
//! that JSON out of the HTML and extracts:
//! - The review list of a content page
//! - The trimmed company profile of the profile page
//! - The total page count used by discovery

use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Profile fields kept from the page's `businessUnit` object
const PROFILE_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "identifyingName",
    "numberOfReviews",
    "trustScore",
    "websiteUrl",
    "stars",
];

/// Which kind of record a page is expected to yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Company metadata, fetched from page 1
    Profile,
    /// One page of reviews
    Reviews,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Reviews => "reviews",
        }
    }
}

/// Structured content extracted from a response body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub kind: PageKind,
    pub data: Value,
    /// Reviews on the page, or 1 for a profile
    pub item_count: usize,
}

/// Turns a raw response body into a record
///
/// `None` means the page carried no usable content; the job ends as EMPTY
/// rather than failing.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, kind: PageKind, body: &[u8], content_type: Option<&str>) -> Option<ParsedRecord>;
}

/// Extractor for pages that carry a `__NEXT_DATA__` island
#[derive(Debug, Clone, Copy, Default)]
pub struct NextDataExtractor;

impl ContentExtractor for NextDataExtractor {
    fn extract(&self, kind: PageKind, body: &[u8], content_type: Option<&str>) -> Option<ParsedRecord> {
        if let Some(ct) = content_type {
            if !ct.contains("html") {
                tracing::debug!(content_type = ct, "Skipping non-HTML response");
                return None;
            }
        }

        let html = String::from_utf8_lossy(body);
        let data = next_data_json(&html)?;
        let page_props = data.get("props")?.get("pageProps")?;

        match kind {
            PageKind::Reviews => extract_reviews(page_props),
            PageKind::Profile => extract_profile(page_props),
        }
    }
}

fn extract_reviews(page_props: &Value) -> Option<ParsedRecord> {
    let reviews = page_props.get("reviews")?.as_array()?;
    if reviews.is_empty() {
        return None;
    }

    Some(ParsedRecord {
        kind: PageKind::Reviews,
        item_count: reviews.len(),
        data: Value::Array(reviews.clone()),
    })
}

fn extract_profile(page_props: &Value) -> Option<ParsedRecord> {
    let unit = page_props.get("businessUnit")?.as_object()?;
    if unit.is_empty() {
        return None;
    }

    let profile: Map<String, Value> = PROFILE_FIELDS
        .iter()
        .map(|field| (field.to_string(), unit.get(*field).cloned().unwrap_or(Value::Null)))
        .collect();

    Some(ParsedRecord {
        kind: PageKind::Profile,
        item_count: 1,
        data: Value::Object(profile),
    })
}

/// Parses the `__NEXT_DATA__` island out of an HTML document
///
/// # Arguments
///
/// * `html` - The HTML content to parse
///
/// # Returns
///
/// * `Some(Value)` - The island's JSON
/// * `None` - No island, an empty island, or invalid JSON
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::next_data_json;
///
/// let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">{"props":{}}</script></body></html>"#;
/// assert!(next_data_json(html).is_some());
/// ```
pub fn next_data_json(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script#__NEXT_DATA__[type="application/json"]"#).ok()?;

    let text: String = document.select(&selector).next()?.text().collect();
    if text.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode __NEXT_DATA__ JSON");
            None
        }
    }
}

/// Reads `props.pageProps.filters.pagination.totalPages` from an HTML page
pub fn total_pages(html: &str) -> Option<u32> {
    let data = next_data_json(html)?;
    let total = data
        .get("props")?
        .get("pageProps")?
        .get("filters")?
        .get("pagination")?
        .get("totalPages")?;

    total
        .as_u64()
        .or_else(|| total.as_str().and_then(|s| s.trim().parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(data: Value) -> String {
        format!(
            r#"<html><head><title>Reviews</title></head><body>
            <script id="__NEXT_DATA__" type="application/json">{}</script>
            </body></html>"#,
            data
        )
    }

    #[test]
    fn test_extract_reviews() {
        let html = page(json!({
            "props": {"pageProps": {"reviews": [{"id": "r1"}, {"id": "r2"}]}}
        }));

        let record = NextDataExtractor
            .extract(PageKind::Reviews, html.as_bytes(), Some("text/html; charset=utf-8"))
            .unwrap();
        assert_eq!(record.kind, PageKind::Reviews);
        assert_eq!(record.item_count, 2);
        assert_eq!(record.data[1]["id"], "r2");
    }

    #[test]
    fn test_empty_reviews_is_none() {
        let html = page(json!({"props": {"pageProps": {"reviews": []}}}));
        assert!(NextDataExtractor
            .extract(PageKind::Reviews, html.as_bytes(), None)
            .is_none());

        let html = page(json!({"props": {"pageProps": {}}}));
        assert!(NextDataExtractor
            .extract(PageKind::Reviews, html.as_bytes(), None)
            .is_none());
    }

    #[test]
    fn test_extract_profile_trims_fields() {
        let html = page(json!({
            "props": {"pageProps": {"businessUnit": {
                "id": "abc",
                "displayName": "Example Ltd",
                "numberOfReviews": 1234,
                "trustScore": 4.2,
                "internalField": "dropped"
            }}}
        }));

        let record = NextDataExtractor
            .extract(PageKind::Profile, html.as_bytes(), None)
            .unwrap();
        assert_eq!(record.item_count, 1);
        assert_eq!(record.data["displayName"], "Example Ltd");
        assert_eq!(record.data["websiteUrl"], Value::Null);
        assert!(record.data.get("internalField").is_none());
    }

    #[test]
    fn test_missing_island() {
        let html = "<html><body><p>Access denied</p></body></html>";
        assert!(next_data_json(html).is_none());
        assert!(NextDataExtractor
            .extract(PageKind::Reviews, html.as_bytes(), None)
            .is_none());
    }

    #[test]
    fn test_invalid_json_island() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{not json</script>"#;
        assert!(next_data_json(html).is_none());
    }

    #[test]
    fn test_non_html_content_type() {
        let html = page(json!({"props": {"pageProps": {"reviews": [{"id": "r1"}]}}}));
        assert!(NextDataExtractor
            .extract(PageKind::Reviews, html.as_bytes(), Some("application/pdf"))
            .is_none());
    }

    #[test]
    fn test_total_pages() {
        let html = page(json!({
            "props": {"pageProps": {"filters": {"pagination": {"totalPages": 37}}}}
        }));
        assert_eq!(total_pages(&html), Some(37));

        let html = page(json!({
            "props": {"pageProps": {"filters": {"pagination": {"totalPages": "12"}}}}
        }));
        assert_eq!(total_pages(&html), Some(12));

        let html = page(json!({"props": {"pageProps": {}}}));
        assert_eq!(total_pages(&html), None);
    }
}
