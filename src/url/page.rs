//! Per-page URL preparation and target slugs

use url::Url;

/// Slug used when the base URL does not follow `/review/<slug>`
pub const UNKNOWN_TARGET: &str = "unknown_company";

/// Builds the URL of one content page
///
/// Any query or fragment on `base` is dropped, then `page` and (when given)
/// `languages` are set as the only query parameters.
///
/// # Arguments
///
/// * `base` - The target's base URL
/// * `page` - One-based page number
/// * `languages` - Value of the `languages` parameter, if any
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::prepare_page_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/review/acme.io?stars=5").unwrap();
/// let url = prepare_page_url(&base, 3, Some("all"));
/// assert_eq!(url.as_str(), "https://example.com/review/acme.io?page=3&languages=all");
/// ```
pub fn prepare_page_url(base: &Url, page: u32, languages: Option<&str>) -> Url {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("page", &page.to_string());
        if let Some(languages) = languages {
            query.append_pair("languages", languages);
        }
    }

    url
}

/// Derives the storage slug of a target from its base URL
///
/// `https://host/review/<slug>` yields `<slug>`; anything else yields
/// [`UNKNOWN_TARGET`].
pub fn target_slug(base: &Url) -> String {
    let segments: Vec<&str> = base
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [first, slug, ..] if first.eq_ignore_ascii_case("review") => slug.to_string(),
        _ => UNKNOWN_TARGET.to_string(),
    }
}
