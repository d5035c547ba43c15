use crate::UrlError;
use url::Url;

/// Normalizes the base URL of a paginated target
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an HTTP or HTTPS scheme and a host
/// 3. Lowercase the host
/// 4. Remove a trailing slash from the path (except for root /)
/// 5. Remove the fragment and the query string; page parameters are
///    re-added per job
///
/// # Arguments
///
/// * `url_str` - The base URL string
///
/// # Returns
///
/// * `Ok(Url)` - Normalized base URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_base_url;
///
/// let url = normalize_base_url("https://WWW.Example.com/review/acme.io/?page=3#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/review/acme.io");
/// ```
pub fn normalize_base_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // The url crate already lowercases domain hosts; IP hosts pass through
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.set_fragment(None);
    url.set_query(None);

    Ok(url)
}
