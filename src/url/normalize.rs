use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a submitted URL so duplicates can be detected
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Only HTTP and HTTPS are accepted
/// 3. A host is required (the parser already lowercases it and resolves dot segments)
/// 4. Remove fragment (everything after #)
/// 5. Remove empty query string (trailing ?)
///
/// Unlike link normalization in a crawler, nothing that changes the resource being
/// requested is rewritten: `www.` prefixes, trailing slashes and query parameter order
/// are kept as given.
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM/a/../page?#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim())?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
