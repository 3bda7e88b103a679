use url::Url;

/// Classification of an asset URL found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetUrl {
    /// Resolved URL on the same host as the fetched page; eligible for download
    SameOrigin(Url),
    /// Resolved URL on some other host (or with no host at all, e.g. `data:`)
    Foreign(Url),
    /// The raw value could not be parsed as a URL reference
    Invalid,
}

impl AssetUrl {
    pub fn is_same_origin(&self) -> bool {
        matches!(self, Self::SameOrigin(_))
    }

    /// The resolved absolute URL, if the raw value was parseable
    pub fn absolute(&self) -> Option<&Url> {
        match self {
            Self::SameOrigin(url) | Self::Foreign(url) => Some(url),
            Self::Invalid => None,
        }
    }
}

/// Resolves `raw` against `base` and classifies it relative to `page_url`
///
/// `page_url` must be the URL the page was actually served from (after redirects),
/// not the URL that was originally requested. Hosts are compared case-insensitively,
/// together with the effective port.
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::{resolve_and_classify, AssetUrl};
/// use url::Url;
///
/// let page = Url::parse("https://a.com/blog/post").unwrap();
/// let base = Url::parse("https://a.com/blog/").unwrap();
///
/// let local = resolve_and_classify(&base, "img/cat.png", &page);
/// assert_eq!(
///     local,
///     AssetUrl::SameOrigin(Url::parse("https://a.com/blog/img/cat.png").unwrap())
/// );
///
/// let cdn = resolve_and_classify(&base, "//cdn.b.com/x.js", &page);
/// assert!(!cdn.is_same_origin());
/// ```
pub fn resolve_and_classify(base: &Url, raw: &str, page_url: &Url) -> AssetUrl {
    let raw = raw.trim();
    if raw.is_empty() {
        return AssetUrl::Invalid;
    }

    let resolved = match base.join(raw) {
        Ok(url) => url,
        Err(_) => return AssetUrl::Invalid,
    };

    if same_host(&resolved, page_url) {
        AssetUrl::SameOrigin(resolved)
    } else {
        AssetUrl::Foreign(resolved)
    }
}

/// Returns true if both URLs name the same host and effective port
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(host_a), Some(host_b)) => {
            host_a.eq_ignore_ascii_case(host_b)
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}
