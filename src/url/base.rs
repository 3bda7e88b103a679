use crate::document::Document;
use url::Url;

/// Determines the base URL that relative references in `document` resolve against
///
/// If the document declares `<base href="...">`, that href is resolved against
/// `page_url` (it may itself be relative). Otherwise the base is the directory of
/// `page_url`, i.e. its path with the last segment removed.
///
/// # Examples
///
/// ```
/// use sumi_mirror::document::Document;
/// use sumi_mirror::url::determine_base_url;
/// use url::Url;
///
/// let page = Url::parse("https://a.com/docs/guide.html?v=2").unwrap();
///
/// let plain = Document::parse(b"<html><body></body></html>");
/// assert_eq!(determine_base_url(&page, &plain).as_str(), "https://a.com/docs/");
///
/// let with_base = Document::parse(br#"<html><head><base href="/static/"></head></html>"#);
/// assert_eq!(determine_base_url(&page, &with_base).as_str(), "https://a.com/static/");
/// ```
pub fn determine_base_url(page_url: &Url, document: &Document) -> Url {
    let declared = document
        .first_attr("base[href]", "href")
        .ok()
        .flatten()
        .and_then(|href| page_url.join(href.trim()).ok());

    if let Some(base) = declared {
        return base;
    }

    page_url.join(".").unwrap_or_else(|_| page_url.clone())
}
