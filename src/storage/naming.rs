//! Deterministic file naming for stored pages and assets

use sha2::{Digest, Sha256};
use url::Url;

/// Longest document name kept before it is shortened
const MAX_NAME_LEN: usize = 200;

/// Longest single asset path segment kept before it is shortened
const MAX_SEGMENT_LEN: usize = 120;

/// Hex digits of the digest appended to a shortened name
const DIGEST_LEN: usize = 16;

/// Appended to asset file names that carry no `.` of their own
const LEAF_SUFFIX: &str = ".bin";

/// Derives the document name for a page from its final URL
///
/// The name is `host[:port] + path`, with `+query` appended when the URL has a query
/// (distinct queries usually mean distinct pages). The fragment is ignored and a
/// trailing `/` is trimmed. The result is sanitized into a single file name and
/// shortened with [`cap_len`] when it is too long.
///
/// # Examples
///
/// ```
/// use sumi_mirror::storage::document_name;
/// use url::Url;
///
/// let url = Url::parse("https://Example.com/blog/post?id=7#comments").unwrap();
/// assert_eq!(document_name(&url), "example.com_blog_post+id=7");
///
/// let root = Url::parse("http://localhost:8080/").unwrap();
/// assert_eq!(document_name(&root), "localhost_8080");
/// ```
pub fn document_name(url: &Url) -> String {
    let mut name = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        name.push(':');
        name.push_str(&port.to_string());
    }

    name.push_str(url.path().trim_end_matches('/'));

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        name.push('+');
        name.push_str(query);
    }

    cap_len(sanitize_file_name(&name), MAX_NAME_LEN)
}

/// Derives the path of an asset relative to its page's asset directory
///
/// Each URL path segment is sanitized on its own; `.`, `..` and empty segments are
/// dropped. A URL ending in `/` is stored as `index` inside that directory, and a
/// query is appended to the last segment as `+query`.
///
/// The scheme is prefix-free: directory segments never contain `.` (dots become
/// `_`), while the file name always does (`.bin` is appended when it has none).
/// So `/img` and `/img/x.png` land on `img.bin` and `img/x.png` and never fight
/// over one path. Segments longer than 120 bytes are shortened with [`cap_len`].
///
/// # Examples
///
/// ```
/// use sumi_mirror::storage::asset_relative_path;
/// use url::Url;
///
/// let url = Url::parse("https://a.com/static/css/site.css?v=3").unwrap();
/// assert_eq!(asset_relative_path(&url), vec!["static", "css", "site.css+v=3"]);
///
/// let url = Url::parse("https://a.com/v1.2/img").unwrap();
/// assert_eq!(asset_relative_path(&url), vec!["v1_2", "img.bin"]);
/// ```
pub fn asset_relative_path(url: &Url) -> Vec<String> {
    let mut segments: Vec<String> = url
        .path_segments()
        .map(|parts| {
            parts
                .filter(|s| !s.is_empty() && *s != "." && *s != "..")
                .map(sanitize_file_name)
                .collect()
        })
        .unwrap_or_default();

    let mut leaf = if segments.is_empty() || url.path().ends_with('/') {
        "index".to_string()
    } else {
        segments.pop().unwrap_or_default()
    };

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        leaf.push('+');
        leaf.push_str(&sanitize_file_name(query));
    }

    let mut leaf = cap_len(leaf, MAX_SEGMENT_LEN);
    if !leaf.contains('.') {
        leaf.push_str(LEAF_SUFFIX);
    }

    let mut path: Vec<String> = segments
        .into_iter()
        .map(|dir| cap_len(dir.replace('.', "_"), MAX_SEGMENT_LEN))
        .collect();
    path.push(leaf);
    path
}

/// Shortens `name` to at most `limit` bytes, keeping distinct names distinct
///
/// A name within the limit is returned unchanged. A longer one keeps its head and
/// ends with `-` plus the first 16 hex digits of the SHA-256 of the full name.
/// `name` must be ASCII, which [`sanitize_file_name`] guarantees.
pub fn cap_len(mut name: String, limit: usize) -> String {
    if name.len() <= limit {
        return name;
    }

    let mut digest = hex::encode(Sha256::digest(name.as_bytes()));
    digest.truncate(DIGEST_LEN);

    name.truncate(limit.saturating_sub(DIGEST_LEN + 1));
    name.push('-');
    name.push_str(&digest);
    name
}

/// Replaces characters that are unsafe in file names
///
/// Everything outside `[A-Za-z0-9._+=-]` becomes `_`, and leading dots are removed
/// so the result can never be `.`, `..` or a hidden file. An empty result becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
