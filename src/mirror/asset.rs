use bytes::Bytes;
use url::Url;

/// A resource referenced by a page and selected for a local copy
///
/// Created with only its URL while the document is rewritten; the body is attached
/// once downloaded, after which the asset is handed to the store by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedAsset {
    /// Absolute URL the asset resolved to
    pub url: Url,

    /// Downloaded body, if fetched yet
    pub data: Option<Bytes>,
}

impl EmbeddedAsset {
    pub fn new(url: Url) -> Self {
        Self { url, data: None }
    }

    /// Attaches the downloaded body
    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }
}
