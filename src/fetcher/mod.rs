//! Fetcher module for mirroring pages
//!
//! This module contains the fetch pipeline, including:
//! - The throttled HTTP transport shared by page and asset requests
//! - The orchestrator that runs fetch, parse, rewrite, download and persist per URL
//! - The [`FetchResult`] handed to completion callbacks

mod orchestrator;
mod transport;

pub use orchestrator::{CompletionCallback, Fetcher};
pub use transport::{
    build_http_client, ThrottledClient, ThrottledResponse, TransportStats, DEFAULT_TIMEOUT,
    DEFAULT_USER_AGENT,
};

use crate::document::Metadata;
use crate::state::FetchState;
use crate::MirrorError;
use url::Url;

/// Outcome of mirroring one submitted URL
#[derive(Debug)]
pub struct FetchResult {
    /// The URL as submitted, after normalization
    pub url: String,

    /// Merged metadata; absent on failure
    pub metadata: Option<Metadata>,

    /// What the page response looked like, if one arrived
    pub response: Option<ResponseSummary>,

    /// Number of assets written next to the document
    pub assets: usize,

    /// Why the pipeline stopped, if it failed
    pub error: Option<MirrorError>,

    /// Terminal state reached
    pub state: FetchState,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The parts of a page response kept after the body has been consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    /// URL the response was served from, after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: String,
    pub body_len: usize,
}
