use crate::fetcher::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::mirror::MirrorMode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Mirror
///
/// Every section and key is optional; anything missing takes its default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Fetch pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Run each URL in its own task instead of inline in `submit`
    #[serde(rename = "async")]
    pub asynchronous: bool,

    /// Download same-origin assets and rewrite the document to reference them
    pub mirror: bool,

    /// How asset references are rewritten when mirroring
    pub mirror_mode: MirrorMode,

    /// Maximum concurrent HTTP requests, pages and assets together (0 = unlimited)
    pub max_concurrent_requests: usize,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            asynchronous: true,
            mirror: false,
            mirror_mode: MirrorMode::default(),
            max_concurrent_requests: 0,
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory mirrored pages are written to
    pub store_root: Option<PathBuf>,
}
