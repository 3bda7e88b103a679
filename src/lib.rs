//! Sumi-Mirror: offline mirrors of web pages
//!
//! This crate fetches HTML documents, rewrites their embedded resource URLs so the
//! page renders from local disk, downloads same-origin assets, and keeps per-page
//! metadata (link/image counts, fetch timestamps) across repeated fetches.

pub mod config;
pub mod document;
pub mod fetcher;
pub mod mirror;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Main error type for Sumi-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid URL {url}: {source}")]
    InvalidUrl { url: String, source: UrlError },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("bad HTTP status code {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("response content type expected HTML got {content_type:?} for {url}")]
    UnsupportedContentType { url: String, content_type: String },

    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("unusable stored metadata: {0}")]
    InvalidMetadata(String),

    #[error("fetch task for {url} failed: {message}")]
    TaskFailed { url: String, message: String },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::FetchState,
        to: state::FetchState,
    },

    #[error("{message}: {source}")]
    Context {
        message: String,
        source: Box<MirrorError>,
    },
}

/// Coarse classification of a [`MirrorError`], independent of context layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    Transport,
    BadStatus,
    UnsupportedContentType,
    Parse,
    Storage,
    Serialization,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidUrl => "invalid_url",
            Self::Transport => "transport",
            Self::BadStatus => "bad_status",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::Parse => "parse",
            Self::Storage => "storage",
            Self::Serialization => "serialization",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl MirrorError {
    /// Wraps this error with a message describing the operation that failed
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any context layers
    pub fn root(&self) -> &MirrorError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classifies the error by its root cause
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::Http { .. } | Self::Timeout { .. } | Self::Cancelled { .. } => {
                ErrorKind::Transport
            }
            Self::BadStatus { .. } => ErrorKind::BadStatus,
            Self::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Storage(storage::StorageError::Serialization { .. })
            | Self::InvalidMetadata(_) => ErrorKind::Serialization,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::TaskFailed { .. } | Self::InvalidTransition { .. } | Self::Context { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

/// Adds `.context(..)` to results carrying a [`MirrorError`]
pub trait ResultExt<T> {
    fn context(self, message: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<MirrorError>,
{
    fn context(self, message: &str) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("cannot determine store root: {0}")]
    StoreRoot(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use document::{Document, Metadata};
pub use fetcher::{FetchResult, Fetcher, ThrottledClient};
pub use mirror::{EmbeddedAsset, MirrorMode};
pub use state::FetchState;
pub use storage::FileStore;
