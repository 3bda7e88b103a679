//! Throttled HTTP transport
//!
//! Every request the fetcher makes, pages and assets alike, goes through a single
//! [`ThrottledClient`]. It handles:
//! - Building the HTTP client with the configured user agent and timeout
//! - A global concurrency gate (0 = unlimited)
//! - Cancellation while waiting on the gate or on the request
//! - Error classification (timeout vs. other transport failures)
//!
//! There is no retry: a failed attempt is reported as-is.

use crate::{ConfigError, ConfigResult, MirrorError};
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("sumi-mirror/", env!("CARGO_PKG_VERSION"));

/// Builds an HTTP client with the given identity and timeout
///
/// Redirects are followed with reqwest's default policy; the final URL is available
/// on the response.
///
/// # Example
///
/// ```no_run
/// use sumi_mirror::fetcher::{build_http_client, DEFAULT_TIMEOUT};
///
/// let client = build_http_client("sumi-mirror/0.1", DEFAULT_TIMEOUT).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// In-flight request counters
///
/// `peak` is the highest number of requests ever executing at once.
#[derive(Debug, Default)]
pub struct TransportStats {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl TransportStats {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Requests issued so far
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            stats: Arc::clone(self),
        }
    }
}

#[derive(Debug)]
struct InFlightGuard {
    stats: Arc<TransportStats>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// HTTP client behind a bounded-concurrency gate
///
/// Cloning is cheap and clones share the gate and the stats.
#[derive(Debug, Clone)]
pub struct ThrottledClient {
    client: Client,
    gate: Option<Arc<Semaphore>>,
    max_concurrent: usize,
    stats: Arc<TransportStats>,
}

impl ThrottledClient {
    /// Creates a transport allowing `max_concurrent` requests at once (0 = unlimited)
    pub fn new(
        max_concurrent: usize,
        timeout: Duration,
        user_agent: &str,
    ) -> ConfigResult<Self> {
        let client = build_http_client(user_agent, timeout).map_err(ConfigError::HttpClient)?;
        Ok(Self::with_client(client, max_concurrent))
    }

    /// Wraps an existing client
    pub fn with_client(client: Client, max_concurrent: usize) -> Self {
        let gate = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));

        Self {
            client,
            gate,
            max_concurrent,
            stats: Arc::new(TransportStats::default()),
        }
    }

    /// Configured limit, 0 when unlimited
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> &Arc<TransportStats> {
        &self.stats
    }

    /// Sends a GET request for `url`
    ///
    /// Waits for a free slot first. If `cancel` fires while waiting, or while the
    /// request is in flight, the call fails with [`MirrorError::Cancelled`]; a token
    /// that is already cancelled means no request is sent at all.
    ///
    /// The slot stays taken until the returned response is dropped or its body read.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        url: &Url,
    ) -> Result<ThrottledResponse, MirrorError> {
        let permit = match &self.gate {
            Some(gate) => {
                let gate = Arc::clone(gate);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(url)),
                    permit = gate.acquire_owned() => Some(permit.map_err(|_| cancelled(url))?),
                }
            }
            None => None,
        };

        if cancel.is_cancelled() {
            return Err(cancelled(url));
        }

        let guard = self.stats.enter();
        tracing::trace!(url = %url, in_flight = self.stats.in_flight(), "sending request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(url)),
            result = self.client.get(url.clone()).send() => {
                result.map_err(|e| classify_error(url, e))?
            }
        };

        Ok(ThrottledResponse {
            response,
            _permit: permit,
            _guard: guard,
        })
    }
}

/// A response that still holds its concurrency slot
#[derive(Debug)]
pub struct ThrottledResponse {
    response: Response,
    _permit: Option<OwnedSemaphorePermit>,
    _guard: InFlightGuard,
}

impl ThrottledResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Final URL, after redirects
    pub fn url(&self) -> &Url {
        self.response.url()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Raw `Content-Type` header value, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Reads the whole body, then releases the slot
    pub async fn bytes(self, cancel: &CancellationToken) -> Result<Bytes, MirrorError> {
        let url = self.response.url().clone();
        let Self {
            response,
            _permit,
            _guard,
        } = self;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(&url)),
            result = response.bytes() => result.map_err(|e| classify_error(&url, e)),
        }
    }
}

fn cancelled(url: &Url) -> MirrorError {
    MirrorError::Cancelled {
        url: url.to_string(),
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> MirrorError {
    if error.is_timeout() {
        MirrorError::Timeout {
            url: url.to_string(),
        }
    } else {
        MirrorError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
