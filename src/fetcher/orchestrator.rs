//! Fetch orchestration - the per-URL mirroring pipeline
//!
//! This module drives every submitted URL through:
//! - Requesting the page through the throttled transport
//! - Checking the status code and content type
//! - Parsing, extracting metadata and merging it with the previous fetch
//! - Rewriting asset references (when mirroring)
//! - Downloading same-origin assets, one at a time per page
//! - Persisting assets, document and metadata
//! - Dispatching completion callbacks
//!
//! A failure stops only the URL it happened on.

use crate::config::FetcherConfig;
use crate::document::{extract_metadata, Document, Metadata};
use crate::fetcher::transport::ThrottledClient;
use crate::fetcher::{FetchResult, ResponseSummary};
use crate::mirror::{rewrite_assets, EmbeddedAsset, MirrorMode};
use crate::state::{FetchState, StateTracker};
use crate::storage::{FileStore, StorageError};
use crate::url::normalize_url;
use crate::{MirrorError, Result, ResultExt};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Observer invoked once per URL that reaches a terminal state
pub type CompletionCallback = Box<dyn Fn(&FetchResult) + Send + Sync>;

type Callbacks = Arc<RwLock<Vec<CompletionCallback>>>;

/// Mirrors submitted URLs into a store root
///
/// Register callbacks with [`Fetcher::on_complete`] before submitting URLs.
pub struct Fetcher {
    pipeline: Pipeline,
    asynchronous: bool,
    callbacks: Callbacks,
    submitted: HashSet<String>,
    tasks: JoinSet<()>,
}

/// Everything a pipeline run needs, shared between tasks
#[derive(Clone)]
struct Pipeline {
    client: ThrottledClient,
    store_root: Arc<PathBuf>,
    mirror: bool,
    mirror_mode: MirrorMode,
    /// Document name -> final URL that claimed it during this run
    names: Arc<Mutex<HashMap<String, String>>>,
    cancel: CancellationToken,
}

/// A page ready to be written, produced without holding the parsed tree across awaits
struct PreparedPage {
    metadata: Metadata,
    html: Vec<u8>,
    assets: Vec<EmbeddedAsset>,
}

impl Fetcher {
    /// Creates a fetcher writing under `store_root`
    pub fn new(config: &FetcherConfig, store_root: impl Into<PathBuf>) -> Result<Self> {
        let client = ThrottledClient::new(
            config.max_concurrent_requests,
            config.request_timeout(),
            &config.user_agent,
        )?;

        Ok(Self::with_client(config, client, store_root))
    }

    /// Creates a fetcher around an existing transport
    pub fn with_client(
        config: &FetcherConfig,
        client: ThrottledClient,
        store_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                client,
                store_root: Arc::new(store_root.into()),
                mirror: config.mirror,
                mirror_mode: config.mirror_mode,
                names: Arc::new(Mutex::new(HashMap::new())),
                cancel: CancellationToken::new(),
            },
            asynchronous: config.asynchronous,
            callbacks: Arc::new(RwLock::new(Vec::new())),
            submitted: HashSet::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Registers a callback fired with every terminal [`FetchResult`]
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: Fn(&FetchResult) + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// Token cancelling every outstanding and future request of this fetcher
    pub fn cancellation_token(&self) -> CancellationToken {
        self.pipeline.cancel.clone()
    }

    pub fn client(&self) -> &ThrottledClient {
        &self.pipeline.client
    }

    /// Submits a URL for mirroring
    ///
    /// Returns `Ok(false)` if the URL (after normalization) was already submitted,
    /// `Ok(true)` once it is accepted. Malformed URLs are rejected before any request.
    ///
    /// In async mode the pipeline runs in its own task; wait for it with
    /// [`Fetcher::await_all`]. In sync mode it runs to completion here and a pipeline
    /// failure is returned as well as reported to the callbacks.
    pub async fn submit(&mut self, raw_url: &str) -> Result<bool> {
        let url = normalize_url(raw_url).map_err(|source| MirrorError::InvalidUrl {
            url: raw_url.to_string(),
            source,
        })?;

        if !self.submitted.insert(url.to_string()) {
            tracing::debug!(url = %url, "skipping duplicate submission");
            return Ok(false);
        }

        let pipeline = self.pipeline.clone();
        let callbacks = Arc::clone(&self.callbacks);

        if self.asynchronous {
            self.tasks.spawn(async move {
                let task_url = url.clone();
                let result = run_guarded(task_url, async move { pipeline.run(url).await }).await;
                dispatch(&callbacks, &result);
            });
            return Ok(true);
        }

        let result = pipeline.run(url).await;
        dispatch(&callbacks, &result);
        match result.error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    /// Waits until every submitted URL has reached a terminal state
    pub async fn await_all(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Fetch task ended abnormally: {}", e);
            }
        }
    }
}

/// Runs `pipeline` in its own task so a panic still yields a Failed result for `url`
async fn run_guarded<F>(url: Url, pipeline: F) -> FetchResult
where
    F: Future<Output = FetchResult> + Send + 'static,
{
    match tokio::spawn(pipeline).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(url = %url, "fetch task ended abnormally: {}", e);
            FetchResult {
                url: url.to_string(),
                metadata: None,
                response: None,
                assets: 0,
                error: Some(MirrorError::TaskFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
                state: FetchState::Failed,
            }
        }
    }
}

/// Writes assets, then the document
///
/// Records in `created` every asset path that did not exist before, so a failed
/// attempt can remove what it added without touching files an earlier copy of the
/// page still references.
async fn persist_content(
    store: &FileStore,
    assets: Vec<EmbeddedAsset>,
    html: &[u8],
    created: &mut Vec<PathBuf>,
    saved_assets: &mut usize,
) -> Result<()> {
    for asset in assets {
        let existed = tokio::fs::try_exists(store.asset_file_path(&asset))
            .await
            .unwrap_or(true);
        let path = store
            .save_asset(asset)
            .await
            .context("failed to save asset")?;
        tracing::debug!(path = %path.display(), "asset saved");
        if !existed {
            created.push(path);
        }
        *saved_assets += 1;
    }

    store
        .save_document(html)
        .await
        .context("failed to save document")
}

/// Hands `result` to every callback; a panicking callback does not starve the rest
fn dispatch(callbacks: &Callbacks, result: &FetchResult) {
    let callbacks = callbacks.read().unwrap_or_else(PoisonError::into_inner);
    for (index, callback) in callbacks.iter().enumerate() {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
            tracing::warn!(url = %result.url, callback = index, "completion callback panicked");
        }
    }
}

impl Pipeline {
    /// Runs one URL to a terminal state
    async fn run(&self, url: Url) -> FetchResult {
        let mut tracker = StateTracker::new(url.as_str());
        let mut response = None;
        let mut assets = 0;

        let outcome = self
            .mirror_page(&url, &mut tracker, &mut response, &mut assets)
            .await;

        match outcome {
            Ok(metadata) => FetchResult {
                url: url.to_string(),
                metadata: Some(metadata),
                response,
                assets,
                error: None,
                state: tracker.state(),
            },
            Err(e) => {
                tracker.fail();
                tracing::debug!(url = %url, kind = %e.kind(), "pipeline failed: {}", e);
                FetchResult {
                    url: url.to_string(),
                    metadata: None,
                    response,
                    assets: 0,
                    error: Some(e),
                    state: tracker.state(),
                }
            }
        }
    }

    async fn mirror_page(
        &self,
        url: &Url,
        tracker: &mut StateTracker,
        summary: &mut Option<ResponseSummary>,
        saved_assets: &mut usize,
    ) -> Result<Metadata> {
        tracker.advance(FetchState::Requesting)?;
        let response = self
            .client
            .execute(&self.cancel, url)
            .await
            .context("failed to fetch page")?;

        let final_url = response.url().clone();
        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::BadStatus {
                url: final_url.to_string(),
                status: status.as_u16(),
            }
            .context("failed to fetch page"));
        }

        let content_type = response.content_type().unwrap_or_default().to_string();
        if !content_type.to_ascii_lowercase().contains("html") {
            return Err(MirrorError::UnsupportedContentType {
                url: final_url.to_string(),
                content_type,
            }
            .context("failed to fetch page"));
        }
        tracker.advance(FetchState::Responded)?;

        // Read once; the same buffer feeds the parser and the response summary
        let body = response
            .bytes(&self.cancel)
            .await
            .context("failed to read page body")?;
        *summary = Some(ResponseSummary {
            final_url: final_url.clone(),
            status: status.as_u16(),
            content_type,
            body_len: body.len(),
        });

        let store = FileStore::new(self.store_root.as_path(), &final_url);
        self.claim_name(&store, &final_url)
            .context("failed to reserve document name")?;

        let prior = store
            .load_metadata()
            .await
            .context("failed to load prior metadata")?;

        tracker.advance(FetchState::Parsing)?;
        let page = self.prepare(&body, &final_url, prior.as_ref(), &store, tracker)?;

        let mut downloaded = Vec::with_capacity(page.assets.len());
        if !page.assets.is_empty() {
            tracker.advance(FetchState::Downloading)?;
            for asset in page.assets {
                downloaded.push(self.download_asset(asset).await?);
            }
        }

        tracker.advance(FetchState::Persisting)?;
        let mut created = Vec::new();
        if let Err(e) =
            persist_content(&store, downloaded, &page.html, &mut created, saved_assets).await
        {
            let removed = store.discard_assets(&created).await;
            tracing::debug!(url = %url, removed, "discarded assets of failed page");
            *saved_assets = 0;
            return Err(e);
        }
        store
            .save_metadata(&page.metadata)
            .await
            .context("failed to save metadata")?;

        tracker.advance(FetchState::Succeeded)?;
        tracing::info!(
            url = %url,
            document = store.doc_name(),
            links = page.metadata.num_links,
            images = page.metadata.num_images,
            assets = *saved_assets,
            "page saved"
        );

        Ok(page.metadata)
    }

    /// Parses, extracts and merges metadata, then rewrites when mirroring
    ///
    /// Synchronous so the parsed tree never lives across an await point.
    fn prepare(
        &self,
        body: &[u8],
        page_url: &Url,
        prior: Option<&Metadata>,
        store: &FileStore,
        tracker: &mut StateTracker,
    ) -> Result<PreparedPage> {
        let mut document = Document::parse(body);

        let metadata = extract_metadata(&document)
            .context("failed to extract metadata")?
            .merge(prior)
            .context("failed to merge prior metadata")?;
        tracker.advance(FetchState::MetadataMerged)?;

        let assets = if self.mirror {
            tracker.advance(FetchState::Rewriting)?;
            let outcome = rewrite_assets(&mut document, page_url, self.mirror_mode, store)
                .context("failed to rewrite assets")?;
            tracing::debug!(
                url = %page_url,
                rewritten = outcome.rewritten,
                assets = outcome.assets.len(),
                "document rewritten"
            );
            outcome.assets
        } else {
            Vec::new()
        };

        Ok(PreparedPage {
            metadata,
            html: document.serialize(),
            assets,
        })
    }

    async fn download_asset(&self, asset: EmbeddedAsset) -> Result<EmbeddedAsset> {
        let context = format!("failed to download asset {}", asset.url);

        let response = self
            .client
            .execute(&self.cancel, &asset.url)
            .await
            .map_err(|e| e.context(context.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::BadStatus {
                url: asset.url.to_string(),
                status: status.as_u16(),
            }
            .context(context));
        }

        let data = response
            .bytes(&self.cancel)
            .await
            .map_err(|e| e.context(context.as_str()))?;
        tracing::debug!(asset = %asset.url, bytes = data.len(), "asset downloaded");

        Ok(asset.with_data(data))
    }

    /// Records that `final_url` owns its document name for this run
    ///
    /// Fails if a different URL already produced the same name.
    fn claim_name(&self, store: &FileStore, final_url: &Url) -> std::result::Result<(), StorageError> {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);

        match names.entry(store.doc_name().to_string()) {
            Entry::Occupied(entry) if entry.get() != final_url.as_str() => {
                Err(StorageError::NameCollision {
                    name: entry.key().clone(),
                    existing: entry.get().clone(),
                    url: final_url.to_string(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(final_url.to_string());
                Ok(())
            }
        }
    }
}
