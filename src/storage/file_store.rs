//! Filesystem store for one mirrored page

use crate::document::Metadata;
use crate::mirror::EmbeddedAsset;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::naming::{asset_relative_path, document_name};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use url::Url;

/// Computes the reference written into a document for a local asset copy
///
/// Must be pure: the rewriter calls it before the asset is downloaded.
pub trait AssetLocator {
    fn local_reference(&self, asset: &EmbeddedAsset) -> String;
}

/// Stores the document, metadata and assets of a single page under a root directory
///
/// Layout, for a document name `docName`:
///
/// ```text
/// <root>/<docName>.html     rewritten HTML
/// <root>/<docName>.json     metadata
/// <root>/<docName>/...      assets, one file per asset URL
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    doc_name: String,
}

impl FileStore {
    /// Creates a store for the page served from `page_url`
    ///
    /// `page_url` should be the final URL after redirects.
    pub fn new(root: impl Into<PathBuf>, page_url: &Url) -> Self {
        Self {
            root: root.into(),
            doc_name: document_name(page_url),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn doc_name(&self) -> &str {
        &self.doc_name
    }

    /// `<root>/<docName>.html`
    pub fn document_path(&self) -> PathBuf {
        self.root.join(format!("{}.html", self.doc_name))
    }

    /// `<root>/<docName>.json`
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.doc_name))
    }

    /// `<root>/<docName>/`
    pub fn asset_dir(&self) -> PathBuf {
        self.root.join(&self.doc_name)
    }

    /// Absolute path an asset is written to
    pub fn asset_file_path(&self, asset: &EmbeddedAsset) -> PathBuf {
        asset_relative_path(&asset.url)
            .iter()
            .fold(self.asset_dir(), |path, segment| path.join(segment))
    }

    /// Writes the serialized document
    pub async fn save_document(&self, content: &[u8]) -> StorageResult<()> {
        write_file(&self.document_path(), content).await
    }

    /// Writes the page metadata as JSON
    pub async fn save_metadata(&self, metadata: &Metadata) -> StorageResult<()> {
        let path = self.metadata_path();
        let content =
            serde_json::to_vec(metadata).map_err(|source| StorageError::Serialization {
                path: path.clone(),
                source,
            })?;
        write_file(&path, &content).await
    }

    /// Loads the metadata persisted by a previous fetch
    ///
    /// A missing file means the page was never fetched and yields `Ok(None)`; an
    /// unreadable or malformed file is an error.
    pub async fn load_metadata(&self) -> StorageResult<Option<Metadata>> {
        let path = self.metadata_path();
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StorageError::Serialization { path, source })
    }

    /// Writes a downloaded asset, creating intermediate directories
    ///
    /// The asset is consumed. Returns the path written.
    pub async fn save_asset(&self, asset: EmbeddedAsset) -> StorageResult<PathBuf> {
        let path = self.asset_file_path(&asset);
        let data = asset.data.ok_or_else(|| StorageError::MissingAssetData {
            url: asset.url.to_string(),
        })?;

        write_file(&path, &data).await?;
        Ok(path)
    }

    /// Removes asset files written by a failed attempt, best effort
    ///
    /// Directories left empty are removed too, up to and including the asset
    /// directory. Returns the number of files removed.
    pub async fn discard_assets(&self, paths: &[PathBuf]) -> usize {
        let asset_dir = self.asset_dir();
        let mut removed = 0;

        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!(path = %path.display(), "could not remove asset: {}", e);
                continue;
            }
            removed += 1;

            let mut dir = path.parent();
            while let Some(current) = dir.filter(|d| d.starts_with(&asset_dir)) {
                if tokio::fs::remove_dir(current).await.is_err() {
                    break;
                }
                dir = current.parent();
            }
        }

        removed
    }
}

impl AssetLocator for FileStore {
    /// `<docName>/<segments...>`, relative to the directory holding the HTML file
    fn local_reference(&self, asset: &EmbeddedAsset) -> String {
        let mut reference = self.doc_name.clone();
        for segment in asset_relative_path(&asset.url) {
            reference.push('/');
            reference.push_str(&segment);
        }
        reference
    }
}

async fn write_file(path: &Path, content: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| StorageError::io(path, e))
}
