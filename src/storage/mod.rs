//! Storage module for persisting mirrored pages
//!
//! This module handles everything written to disk for a fetched page:
//! - the rewritten HTML document at `<root>/<docName>.html`
//! - the page metadata at `<root>/<docName>.json`
//! - downloaded assets under `<root>/<docName>/...`
//!
//! The document name is derived from the final (post-redirect) page URL, see
//! [`document_name`].

mod error;
mod file_store;
mod naming;

pub use error::{StorageError, StorageResult};
pub use file_store::{AssetLocator, FileStore};
pub use naming::{asset_relative_path, cap_len, document_name, sanitize_file_name};
