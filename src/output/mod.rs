//! Output module for reporting mirroring results
//!
//! This module handles:
//! - Per-page metadata reports for the command line
//! - Recording run statistics from completion callbacks

pub mod stats;

pub use stats::{log_statistics, RunStatistics};

use crate::fetcher::FetchResult;

/// Formats the metadata of a successful fetch for printing
///
/// Returns `None` for failed fetches. `last_fetch` reads `never` on a first fetch.
///
/// # Example
///
/// ```text
/// site: https://a.com/
/// num_links: 4
/// images: 1
/// last_fetch: 2024-05-01T10:00:00+00:00
/// ```
pub fn metadata_report(result: &FetchResult) -> Option<String> {
    if !result.is_success() {
        return None;
    }
    let metadata = result.metadata.as_ref()?;
    let last_fetch = metadata
        .last_fetched_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    Some(format!(
        "site: {}\nnum_links: {}\nimages: {}\nlast_fetch: {}",
        result.url, metadata.num_links, metadata.num_images, last_fetch
    ))
}
