//! Statistics gathered over a mirroring run
//!
//! This module provides functionality for tallying fetch results as they
//! complete and reporting the totals at the end of a run.

use crate::fetcher::FetchResult;
use crate::ErrorKind;
use std::collections::HashMap;

/// Mirroring run statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Pages mirrored successfully
    pub succeeded: u64,

    /// Pages that failed
    pub failed: u64,

    /// Anchors counted across successful pages
    pub total_links: u64,

    /// Images counted across successful pages
    pub total_images: u64,

    /// Assets written next to successful pages
    pub assets_saved: u64,

    /// Failure counts by error kind
    pub errors_by_kind: HashMap<ErrorKind, u64>,
}

impl RunStatistics {
    /// Adds one terminal result to the totals
    pub fn record(&mut self, result: &FetchResult) {
        match &result.error {
            None => {
                self.succeeded += 1;
                if let Some(metadata) = &result.metadata {
                    self.total_links += metadata.num_links as u64;
                    self.total_images += metadata.num_images as u64;
                }
                self.assets_saved += result.assets as u64;
            }
            Some(e) => {
                self.failed += 1;
                *self.errors_by_kind.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Percentage of pages mirrored successfully, 0 when nothing ran
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total() as f64) * 100.0
        }
    }
}

/// Logs the run totals
///
/// # Arguments
///
/// * `stats` - The statistics to report
pub fn log_statistics(stats: &RunStatistics) {
    tracing::info!(
        "Run complete: {} succeeded, {} failed ({:.1}% success)",
        stats.succeeded,
        stats.failed,
        stats.success_rate()
    );
    tracing::info!(
        "Totals: {} links, {} images, {} assets saved",
        stats.total_links,
        stats.total_images,
        stats.assets_saved
    );

    if !stats.errors_by_kind.is_empty() {
        let mut error_counts: Vec<_> = stats.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));

        for (kind, count) in error_counts {
            tracing::info!("  {}: {}", kind, count);
        }
    }
}
