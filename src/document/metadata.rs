use crate::document::Document;
use crate::MirrorError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Facts recorded about a fetched page
///
/// Serialized with the field names `NumLinks`, `NumImages`, `LastFetchedAt` and
/// `FetchedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    /// Number of anchor elements in the page
    pub num_links: usize,

    /// Number of image elements in the page
    pub num_images: usize,

    /// When the page was fetched before this fetch, if ever
    #[serde(default)]
    pub last_fetched_at: Option<DateTime<Utc>>,

    /// When this fetch happened
    pub fetched_at: DateTime<Utc>,
}

impl Metadata {
    /// Merges freshly extracted metadata with what was persisted by the previous fetch
    ///
    /// Only the previous `fetched_at` carries forward, becoming `last_fetched_at`.
    pub fn merge(self, prior: Option<&Metadata>) -> Result<Metadata, MirrorError> {
        self.merge_at(prior, Utc::now())
    }

    /// Same as [`Metadata::merge`] with an explicit clock reading
    ///
    /// `fetched_at` always ends up strictly later than the prior `fetched_at`, even if
    /// the clock reads the same instant or has gone backwards. A prior `fetched_at` so
    /// late that nothing representable follows it is rejected.
    pub fn merge_at(
        mut self,
        prior: Option<&Metadata>,
        now: DateTime<Utc>,
    ) -> Result<Metadata, MirrorError> {
        self.fetched_at = now;
        self.last_fetched_at = None;

        if let Some(prior) = prior {
            if self.fetched_at <= prior.fetched_at {
                self.fetched_at = prior
                    .fetched_at
                    .checked_add_signed(Duration::microseconds(1))
                    .ok_or_else(|| {
                        MirrorError::InvalidMetadata(format!(
                            "previous fetch time {} leaves no later instant",
                            prior.fetched_at.to_rfc3339()
                        ))
                    })?;
            }
            self.last_fetched_at = Some(prior.fetched_at);
        }

        Ok(self)
    }
}

/// Counts anchors and images across the whole document
///
/// The result carries the current time as `fetched_at` and no history; call
/// [`Metadata::merge`] to attach the previous fetch.
pub fn extract_metadata(document: &Document) -> Result<Metadata, MirrorError> {
    Ok(Metadata {
        num_links: document.count("a")?,
        num_images: document.count("img")?,
        last_fetched_at: None,
        fetched_at: Utc::now(),
    })
}
