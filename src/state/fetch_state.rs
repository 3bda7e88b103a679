/// Pipeline state definitions for tracking a single fetch
///
/// This module defines every state a submitted URL can be in while it is being mirrored.
use crate::MirrorError;
use std::fmt;

/// Represents the current state of a URL in the mirroring pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    // ===== Active States =====
    /// URL has been accepted by the fetcher
    Submitted,

    /// Page request is in flight
    Requesting,

    /// A 2xx response with an HTML content type arrived
    Responded,

    /// Body is being parsed into a document
    Parsing,

    /// Metadata was extracted and merged with the previous fetch
    MetadataMerged,

    /// Asset URLs are being rewritten to local references
    Rewriting,

    /// Same-origin assets are being downloaded
    Downloading,

    /// Document, assets and metadata are being written to the store
    Persisting,

    // ===== Terminal States =====
    /// Page was mirrored successfully
    Succeeded,

    /// Pipeline aborted; the cause travels in the fetch result
    Failed,
}

impl FetchState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the pipeline may move from `self` to `next`
    ///
    /// Any active state may fail. Mirroring is optional, so `MetadataMerged` may jump
    /// straight to `Persisting`, and a rewrite that collected no downloads (blind mode)
    /// may skip `Downloading`.
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        use FetchState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (Submitted, Requesting)
                | (Requesting, Responded)
                | (Responded, Parsing)
                | (Parsing, MetadataMerged)
                | (MetadataMerged, Rewriting)
                | (MetadataMerged, Persisting)
                | (Rewriting, Downloading)
                | (Rewriting, Persisting)
                | (Downloading, Persisting)
                | (Persisting, Succeeded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Requesting => "requesting",
            Self::Responded => "responded",
            Self::Parsing => "parsing",
            Self::MetadataMerged => "metadata_merged",
            Self::Rewriting => "rewriting",
            Self::Downloading => "downloading",
            Self::Persisting => "persisting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the state of one URL and rejects illegal transitions
#[derive(Debug)]
pub struct StateTracker {
    url: String,
    state: FetchState,
}

impl StateTracker {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: FetchState::Submitted,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// Moves to `next`, logging the transition
    pub fn advance(&mut self, next: FetchState) -> Result<(), MirrorError> {
        if !self.state.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(url = %self.url, from = %self.state, to = %next, "state transition");
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(url = %self.url, from = %self.state, "state transition to failed");
            self.state = FetchState::Failed;
        }
    }
}
