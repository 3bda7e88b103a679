//! URL handling module for Sumi-Mirror
//!
//! This module provides submission normalization, base URL determination for
//! relative references, and same-origin classification of asset URLs.

mod base;
mod classify;
mod normalize;

// Re-export main functions
pub use base::determine_base_url;
pub use classify::{resolve_and_classify, same_host, AssetUrl};
pub use normalize::normalize_url;
