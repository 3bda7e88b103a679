//! Mirroring of embedded page resources
//!
//! This module decides which resources referenced by a page get a local copy and
//! rewrites the document so it points at those copies.

mod asset;
mod rewriter;

pub use asset::EmbeddedAsset;
pub use rewriter::{rewrite_assets, RewriteOutcome, ASSET_TARGETS, BLIND_ATTRIBUTES};

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How asset URLs are rewritten when mirroring is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MirrorMode {
    /// Same-origin images, stylesheets and scripts are downloaded and pointed at their
    /// local copies; everything else is left as is
    #[default]
    Filtered,

    /// Every `src`, `href` and `data` attribute is made absolute; nothing is downloaded
    Blind,
}

impl fmt::Display for MirrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered => f.write_str("filtered"),
            Self::Blind => f.write_str("blind"),
        }
    }
}

impl FromStr for MirrorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filtered" => Ok(Self::Filtered),
            "blind" => Ok(Self::Blind),
            other => Err(format!(
                "unknown mirror mode {:?}, expected \"filtered\" or \"blind\"",
                other
            )),
        }
    }
}
