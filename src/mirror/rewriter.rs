//! Rewriting of asset-bearing attributes
//!
//! # Filtered mode
//!
//! Walks images (`src`), stylesheet links (`href`) and scripts (`src`). Each value is
//! resolved against the document's base URL; same-origin values are replaced with the
//! store's local reference and collected as [`EmbeddedAsset`]s (one per distinct URL),
//! while foreign or unparseable values are left untouched.
//!
//! Local references are relative to the saved HTML file, so a page that declares
//! `<base href>` and has at least one localized asset gets every other `src`, `href`
//! and `data` value made absolute against that base, and the base itself reset to
//! `./`. Remote references keep their target and local ones resolve to the store.
//!
//! # Blind mode
//!
//! Every `src`, `href` and `data` attribute on any element is replaced with its
//! absolute URL. No origin filter, no downloads.

use crate::document::Document;
use crate::mirror::{EmbeddedAsset, MirrorMode};
use crate::storage::AssetLocator;
use crate::url::{determine_base_url, resolve_and_classify, AssetUrl};
use crate::MirrorError;
use std::collections::HashSet;
use url::Url;

/// Selector and URL attribute for every construct whose resource gets mirrored
pub const ASSET_TARGETS: &[(&str, &str)] = &[
    ("img[src]", "src"),
    ("link[rel~=stylesheet][href]", "href"),
    ("script[src]", "src"),
];

/// Attributes rewritten in blind mode, on any element
pub const BLIND_ATTRIBUTES: &[&str] = &["src", "href", "data"];

/// Result of a rewrite pass
#[derive(Debug, Default)]
pub struct RewriteOutcome {
    /// Distinct assets to download, in first-seen order
    pub assets: Vec<EmbeddedAsset>,

    /// Number of attributes changed in the document
    pub rewritten: usize,
}

/// Rewrites asset URLs in `document` in a single pass
///
/// `page_url` is the URL the page was served from after redirects; it decides both
/// the base for relative references and which host counts as same-origin.
pub fn rewrite_assets(
    document: &mut Document,
    page_url: &Url,
    mode: MirrorMode,
    locator: &dyn AssetLocator,
) -> Result<RewriteOutcome, MirrorError> {
    let base = determine_base_url(page_url, document);
    tracing::trace!(page = %page_url, base = %base, mode = %mode, "rewriting assets");

    match mode {
        MirrorMode::Filtered => rewrite_filtered(document, &base, page_url, locator),
        MirrorMode::Blind => rewrite_blind(document, &base),
    }
}

fn rewrite_filtered(
    document: &mut Document,
    base: &Url,
    page_url: &Url,
    locator: &dyn AssetLocator,
) -> Result<RewriteOutcome, MirrorError> {
    let mut outcome = RewriteOutcome::default();
    let mut seen: HashSet<Url> = HashSet::new();
    let mut local_refs: HashSet<String> = HashSet::new();
    let declares_base = document.first_attr("base[href]", "href")?.is_some();

    for (selector, attr) in ASSET_TARGETS {
        let assets = &mut outcome.assets;
        let local_refs = &mut local_refs;
        let changed = document.rewrite_attr(selector, attr, |raw| {
            if raw.trim().is_empty() {
                return None;
            }

            match resolve_and_classify(base, raw, page_url) {
                AssetUrl::SameOrigin(mut url) => {
                    url.set_fragment(None);
                    let asset = EmbeddedAsset::new(url);
                    let local = locator.local_reference(&asset);
                    if seen.insert(asset.url.clone()) {
                        assets.push(asset);
                    }
                    local_refs.insert(local.clone());
                    Some(local)
                }
                AssetUrl::Foreign(url) => {
                    tracing::trace!(asset = %url, "skipping foreign asset");
                    None
                }
                AssetUrl::Invalid => {
                    tracing::trace!(value = raw, "skipping unparseable asset URL");
                    None
                }
            }
        })?;
        outcome.rewritten += changed;
    }

    if declares_base && !outcome.assets.is_empty() {
        outcome.rewritten += detach_base(document, base, &local_refs)?;
    }

    Ok(outcome)
}

/// Pins every non-local reference to `base`, then resets `<base href>` to `./`
fn detach_base(
    document: &mut Document,
    base: &Url,
    local_refs: &HashSet<String>,
) -> Result<usize, MirrorError> {
    let mut changed = 0;

    for attr in BLIND_ATTRIBUTES {
        let selector = format!(":not(base)[{}]", attr);
        changed += document.rewrite_attr(&selector, attr, |raw| {
            if local_refs.contains(raw) {
                return None;
            }
            absolutize(base, raw)
        })?;
    }

    changed += document.rewrite_attr("base[href]", "href", |current| {
        (current != "./").then(|| "./".to_string())
    })?;
    tracing::trace!(base = %base, "detached document from its declared base");

    Ok(changed)
}

fn rewrite_blind(document: &mut Document, base: &Url) -> Result<RewriteOutcome, MirrorError> {
    let mut outcome = RewriteOutcome::default();

    for attr in BLIND_ATTRIBUTES {
        let selector = format!("[{}]", attr);
        let changed = document.rewrite_attr(&selector, attr, |raw| absolutize(base, raw))?;
        outcome.rewritten += changed;
    }

    Ok(outcome)
}

fn absolutize(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match base.join(raw) {
        Ok(absolute) if absolute.as_str() != raw => Some(absolute.to_string()),
        _ => None,
    }
}
