//! Document model adapter
//!
//! Wraps a parsed `scraper::Html` tree behind the handful of operations the mirroring
//! pipeline needs:
//! - counting nodes that match a CSS selector
//! - reading a named attribute from matching nodes
//! - rewriting a named attribute on matching nodes
//! - serializing the (possibly rewritten) tree back to bytes
//!
//! The underlying tree is not `Send`, so a [`Document`] must be created, used and dropped
//! without an `.await` in between.

mod metadata;

pub use metadata::{extract_metadata, Metadata};

use crate::MirrorError;
use scraper::{Html, Node, Selector};

/// A parsed HTML page
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses raw response bytes into a document
    ///
    /// HTML parsing itself is error-tolerant; bytes that are not valid UTF-8 are decoded
    /// lossily rather than rejected.
    pub fn parse(bytes: &[u8]) -> Self {
        let html = match std::str::from_utf8(bytes) {
            Ok(text) => Html::parse_document(text),
            Err(_) => {
                tracing::debug!("document is not valid UTF-8, decoding lossily");
                Html::parse_document(&String::from_utf8_lossy(bytes))
            }
        };

        Self { html }
    }

    /// Counts nodes matching `selector` across the whole document
    pub fn count(&self, selector: &str) -> Result<usize, MirrorError> {
        let selector = compile(selector)?;
        Ok(self.html.select(&selector).count())
    }

    /// Returns the value of `attr` on every node matching `selector` that carries it
    pub fn attr_values(&self, selector: &str, attr: &str) -> Result<Vec<String>, MirrorError> {
        let selector = compile(selector)?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|element| element.value().attr(attr).map(str::to_string))
            .collect())
    }

    /// Returns the value of `attr` on the first node matching `selector`
    pub fn first_attr(&self, selector: &str, attr: &str) -> Result<Option<String>, MirrorError> {
        let selector = compile(selector)?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr(attr).map(str::to_string)))
    }

    /// Rewrites `attr` on every node matching `selector`
    ///
    /// `rewrite` receives the current value and returns the replacement, or `None` to
    /// leave the node untouched. Matches are collected first and mutated afterwards, so
    /// the tree is never modified while it is being traversed.
    ///
    /// Returns the number of attributes changed.
    pub fn rewrite_attr<F>(
        &mut self,
        selector: &str,
        attr: &str,
        mut rewrite: F,
    ) -> Result<usize, MirrorError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let selector = compile(selector)?;

        // Phase 1: collect node ids and current values
        let targets: Vec<_> = self
            .html
            .select(&selector)
            .filter_map(|element| {
                element
                    .value()
                    .attr(attr)
                    .map(|value| (element.id(), value.to_string()))
            })
            .collect();

        // Phase 2: mutate
        let mut rewritten = 0;
        for (node_id, value) in targets {
            let Some(new_value) = rewrite(&value) else {
                continue;
            };

            let Some(mut node) = self.html.tree.get_mut(node_id) else {
                continue;
            };

            if let Node::Element(element) = node.value() {
                for (name, current) in element.attrs.iter_mut() {
                    if &*name.local == attr {
                        *current = new_value.as_str().into();
                        rewritten += 1;
                        break;
                    }
                }
            }
        }

        Ok(rewritten)
    }

    /// Serializes the document back to HTML bytes
    pub fn serialize(&self) -> Vec<u8> {
        self.html.html().into_bytes()
    }
}

fn compile(selector: &str) -> Result<Selector, MirrorError> {
    Selector::parse(selector)
        .map_err(|e| MirrorError::Parse(format!("invalid selector {:?}: {:?}", selector, e)))
}
