//! Configuration module for Sumi-Mirror
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file, and resolving where mirrored pages are stored.
//!
//! # Example
//!
//! ```no_run
//! use sumi_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Concurrency limit: {}", config.fetcher.max_concurrent_requests);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherConfig, OutputConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config, resolve_store_root, STORE_ROOT_ENV};
pub use validation::{validate, MAX_CONCURRENT_REQUESTS, MAX_TIMEOUT_SECS};
