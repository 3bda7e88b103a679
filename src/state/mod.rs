//! State module for tracking per-URL pipeline progress
//!
//! Every submitted URL walks through a fixed sequence of [`FetchState`]s and ends in
//! either `Succeeded` or `Failed`. [`StateTracker`] enforces the legal transitions.

mod fetch_state;

pub use fetch_state::{FetchState, StateTracker};
