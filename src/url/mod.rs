//! URL handling module for Pagetrail
//!
//! This module provides relative-URL resolution against a known base,
//! detection of placeholder hrefs, and the key under which fetched URLs
//! are remembered for cycle detection.

mod href;
mod resolve;

// Re-export main functions
pub use href::is_noop_href;
pub use resolve::{resolve_url, visit_key};
