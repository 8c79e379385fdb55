//! State module for tracking crawl progress
//!
//! A crawl run is a small state machine: it fetches a page, extracts it,
//! decides whether a next page exists, and either loops or finishes.
//! `CrawlState` names those states and the legal moves between them.

mod crawl_state;

pub use crawl_state::CrawlState;
