//! Crawler module for fetching and harvesting paginated pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with pacing, retries and error classification
//! - Field extraction from parsed pages
//! - Next-page evaluation and cycle protection
//! - The crawl loop tying them together

mod engine;
mod extractor;
mod pagination;
mod retry;
mod transport;

pub use engine::{run_crawl, CrawlEngine, CrawlError, CrawlReport, PageResult, Termination};
pub use extractor::{Extractor, FieldValue, Record};
pub use pagination::{check_link, DisabledReason, NextPage, Paginator, VisitedSet};
pub use retry::RetryPolicy;
pub use transport::{build_http_client, FetchedPage, Transport};

use crate::config::Config;

/// Runs the crawl described by a loaded config
///
/// This is the main entry point for library users. It will:
/// 1. Compile the extraction and pagination selectors
/// 2. Build the HTTP client
/// 3. Fetch, extract and paginate until a stop condition is met
///
/// The output section of the config is not touched; pass the report's
/// pages to a sink from [`crate::output`] to persist them.
pub async fn crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    tracing::debug!(name = %config.name, "Running configured crawl");
    run_crawl(config.spec).await
}
