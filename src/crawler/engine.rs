//! Crawl engine - the fetch / extract / paginate loop
//!
//! This module contains the loop that drives a single crawl run:
//! - Fetching the current page through the transport
//! - Extracting one record per page
//! - Deciding whether a next page exists and is worth fetching
//! - Enforcing the page limit and refusing to revisit a URL
//! - Honouring cancellation between and during iterations

use crate::config::CrawlSpec;
use crate::crawler::extractor::{Extractor, Record};
use crate::crawler::pagination::{NextPage, Paginator, VisitedSet};
use crate::crawler::transport::Transport;
use crate::query::PageDocument;
use crate::state::CrawlState;
use crate::url::resolve_url;
use crate::{ConfigError, FetchError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One fetched and extracted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// 1-based position in the pagination chain
    pub page_number: u32,

    /// URL the page was served from, after redirects
    pub url: Url,

    /// Extracted fields
    pub record: Record,
}

/// Why a successful run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// No pagination rule configured; only the start page was fetched
    NoPaginationRule,
    /// The next-page selector matched nothing
    NoNextPage,
    /// A next-page element matched but was disabled or had no usable target
    InvalidNextLink(String),
    /// The next page resolved to a URL already fetched in this run
    CycleDetected(Url),
    /// The configured maximum number of pages was fetched
    PageLimitReached(u32),
    /// The caller cancelled the run
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPaginationRule => write!(f, "no pagination rule"),
            Self::NoNextPage => write!(f, "no next page"),
            Self::InvalidNextLink(reason) => write!(f, "next link not followed ({})", reason),
            Self::CycleDetected(url) => write!(f, "next page already visited: {}", url),
            Self::PageLimitReached(max) => write!(f, "page limit of {} reached", max),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a successful crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// One entry per fetched page, in fetch order
    pub pages: Vec<PageResult>,
    pub termination: Termination,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// The extracted records, in fetch order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.pages.iter().map(|page| &page.record)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Errors that end a crawl run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid crawl spec: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to set up transport: {0}")]
    Transport(FetchError),

    /// A page could not be fetched; pages before it are in `committed`
    #[error("Fetch failed on page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: FetchError,
        committed: Vec<PageResult>,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: CrawlState, to: CrawlState },
}

impl CrawlError {
    /// Pages extracted before the failure
    pub fn committed_pages(&self) -> &[PageResult] {
        match self {
            Self::Fetch { committed, .. } => committed,
            _ => &[],
        }
    }
}

/// Runs crawl specs
///
/// An engine compiles its spec once; every call to [`CrawlEngine::run`]
/// starts from the start URL with a fresh visited set and base URL, so
/// runs never share state.
pub struct CrawlEngine {
    spec: Arc<CrawlSpec>,
    transport: Transport,
    extractor: Extractor,
    paginator: Option<Paginator>,
    cancel: CancellationToken,
}

impl CrawlEngine {
    /// Creates a new engine for the given spec
    ///
    /// All selectors are compiled here, so a malformed rule fails before
    /// any request is made.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to run
    /// * `Err(CrawlError)` - A selector or the HTTP client setup was invalid
    pub fn new(spec: CrawlSpec) -> Result<Self, CrawlError> {
        let extractor = Extractor::new(&spec.extract_rules)?;
        let paginator = spec.pagination.as_ref().map(Paginator::new).transpose()?;
        let transport = Transport::new(&spec.http).map_err(CrawlError::Transport)?;

        Ok(Self {
            spec: Arc::new(spec),
            transport,
            extractor,
            paginator,
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `token` to cancel runs of this engine
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels runs of this engine
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spec(&self) -> &CrawlSpec {
        &self.spec
    }

    /// Maximum number of pages a run will fetch
    pub fn max_pages(&self) -> u32 {
        self.paginator.as_ref().map_or(1, Paginator::max_pages)
    }

    /// Runs the crawl loop to completion
    ///
    /// # Loop
    ///
    /// 1. Fetch the current URL (skipped if already visited)
    /// 2. Mark the requested and final URLs visited
    /// 3. Extract a record and commit it
    /// 4. Stop if there is no pagination rule or the page limit is reached
    /// 5. Otherwise evaluate the next link; follow it or stop
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The run ended normally, possibly with zero
    ///   matched fields, or was cancelled
    /// * `Err(CrawlError::Fetch)` - A page could not be fetched after
    ///   retries; the run is aborted
    /// * `Err(CrawlError::Config)` - A selector could not be evaluated
    ///   against a fetched page; the run is aborted
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        let started_at = Utc::now();
        let max_pages = self.max_pages();
        let mut state = CrawlState::Start;
        let mut pages: Vec<PageResult> = Vec::new();
        let mut visited = VisitedSet::new();
        let mut base: Option<Url> = None;
        let mut page_number: u32 = 1;

        tracing::info!(
            start_url = %self.spec.start_url,
            max_pages,
            rules = self.extractor.len(),
            "Starting crawl run"
        );

        let mut target = match resolve_url(&self.spec.start_url, None) {
            Ok(url) => url,
            Err(e) => {
                transition(&mut state, CrawlState::Failed)?;
                return Err(CrawlError::Fetch {
                    page: page_number,
                    source: FetchError::InvalidUrl {
                        url: self.spec.start_url.clone(),
                        message: e.to_string(),
                    },
                    committed: pages,
                });
            }
        };

        let termination = loop {
            if self.cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            if visited.contains(&target) {
                tracing::warn!(url = %target, "URL already fetched in this run, stopping");
                break Termination::CycleDetected(target);
            }

            transition(&mut state, CrawlState::Fetching)?;

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(page = page_number, "Cancelled while fetching, discarding page");
                    break Termination::Cancelled;
                }
                result = self.transport.fetch(target.as_str(), base.as_ref()) => result,
            };

            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(source) => {
                    transition(&mut state, CrawlState::Failed)?;
                    tracing::error!(page = page_number, committed = pages.len(), "Crawl aborted: {}", source);
                    return Err(CrawlError::Fetch {
                        page: page_number,
                        source,
                        committed: pages,
                    });
                }
            };

            visited.insert(&fetched.requested_url);
            visited.insert(&fetched.url);

            transition(&mut state, CrawlState::Extracting)?;

            let decision = {
                let document = PageDocument::parse(&fetched.body);
                let record = match self.extractor.extract(&document) {
                    Ok(record) => record,
                    Err(e) => {
                        transition(&mut state, CrawlState::Failed)?;
                        tracing::error!(page = page_number, "Crawl aborted: {}", e);
                        return Err(CrawlError::Config(e));
                    }
                };

                if self.cancel.is_cancelled() {
                    tracing::info!(page = page_number, "Cancelled while extracting, discarding page");
                    break Termination::Cancelled;
                }

                tracing::info!(
                    page = page_number,
                    url = %fetched.url,
                    fields = record.len(),
                    "Extracted page"
                );
                pages.push(PageResult {
                    page_number,
                    url: fetched.url.clone(),
                    record,
                });

                transition(&mut state, CrawlState::DecidingNext)?;

                let Some(paginator) = &self.paginator else {
                    break Termination::NoPaginationRule;
                };

                if page_number >= max_pages {
                    tracing::info!(max_pages, "Page limit reached");
                    break Termination::PageLimitReached(max_pages);
                }

                match paginator.next_page(&document, &fetched.url, &visited) {
                    Ok(decision) => decision,
                    Err(e) => {
                        transition(&mut state, CrawlState::Failed)?;
                        tracing::error!(page = page_number, "Crawl aborted: {}", e);
                        return Err(CrawlError::Config(e));
                    }
                }
            };

            match decision {
                NextPage::Follow(next) => {
                    tracing::info!(next = %next, page = page_number + 1, "Following next page");
                    base = Some(fetched.url);
                    target = next;
                    page_number += 1;
                }
                NextPage::NoMatch => {
                    tracing::info!("No next page link found");
                    break Termination::NoNextPage;
                }
                NextPage::Disabled(reason) => {
                    tracing::info!("Next page link is inactive: {}", reason);
                    break Termination::InvalidNextLink(reason.to_string());
                }
                NextPage::Unresolvable(reason) => {
                    tracing::info!("Next page link has no usable target: {}", reason);
                    break Termination::InvalidNextLink(reason);
                }
                NextPage::AlreadyVisited(url) => {
                    tracing::warn!(url = %url, "Next page already visited, stopping to avoid a cycle");
                    break Termination::CycleDetected(url);
                }
            }
        };

        transition(&mut state, CrawlState::Done)?;

        let report = CrawlReport {
            pages,
            termination,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            pages = report.pages.len(),
            "Crawl finished: {} in {}ms",
            report.termination,
            report.duration().num_milliseconds()
        );

        Ok(report)
    }
}

/// Moves the run to `next`, rejecting illegal transitions
fn transition(state: &mut CrawlState, next: CrawlState) -> Result<(), CrawlError> {
    if !state.can_transition_to(next) {
        return Err(CrawlError::InvalidTransition {
            from: *state,
            to: next,
        });
    }
    tracing::debug!(from = %state, to = %next, "State transition");
    *state = next;
    Ok(())
}

/// Runs a spec once with a fresh engine
///
/// # Example
///
/// ```no_run
/// use pagetrail::config::load_config;
/// use pagetrail::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("quotes.toml"))?;
/// let report = run_crawl(config.spec).await?;
/// println!("{} pages", report.pages.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(spec: CrawlSpec) -> Result<CrawlReport, CrawlError> {
    CrawlEngine::new(spec)?.run().await
}
