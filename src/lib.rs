//! Pagetrail: a rule-driven page harvester
//!
//! This crate fetches a start page, extracts structured fields from it using
//! declarative CSS or XPath rules, follows a single chain of "next page" links,
//! and hands the collected records to an output sink.

pub mod config;
pub mod crawler;
pub mod output;
pub mod query;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Pagetrail operations
#[derive(Debug, Error)]
pub enum PagetrailError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Crawl(#[from] crawler::CrawlError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    /// A selector that does not compile for its query language
    #[error("Invalid {kind} selector for '{field}' ({selector}): {message}")]
    Selector {
        field: String,
        kind: query::QueryKind,
        selector: String,
        message: String,
    },
}

/// Classified transport failures
///
/// Every variant carries the URL it happened on; HTTP variants also carry
/// the status code. Timeouts, connection failures and 5xx responses have
/// already been retried by the time they surface here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url} after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("Connection failed for {url} after {attempts} attempt(s): {message}")]
    Connect {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP {status} for {url}")]
    ClientStatus { url: String, status: u16 },

    #[error("HTTP {status} for {url} after {attempts} attempt(s)")]
    ServerStatus {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// The URL this failure happened on, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Timeout { url, .. }
            | Self::Connect { url, .. }
            | Self::ClientStatus { url, .. }
            | Self::ServerStatus { url, .. }
            | Self::Request { url, .. }
            | Self::InvalidUrl { url, .. } => Some(url),
            Self::Client(_) => None,
        }
    }

    /// The HTTP status code for status failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientStatus { status, .. } | Self::ServerStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Number of requests issued before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. }
            | Self::Connect { attempts, .. }
            | Self::ServerStatus { attempts, .. } => *attempts,
            Self::ClientStatus { .. } | Self::Request { .. } => 1,
            Self::InvalidUrl { .. } | Self::Client(_) => 0,
        }
    }

    /// Returns true for the transient kinds the transport retries
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect { .. } | Self::ServerStatus { .. }
        )
    }
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Relative URL '{0}' has no base to resolve against")]
    MissingBase(String),
}

/// Output-specific errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for Pagetrail operations
pub type Result<T> = std::result::Result<T, PagetrailError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for transport operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

// Re-export commonly used types
pub use crate::config::{Config, CrawlSpec};
pub use crate::crawler::{CrawlEngine, CrawlReport, PageResult, Termination};
pub use crate::state::CrawlState;
pub use crate::url::resolve_url;
