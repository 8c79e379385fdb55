use crate::query::QueryKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// User agent sent when the configuration does not set one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Longest accepted delay, timeout or backoff, in seconds (one day)
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Main configuration structure for Pagetrail
///
/// This is the on-disk shape: a named crawl spec plus where to write the
/// results.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Human-readable name of this crawl
    pub name: String,

    #[serde(flatten)]
    pub spec: CrawlSpec,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Everything the crawl engine needs for one run
///
/// Built once from validated configuration and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSpec {
    /// Absolute URL of the first page
    pub start_url: String,

    /// Field rules, applied in order to every page
    pub extract_rules: Vec<ExtractRule>,

    /// How to find the next page, if the crawl paginates
    #[serde(default)]
    pub pagination: Option<PaginationRule>,

    #[serde(flatten)]
    pub http: HttpOptions,
}

/// One field to extract from every page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractRule {
    /// Output field name, unique within a spec
    pub field: String,

    /// Query language of `selector`
    #[serde(rename = "type", default)]
    pub kind: QueryKind,

    pub selector: String,

    /// Attribute to read instead of the text content
    #[serde(default)]
    pub attr: Option<String>,

    /// Collect every match instead of only the first
    #[serde(default)]
    pub multiple: bool,
}

impl ExtractRule {
    /// Returns the multiplicity of this rule
    pub fn multiplicity(&self) -> Multiplicity {
        if self.multiple {
            Multiplicity::Multiple
        } else {
            Multiplicity::Single
        }
    }
}

/// Whether a rule produces one value or a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Multiple,
}

/// How to locate and bound the "next page" traversal
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaginationRule {
    /// Upper bound on fetched pages, including the start page
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Query language of `next_page_selector`
    #[serde(rename = "type", default)]
    pub kind: QueryKind,

    /// Selector for the "next" link; its `href` is followed
    pub next_page_selector: String,
}

/// HTTP behaviour for every request in a run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpOptions {
    /// Base delay between requests in seconds, jittered by ±20%
    #[serde(default = "default_delay")]
    pub delay: f64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry backoff in seconds; doubles on every further retry
    #[serde(default = "default_backoff")]
    pub backoff: f64,

    /// Headers added to every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpOptions {
    pub fn delay(&self) -> Duration {
        interval(self.delay)
    }

    pub fn timeout(&self) -> Duration {
        interval(self.timeout)
    }

    pub fn backoff(&self) -> Duration {
        interval(self.backoff)
    }

    /// Returns the configured headers with the default user agent filled in
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
            headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        }
        headers
    }
}

/// Converts seconds to a duration clamped to `[0, MAX_INTERVAL_SECS]`
///
/// NaN maps to zero. Validation rejects out-of-range values before a run;
/// the clamp only keeps unvalidated specs from panicking.
fn interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_INTERVAL_SECS)).unwrap_or(Duration::ZERO)
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            backoff: default_backoff(),
            headers: BTreeMap::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Path of the file to write
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            path: default_output_path(),
        }
    }
}

/// Serialization format of the output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

fn default_max_pages() -> u32 {
    1
}

fn default_delay() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    30.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> f64 {
    0.5
}

fn default_output_path() -> String {
    "output/data.json".to_string()
}
