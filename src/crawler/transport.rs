//! HTTP transport
//!
//! This module handles every request a crawl run makes, including:
//! - Building one HTTP client per run with the configured headers and timeout
//! - Resolving relative URLs against the base threaded in by the caller
//! - Jittered pacing between consecutive fetches
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::HttpOptions;
use crate::crawler::retry::RetryPolicy;
use crate::url::resolve_url;
use crate::FetchError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Upper bound on the connect phase of a request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; the base for resolving the next fetch
    pub url: Url,

    /// The absolute URL that was requested
    pub requested_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,

    /// Requests issued, including the successful one
    pub attempts: u32,

    /// Backoff waited before each retry, in order
    pub retry_waits: Vec<Duration>,
}

/// Outcome of a single request
enum Attempt {
    Success {
        final_url: Url,
        status: u16,
        body: String,
    },
    Transient(TransientFailure),
    Terminal(FetchError),
}

/// Failures worth retrying
#[derive(Debug)]
enum TransientFailure {
    Timeout,
    Connect(String),
    Server(u16),
}

impl TransientFailure {
    fn into_error(self, url: &Url, attempts: u32) -> FetchError {
        let url = url.to_string();
        match self {
            Self::Timeout => FetchError::Timeout { url, attempts },
            Self::Connect(message) => FetchError::Connect {
                url,
                attempts,
                message,
            },
            Self::Server(status) => FetchError::ServerStatus {
                url,
                status,
                attempts,
            },
        }
    }
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect(message) => write!(f, "connection failed: {}", message),
            Self::Server(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// Issues GET requests for a crawl run
///
/// The transport keeps no per-page state: the base URL used to resolve
/// relative references is passed into every [`Transport::fetch`] call and
/// the updated base comes back as [`FetchedPage::url`].
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    policy: RetryPolicy,
}

impl Transport {
    /// Builds a transport from the run's HTTP options
    ///
    /// # Returns
    ///
    /// * `Ok(Transport)` - Ready to fetch
    /// * `Err(FetchError::Client)` - A header was invalid or the client
    ///   could not be built
    pub fn new(options: &HttpOptions) -> Result<Self, FetchError> {
        let client = build_http_client(options)?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_options(options),
        })
    }

    /// The retry and pacing policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL with pacing, retries and error classification
    ///
    /// # Request Flow
    ///
    /// 1. Resolve `url` against `base` (absolute URLs pass through)
    /// 2. If `base` is set, this is not the first fetch of the run: wait the
    ///    jittered inter-request delay
    /// 3. Send the GET request, following up to 10 redirects
    /// 4. Handle the outcome per the retry table below
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | HTTP 5xx | Retry with backoff |
    /// | Timeout | Retry with backoff |
    /// | Connection failure | Retry with backoff |
    /// | HTTP 4xx / other status | Immediate `ClientStatus` |
    /// | Redirect or body errors | Immediate `Request` |
    ///
    /// Backoff starts at the policy's initial value and doubles per retry;
    /// at most `max_retries` retries follow the first attempt.
    pub async fn fetch(&self, url: &str, base: Option<&Url>) -> Result<FetchedPage, FetchError> {
        let target = resolve_url(url, base).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if base.is_some() {
            let delay = self.policy.jittered_delay();
            if !delay.is_zero() {
                tracing::debug!(url = %target, delay_ms = delay.as_millis() as u64, "Pacing before request");
                tokio::time::sleep(delay).await;
            }
        }

        let mut retry_waits = Vec::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!(url = %target, attempt = attempts, "Sending request");

            let failure = match self.attempt(&target).await {
                Attempt::Success {
                    final_url,
                    status,
                    body,
                } => {
                    tracing::info!(url = %final_url, status, attempts, "Fetched page");
                    return Ok(FetchedPage {
                        url: final_url,
                        requested_url: target,
                        status,
                        body,
                        attempts,
                        retry_waits,
                    });
                }
                Attempt::Terminal(error) => {
                    tracing::error!(url = %target, "Request failed: {}", error);
                    return Err(error);
                }
                Attempt::Transient(failure) => failure,
            };

            if !self.policy.should_retry(attempts - 1) {
                let error = failure.into_error(&target, attempts);
                tracing::error!(url = %target, attempts, "Giving up: {}", error);
                return Err(error);
            }

            let wait = self.policy.backoff_for(attempts);
            tracing::warn!(
                url = %target,
                attempt = attempts,
                wait_ms = wait.as_millis() as u64,
                "Transient failure ({}), retrying",
                failure
            );
            retry_waits.push(wait);
            tokio::time::sleep(wait).await;
        }
    }

    async fn attempt(&self, url: &Url) -> Attempt {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(e, url),
        };

        let status = response.status();
        if status.is_server_error() {
            return Attempt::Transient(TransientFailure::Server(status.as_u16()));
        }

        if !status.is_success() {
            return Attempt::Terminal(FetchError::ClientStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Attempt::Success {
                final_url,
                status: status.as_u16(),
                body,
            },
            Err(e) => classify_error(e, url),
        }
    }
}

/// Maps a client error to a retryable or terminal outcome
fn classify_error(error: reqwest::Error, url: &Url) -> Attempt {
    if error.is_builder() || error.is_redirect() || error.is_decode() {
        return Attempt::Terminal(FetchError::Request {
            url: url.to_string(),
            message: error.to_string(),
        });
    }

    if error.is_timeout() {
        Attempt::Transient(TransientFailure::Timeout)
    } else if error.is_connect() || error.is_request() || error.is_body() {
        Attempt::Transient(TransientFailure::Connect(error.to_string()))
    } else {
        Attempt::Terminal(FetchError::Request {
            url: url.to_string(),
            message: error.to_string(),
        })
    }
}

/// Builds an HTTP client with the run's headers and timeouts
///
/// # Example
///
/// ```
/// use pagetrail::config::HttpOptions;
/// use pagetrail::crawler::build_http_client;
///
/// let client = build_http_client(&HttpOptions::default()).unwrap();
/// ```
pub fn build_http_client(options: &HttpOptions) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in options.effective_headers() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Client(format!("invalid header name '{}': {}", name, e)))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| FetchError::Client(format!("invalid value for header '{}': {}", name, e)))?;
        headers.insert(header_name, header_value);
    }

    let timeout = options.timeout();
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}
