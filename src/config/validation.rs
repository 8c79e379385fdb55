use crate::config::types::{
    Config, CrawlSpec, ExtractRule, HttpOptions, OutputConfig, PaginationRule, MAX_INTERVAL_SECS,
};
use crate::query::{Query, QueryKind};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation("name cannot be empty".to_string()));
    }

    validate_spec(&config.spec)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates a crawl spec on its own
///
/// Selectors are compiled here so that a malformed rule is reported before
/// any page is fetched.
pub fn validate_spec(spec: &CrawlSpec) -> Result<(), ConfigError> {
    validate_start_url(&spec.start_url)?;
    validate_extract_rules(&spec.extract_rules)?;
    if let Some(pagination) = &spec.pagination {
        validate_pagination(pagination)?;
    }
    validate_http_options(&spec.http)?;
    Ok(())
}

/// Compiles a selector, mapping failures to a field-scoped config error
pub fn compile_selector(
    field: &str,
    kind: QueryKind,
    selector: &str,
    attr: Option<&str>,
) -> Result<Query, ConfigError> {
    Query::compile(kind, selector, attr).map_err(|message| ConfigError::Selector {
        field: field.to_string(),
        kind,
        selector: selector.to_string(),
        message,
    })
}

fn validate_start_url(start_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(start_url.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start_url '{}': {}", start_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "start_url '{}' must use http or https",
            start_url
        )));
    }

    Ok(())
}

fn validate_extract_rules(rules: &[ExtractRule]) -> Result<(), ConfigError> {
    if rules.is_empty() {
        return Err(ConfigError::Validation(
            "extract_rules must contain at least one rule".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for rule in rules {
        if rule.field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extract rule field cannot be empty".to_string(),
            ));
        }

        if !seen.insert(rule.field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate extract rule field '{}'",
                rule.field
            )));
        }

        if rule.selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector for field '{}' cannot be empty",
                rule.field
            )));
        }

        if matches!(&rule.attr, Some(attr) if attr.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "attr for field '{}' cannot be empty",
                rule.field
            )));
        }

        compile_selector(&rule.field, rule.kind, &rule.selector, rule.attr.as_deref())?;
    }

    Ok(())
}

fn validate_pagination(rule: &PaginationRule) -> Result<(), ConfigError> {
    if rule.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "pagination max_pages must be >= 1, got {}",
            rule.max_pages
        )));
    }

    if rule.next_page_selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pagination next_page_selector cannot be empty".to_string(),
        ));
    }

    compile_selector("pagination", rule.kind, &rule.next_page_selector, None)?;
    Ok(())
}

fn validate_http_options(http: &HttpOptions) -> Result<(), ConfigError> {
    validate_interval("delay", http.delay, true)?;
    validate_interval("timeout", http.timeout, false)?;
    validate_interval("backoff", http.backoff, false)?;

    for (name, value) in &http.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("invalid value for header '{}'", name))
        })?;
    }

    Ok(())
}

/// Checks a seconds value is finite, in range and representable as a
/// `Duration`
fn validate_interval(name: &str, secs: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let lower_ok = if allow_zero { secs >= 0.0 } else { secs > 0.0 };
    if !secs.is_finite() || !lower_ok {
        let bound = if allow_zero { ">= 0" } else { "> 0" };
        return Err(ConfigError::Validation(format!(
            "{} must be {} seconds, got {}",
            name, bound, secs
        )));
    }

    if secs > MAX_INTERVAL_SECS || Duration::try_from_secs_f64(secs).is_err() {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_INTERVAL_SECS, secs
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
