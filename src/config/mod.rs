//! Configuration module for Pagetrail
//!
//! This module handles loading, parsing, and validating crawl configuration
//! files written in TOML, YAML, or JSON.
//!
//! # Example
//!
//! ```no_run
//! use pagetrail::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quotes.toml")).unwrap();
//! println!("{} rules", config.spec.extract_rules.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlSpec, ExtractRule, HttpOptions, Multiplicity, OutputConfig, OutputFormat,
    PaginationRule, DEFAULT_USER_AGENT,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{compile_selector, validate, validate_spec};
