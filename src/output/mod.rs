//! Output module for persisting harvested records
//!
//! This module handles:
//! - Writing records as JSON or CSV
//! - Choosing a sink from the output config
//! - Summarizing a run for the CLI

mod csv_output;
mod json_output;
mod summary;
mod traits;

pub use csv_output::CsvSink;
pub use json_output::JsonSink;
pub use summary::{format_summary, print_summary, RunSummary};
pub use traits::RecordSink;

use crate::config::{OutputConfig, OutputFormat};

/// Creates the sink for an output config
///
/// # Example
///
/// ```
/// use pagetrail::config::{OutputConfig, OutputFormat};
/// use pagetrail::output::sink_for;
///
/// let config = OutputConfig {
///     format: OutputFormat::Csv,
///     path: "out/quotes.csv".to_string(),
/// };
/// let sink = sink_for(&config);
/// assert_eq!(sink.format(), OutputFormat::Csv);
/// ```
pub fn sink_for(config: &OutputConfig) -> Box<dyn RecordSink> {
    match config.format {
        OutputFormat::Json => Box::new(JsonSink::new(&config.path)),
        OutputFormat::Csv => Box::new(CsvSink::new(&config.path)),
    }
}
