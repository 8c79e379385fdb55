//! Run summary
//!
//! This module condenses a finished (or failed) run into the few numbers
//! the CLI prints at the end.

use crate::crawler::{CrawlError, CrawlReport, PageResult};
use std::fmt::Write;
use std::path::PathBuf;

/// Summary of one crawl run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Crawl name from the config
    pub name: String,

    /// SHA-256 of the config file
    pub config_hash: String,

    /// Pages fetched and extracted
    pub pages: usize,

    /// Fields matched across all pages (unmatched single fields excluded)
    pub fields_matched: usize,

    /// Why the run stopped
    pub outcome: String,

    /// Wall-clock duration in milliseconds, if the run completed
    pub duration_ms: Option<i64>,

    /// Where records were written; `None` if nothing was saved
    pub output_path: Option<PathBuf>,
}

impl RunSummary {
    /// Summarizes a successful run
    pub fn from_report(name: &str, config_hash: &str, report: &CrawlReport) -> Self {
        Self {
            name: name.to_string(),
            config_hash: config_hash.to_string(),
            pages: report.pages.len(),
            fields_matched: count_matched(&report.pages),
            outcome: report.termination.to_string(),
            duration_ms: Some(report.duration().num_milliseconds()),
            output_path: None,
        }
    }

    /// Summarizes an aborted run
    pub fn from_error(name: &str, config_hash: &str, error: &CrawlError) -> Self {
        let committed = error.committed_pages();
        Self {
            name: name.to_string(),
            config_hash: config_hash.to_string(),
            pages: committed.len(),
            fields_matched: count_matched(committed),
            outcome: format!("failed: {}", error),
            duration_ms: None,
            output_path: None,
        }
    }

    /// Records where the output was saved
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

fn count_matched(pages: &[PageResult]) -> usize {
    pages
        .iter()
        .flat_map(|page| page.record.iter())
        .filter(|(_, value)| !value.is_missing())
        .count()
}

/// Formats a summary as plain text
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Summary: {} ===\n", summary.name);
    let _ = writeln!(out, "  Config hash: {}", summary.config_hash);
    let _ = writeln!(out, "  Pages: {}", summary.pages);
    let _ = writeln!(out, "  Fields matched: {}", summary.fields_matched);
    let _ = writeln!(out, "  Outcome: {}", summary.outcome);
    if let Some(ms) = summary.duration_ms {
        let _ = writeln!(out, "  Duration: {:.2}s", ms as f64 / 1000.0);
    }
    match &summary.output_path {
        Some(path) => {
            let _ = writeln!(out, "  Output: {}", path.display());
        }
        None => {
            let _ = writeln!(out, "  Output: (nothing saved)");
        }
    }

    out
}

/// Prints a summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}
