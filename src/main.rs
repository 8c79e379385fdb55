//! Pagetrail main entry point
//!
//! This is the command-line interface for the Pagetrail page harvester.

use anyhow::{Context, Result};
use clap::Parser;
use pagetrail::config::{load_config_with_hash, Config, OutputFormat};
use pagetrail::crawler::CrawlEngine;
use pagetrail::output::{print_summary, sink_for, RunSummary};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pagetrail: a rule-driven page harvester
///
/// Pagetrail fetches a start page, extracts fields with CSS or XPath rules,
/// follows a chain of "next page" links, and saves one record per page as
/// JSON or CSV.
#[derive(Parser, Debug)]
#[command(name = "pagetrail")]
#[command(version)]
#[command(about = "A rule-driven page harvester", long_about = None)]
struct Cli {
    /// Path to the crawl config (.toml, .yaml, .yml or .json)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the config and show the crawl plan without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Write output to this path instead of the configured one
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Override the configured output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(path) = &cli.output {
        config.output.path = path.display().to_string();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagetrail=info,warn"),
            1 => EnvFilter::new("pagetrail=debug,info"),
            2 => EnvFilter::new("pagetrail=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    let spec = &config.spec;

    println!("=== Pagetrail Dry Run: {} ===\n", config.name);

    println!("Start URL: {}", spec.start_url);

    println!("\nHTTP:");
    println!("  Delay: {}s (jittered ±20%)", spec.http.delay);
    println!("  Timeout: {}s", spec.http.timeout);
    println!("  Max retries: {}", spec.http.max_retries);
    println!("  Initial backoff: {}s", spec.http.backoff);
    for (name, value) in spec.http.effective_headers() {
        println!("  Header {}: {}", name, value);
    }

    println!("\nExtract Rules ({}):", spec.extract_rules.len());
    for rule in &spec.extract_rules {
        let attr = rule
            .attr
            .as_deref()
            .map(|a| format!(" @{}", a))
            .unwrap_or_default();
        let many = if rule.multiple { " (multiple)" } else { "" };
        println!(
            "  - {} [{}] {}{}{}",
            rule.field, rule.kind, rule.selector, attr, many
        );
    }

    match &spec.pagination {
        Some(pagination) => {
            println!("\nPagination:");
            println!(
                "  Next link [{}]: {}",
                pagination.kind, pagination.next_page_selector
            );
            println!("  Max pages: {}", pagination.max_pages.max(1));
        }
        None => println!("\nPagination: none (single page)"),
    }

    println!("\nOutput:");
    println!("  Format: {}", config.output.format);
    println!("  Path: {}", config.output.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let engine = CrawlEngine::new(config.spec.clone())
        .context("Failed to prepare crawl")?
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });

    let sink = sink_for(&config.output);

    match engine.run().await {
        Ok(report) => {
            sink.write(&report.pages)
                .with_context(|| format!("Failed to save output to {}", sink.path().display()))?;

            let mut summary = RunSummary::from_report(&config.name, config_hash, &report);
            if !report.pages.is_empty() {
                summary = summary.with_output(sink.path());
            }
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            // Pages committed before the failure are still saved
            let committed = e.committed_pages();
            let mut summary = RunSummary::from_error(&config.name, config_hash, &e);
            if !committed.is_empty() {
                match sink.write(committed) {
                    Ok(()) => summary = summary.with_output(sink.path()),
                    Err(save_error) => tracing::error!("Failed to save partial output: {}", save_error),
                }
            }
            print_summary(&summary);
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
