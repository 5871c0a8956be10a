//! # Harvest CLI Application
//!
//! This module implements the command-line interface for the harvester.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `run`: Seed, crawl and write a corpus file for a topic query
//!   - `inspect`: Read a corpus file back and list its records
//!
//! ## Features
//!
//! - Optional explicit seed URLs that bypass search
//! - Browser-free mode that fetches pages over plain HTTP
//! - Progress spinner driven by crawl events
//! - Telemetry integration for monitoring
//! - Both JSON and text output formats

mod telemetry;

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use harvest::crawler::{CrawlEvent, CrawlerConfig, Storage, StorageConfig};
use harvest::harvest::{HarvestRequest, HarvestResponse, Harvester};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::instrument;

#[derive(Parser)]
#[command(author, version, about = "Harvest a plain-text corpus from the web for a topic query", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the web for a topic and save the content as a corpus
    Run(RunArgs),

    /// Show the records of a corpus file
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic query
    #[arg(required = true)]
    query: String,

    /// Keyword refining the query (repeatable)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Seed URL to crawl instead of searching (repeatable)
    #[arg(short, long = "url")]
    urls: Vec<String>,

    /// Directory corpus files are written to
    #[arg(short, long, env = "HARVEST_OUTPUT_DIR", default_value = "data/scraped_data")]
    output_dir: PathBuf,

    /// Fetch pages over plain HTTP without starting a browser
    #[arg(long, env = "HARVEST_NO_BROWSER")]
    no_browser: bool,

    /// Stop crawling after this many seconds
    #[arg(long, env = "HARVEST_RUN_TIMEOUT")]
    run_timeout: Option<u64>,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Corpus file to read
    #[arg(required = true)]
    corpus_file: PathBuf,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber()?;

    match cli.command {
        Some(Commands::Run(args)) => {
            run_command(args).await?;
        }
        Some(Commands::Inspect(args)) => {
            inspect_command(args).await?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

#[instrument(skip(args), fields(query = %args.query))]
async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let config = CrawlerConfig::builder()
        .use_browser(!args.no_browser)
        .run_timeout_secs(args.run_timeout)
        .build();
    let storage = Storage::with_config(StorageConfig {
        base_path: args.output_dir.clone(),
    });

    let (event_sender, mut event_receiver) = mpsc::unbounded_channel();
    let harvester = Harvester::new(config, storage)?.with_events(event_sender);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed_precise}] {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Searching for \"{}\"...", args.query));

    // Ends once the harvester, and with it the sender, is dropped
    let progress_handle = tokio::spawn({
        let spinner = spinner.clone();
        async move {
            while let Some(event) = event_receiver.recv().await {
                match event {
                    CrawlEvent::Seeded { count } => {
                        spinner.set_message(format!("Crawling from {} seed URLs...", count));
                    }
                    CrawlEvent::PageAccepted { url, pages, .. } => {
                        spinner.set_message(format!("Scraped {} pages, last: {}", pages, url));
                    }
                    CrawlEvent::Finished { pages, visited } => {
                        spinner.set_message(format!(
                            "Visited {} URLs, kept {} pages",
                            visited, pages
                        ));
                    }
                    CrawlEvent::PageSkipped { .. } | CrawlEvent::PageFailed { .. } => {}
                }
            }
        }
    });

    let request = HarvestRequest::new(args.query.clone(), args.keywords.clone());
    let result = if args.urls.is_empty() {
        harvester.harvest(&request).await
    } else {
        harvester.harvest_seeds(&request, args.urls.clone()).await
    };
    harvester.shutdown().await;
    drop(harvester);

    let _ = progress_handle.await;
    spinner.finish_and_clear();

    let response = result?;
    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => print_summary(&response),
    }

    Ok(())
}

fn print_summary(response: &HarvestResponse) {
    println!("{}", response.message);
    println!("Pages scraped: {}", response.pages_scraped);
    println!(
        "Total content length: {} characters",
        response.total_content_length
    );
    println!("Corpus file: {}", response.corpus_file_path);
    println!("\nURLs:");
    for (i, url) in response.urls.iter().enumerate() {
        println!("{}. {}", i + 1, url);
    }
}

#[instrument]
async fn inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let records = Storage::new()
        .load(&args.corpus_file)
        .await
        .with_context(|| format!("Failed to read corpus {}", args.corpus_file.display()))?;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            println!("Records: {}", records.len());
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{}. {} ({} characters)",
                    i + 1,
                    record.url,
                    record.content.chars().count()
                );
            }
        }
    }

    Ok(())
}
