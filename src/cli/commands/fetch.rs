//! Fetch command: download the first open-access PDF per query.

use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::cli::output::{FetchSummary, get_formatter, progress_bar};
use crate::models::{Config, OutputFormat, RetrievalSet, append_links};
use crate::services::PaperFetcher;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Retrieval log: tab-separated `score query candidate` rows
    #[arg(required = true)]
    pub retrieval_log: PathBuf,

    /// File that receives `query\tcorpus_id` link lines (appended)
    #[arg(long, short = 'l', default_value = "link-recorder")]
    pub links_file: PathBuf,

    /// Directory for downloaded PDFs (overrides download.directory)
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,
}

pub async fn handle_fetch(
    args: FetchArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let file = File::open(&args.retrieval_log).with_context(|| {
        format!(
            "failed to open retrieval log: {}",
            args.retrieval_log.display()
        )
    })?;
    let set = RetrievalSet::parse(BufReader::new(file)).context("failed to read retrieval log")?;

    if set.is_empty() {
        println!("{}", formatter.format_message("No queries found in retrieval log."));
        return Ok(());
    }
    info!(
        queries = set.len(),
        candidates = set.candidate_count(),
        "retrieval log loaded"
    );
    if config.scholar.api_key.is_none() {
        tracing::warn!("S2_API_KEY is not set; requests are subject to the shared rate limit");
    }

    let mut download = config.download.clone();
    if let Some(dir) = args.output_dir {
        download.directory = dir;
    }

    let fetcher = PaperFetcher::from_config(&config.scholar, &download)
        .context("failed to build HTTP clients")?;

    let pb = progress_bar(set.len() as u64, format);
    let outcome = fetcher.download_papers(&set, &pb).await;
    pb.finish_and_clear();

    append_links(&args.links_file, &outcome.links).with_context(|| {
        format!("failed to write links file: {}", args.links_file.display())
    })?;

    if verbose {
        for link in &outcome.links {
            eprintln!("{}\t{}", link.query, link.corpus_id);
        }
    }

    let summary = FetchSummary {
        stats: outcome.stats,
        directory: fetcher.directory().to_path_buf(),
        links_file: args.links_file,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    print!("{}", formatter.format_fetch(&summary));

    Ok(())
}
