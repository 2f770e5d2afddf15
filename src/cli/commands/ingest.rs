//! Ingest command: load PDF layouts into the graph database.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::output::{IngestSummary, get_formatter, progress_bar};
use crate::models::{Config, OutputFormat};
use crate::services::{CitationMatrix, GraphIngester, LayoutReader, Neo4jClient};
use crate::utils::file::collect_pdfs;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Folder holding the PDF files
    #[arg(default_value = "papers")]
    pub file_location: PathBuf,

    /// Citation matrix CSV; rows cite columns. Without it no CITES edges are created.
    #[arg(long, short = 'c')]
    pub citation_matrix: Option<PathBuf>,
}

pub async fn handle_ingest(
    args: IngestArgs,
    config: &Config,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    let files = collect_pdfs(&args.file_location, "*.pdf").with_context(|| {
        format!("failed to list PDFs in {}", args.file_location.display())
    })?;
    debug!(count = files.len(), "pdf files found");
    if files.is_empty() {
        anyhow::bail!("no PDF files found in {}", args.file_location.display());
    }

    // Read the matrix up front so a bad file fails before any writes.
    let matrix = args
        .citation_matrix
        .as_deref()
        .map(|path| {
            CitationMatrix::read_csv(path)
                .with_context(|| format!("failed to read citation matrix: {}", path.display()))
        })
        .transpose()?;

    let store = Neo4jClient::new(&config.graph).context("failed to create graph client")?;
    let ingester = GraphIngester::new(Box::new(store));
    ingester
        .ensure_schema()
        .await
        .context("failed to create graph constraints")?;

    let reader = LayoutReader::new(&config.layout).context("failed to create layout client")?;

    let start_time = Instant::now();
    debug!(url = %config.graph.url, "connected to graph database");
    let pb = progress_bar(files.len() as u64, format);
    let mut report = ingester.ingest_files(&reader, &files, &pb).await;
    pb.finish_and_clear();

    match matrix {
        Some(matrix) => {
            debug!("creating document links");
            report.citations = ingester
                .create_document_links(&matrix, &report.doc_hashes)
                .await
                .context("failed to create citation links")?;
        }
        None => info!("no citation matrix given, skipping CITES edges"),
    }

    let elapsed = start_time.elapsed();
    info!(total_secs = elapsed.as_secs_f64(), "ingest finished");

    let summary = IngestSummary {
        report,
        duration_ms: elapsed.as_millis() as u64,
    };
    print!("{}", formatter.format_ingest(&summary));

    Ok(())
}
