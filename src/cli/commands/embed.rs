//! Embed command: build the chunk embedding table for a set of PDFs.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::cli::output::{EmbedSummary, get_formatter, progress_bar};
use crate::models::{Config, OutputFormat};
use crate::services::vector_db::failed_list_path;
use crate::services::{ChunkMode, EmbeddingClient, LayoutReader, TokenChunker, VectorDbBuilder};
use crate::utils::file::{collect_pdfs, pdf_path_for, read_id_list};

#[derive(Debug, Args)]
pub struct EmbedArgs {
    /// Directory holding the PDFs
    #[arg(required = true)]
    pub pdf_dir: PathBuf,

    /// Output CSV
    #[arg(long, short = 'o', default_value = "vector_db.csv")]
    pub output: PathBuf,

    /// File with one corpus ID per line; defaults to every PDF in the directory
    #[arg(long)]
    pub ids: Option<PathBuf>,

    /// Chunking mode: text or layout
    #[arg(long, short = 'm', default_value = "text")]
    pub mode: ChunkMode,

    /// Rebuild even when the output file exists
    #[arg(long)]
    pub recompute: bool,
}

fn resolve_files(pdf_dir: &Path, ids: Option<&Path>) -> Result<Vec<PathBuf>> {
    match ids {
        Some(list) => {
            let ids = read_id_list(list)
                .with_context(|| format!("failed to read ID list: {}", list.display()))?;
            Ok(ids.iter().map(|id| pdf_path_for(pdf_dir, id)).collect())
        }
        None => collect_pdfs(pdf_dir, "*.pdf")
            .with_context(|| format!("failed to list PDFs in {}", pdf_dir.display())),
    }
}

pub async fn handle_embed(
    args: EmbedArgs,
    config: &Config,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let files = resolve_files(&args.pdf_dir, args.ids.as_deref())?;
    info!(files = files.len(), mode = %args.mode, "resolved input files");

    if config.embedding.api_key.is_none() && (args.recompute || !args.output.exists()) {
        warn!("OPENAI_API_KEY is not set; embedding requests will be unauthenticated");
    }

    let embedder = EmbeddingClient::new(&config.embedding, &config.chunking.encoding)
        .context("failed to create embedding client")?;
    let batch_size = config.embedding.batch_size as usize;
    let builder = match args.mode {
        ChunkMode::Text => {
            let chunker = TokenChunker::new(&config.chunking.encoding, config.chunking.max_tokens)
                .context("failed to load tokenizer")?;
            VectorDbBuilder::text(Box::new(embedder), chunker, batch_size)
        }
        ChunkMode::Layout => {
            let reader = LayoutReader::new(&config.layout)
                .context("failed to create layout client")?;
            VectorDbBuilder::layout(Box::new(embedder), Box::new(reader), batch_size)
        }
    };

    let pb = progress_bar(files.len() as u64, format);
    let outcome = builder
        .load_or_build(&args.output, &files, args.recompute, &pb)
        .await
        .with_context(|| format!("failed to build {}", args.output.display()))?;
    pb.finish_and_clear();

    let failed_list = (!outcome.stats.reused).then(|| failed_list_path(&args.output));
    let summary = EmbedSummary {
        output: args.output,
        mode: args.mode,
        rows: outcome.table.len(),
        stats: outcome.stats,
        failed_list,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    print!("{}", formatter.format_embed(&summary));

    Ok(())
}
