//! Matrix command: citation matrix and classification joins.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::get_formatter;
use crate::models::OutputFormat;
use crate::services::{RelationInputs, build_relations};

#[derive(Debug, Args)]
pub struct MatrixArgs {
    /// Candidate→retrieved link log (`candidate\tretrieved`, no header)
    #[arg(long, default_value = "link-recorder")]
    pub links: PathBuf,

    /// Query→candidate qrels (`query candidate bool`, no header)
    #[arg(long, required = true)]
    pub qrels: PathBuf,

    /// Classification meta (JSONL with `corpus_id` and `labels`)
    #[arg(long, required = true)]
    pub meta: PathBuf,

    /// Directory holding `{query}.pdf` files
    #[arg(long, default_value = "query_papers")]
    pub query_dir: PathBuf,

    /// Directory holding `{candidate}.pdf` files
    #[arg(long, default_value = "candidate_papers")]
    pub candidate_dir: PathBuf,

    /// Directory for the output files
    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,
}

pub async fn handle_matrix(args: MatrixArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let inputs = RelationInputs {
        links: args.links,
        qrels: args.qrels,
        meta: args.meta,
        query_dir: args.query_dir,
        candidate_dir: args.candidate_dir,
    };
    let output_dir = args.output_dir;

    let report = tokio::task::spawn_blocking(move || build_relations(&inputs, &output_dir))
        .await
        .context("relations task failed")?
        .context("failed to build relations")?;

    print!("{}", formatter.format_relations(&report));
    Ok(())
}
