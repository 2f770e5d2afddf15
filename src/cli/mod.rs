//! CLI module for the paper pipeline jobs.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::OutputFormat;

/// Batch jobs for a paper retrieval pipeline: PDF fetching, citation
/// matrices, embeddings and graph ingestion.
#[derive(Debug, Parser)]
#[command(name = "paperpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        env = "PAPERPIPE_CONFIG",
        help = "Path to a config file (default: <config dir>/paperpipe/config.toml)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the first open-access PDF for each query of a retrieval log
    Fetch(commands::FetchArgs),

    /// Build the citation matrix and classification joins
    Matrix(commands::MatrixArgs),

    /// Build the chunk embedding table for a set of PDFs
    Embed(commands::EmbedArgs),

    /// Load PDF layouts and citation links into the graph database
    Ingest(commands::IngestArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Check that the external services are reachable
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_embed_args() {
        let cli = Cli::try_parse_from([
            "paperpipe",
            "embed",
            "query_papers",
            "--mode",
            "layout",
            "--recompute",
            "-f",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Embed(args) => {
                assert_eq!(args.mode, crate::services::ChunkMode::Layout);
                assert!(args.recompute);
                assert_eq!(args.output, PathBuf::from("vector_db.csv"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
