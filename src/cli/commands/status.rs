use anyhow::Result;
use std::path::Path;

use crate::cli::output::{ServiceStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, GraphStore, Neo4jClient, SemanticScholarClient};

pub async fn handle_status(
    config: &Config,
    explicit: Option<&Path>,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    let scholar_ok = match SemanticScholarClient::new(&config.scholar) {
        Ok(client) => client.health_check().await,
        Err(_) => false,
    };

    let embedding_ok = match EmbeddingClient::new(&config.embedding, &config.chunking.encoding) {
        Ok(client) => client.health_check().await,
        Err(_) => false,
    };

    let graph_ok = match Neo4jClient::new(&config.graph) {
        Ok(client) => client.health_check().await,
        Err(_) => false,
    };

    let status = StatusInfo {
        config_path: explicit
            .map(Path::to_path_buf)
            .or_else(|| Config::config_path().filter(|p| p.exists())),
        services: vec![
            ServiceStatus {
                name: "Semantic Scholar".to_string(),
                url: config.scholar.url.clone(),
                reachable: scholar_ok,
            },
            ServiceStatus {
                name: "Embeddings".to_string(),
                url: config.embedding.url.clone(),
                reachable: embedding_ok,
            },
            ServiceStatus {
                name: "Neo4j".to_string(),
                url: config.graph.url.clone(),
                reachable: graph_ok,
            },
        ],
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_ok && config.embedding.api_key.is_none() {
        eprintln!();
        eprintln!("Hint: set OPENAI_API_KEY (or embedding.api_key) for the embeddings API.");
    }
    if !graph_ok && config.graph.password.is_none() {
        eprintln!("Hint: set NEO4J_PASSWORD (or graph.password) for the graph database.");
    }

    Ok(())
}
