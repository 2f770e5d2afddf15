//! Embedding client for generating text embeddings.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;
use crate::services::chunker::TokenChunker;
use crate::utils::retry::{RetryConfig, with_retry};
use crate::utils::text::flatten_newlines;

/// Turns texts into embedding vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Request body for the /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the /embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings API.
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
    max_input_tokens: usize,
    tokenizer: TokenChunker,
    retry: RetryConfig,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl EmbeddingClient {
    /// Create a new embedding client; `encoding` is the tokenizer used to
    /// truncate over-long inputs.
    pub fn new(config: &EmbeddingConfig, encoding: &str) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            max_input_tokens: config.max_input_tokens as usize,
            tokenizer: TokenChunker::new(encoding, config.max_input_tokens)?,
            retry: RetryConfig::new(config.max_attempts),
        })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reachability probe against the model listing endpoint.
    pub async fn health_check(&self) -> bool {
        let mut request = self.client.get(format!("{}/models", self.base_url));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Flatten newlines and cut the input to the model's token limit.
    fn prepare_input(&self, text: &str) -> Result<String, EmbeddingError> {
        let flat = flatten_newlines(text);
        Ok(self.tokenizer.truncate(&flat, self.max_input_tokens)?)
    }

    /// Internal method to embed a single batch.
    async fn embed_single_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else if e.is_connect() {
                EmbeddingError::ConnectionError(e.to_string())
            } else {
                EmbeddingError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_embeddings_response(&body, inputs.len())
    }
}

/// Parse an /embeddings response body, ordering vectors by their `index`.
fn parse_embeddings_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut response: EmbeddingsResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

    if response.data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = texts
            .iter()
            .map(|t| self.prepare_input(t))
            .collect::<Result<Vec<_>, _>>()?;

        let mut all_embeddings = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.batch_size) {
            debug!(size = batch.len(), model = %self.model, "embedding batch");
            let embeddings = with_retry(&self.retry, "embeddings", || {
                self.embed_single_batch(batch)
            })
            .await
            .into_result()?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }
}
