//! Semantic Scholar graph API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::MetadataError;
use crate::models::{Paper, ScholarConfig};
use crate::utils::retry::{RetryConfig, with_retry};

/// Source of paper metadata keyed by corpus ID.
#[async_trait]
pub trait PaperMetadataSource: Send + Sync {
    async fn get_paper(&self, corpus_id: &str, fields: &str) -> Result<Paper, MetadataError>;
}

#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl SemanticScholarClient {
    fn with_client(client: Client, config: &ScholarConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry: RetryConfig::new(config.max_attempts),
        }
    }

    pub fn new(config: &ScholarConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetadataError::ConnectionError(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn paper_url(&self, corpus_id: &str) -> String {
        format!("{}/paper/CorpusID:{}", self.base_url, corpus_id)
    }

    async fn fetch_once(&self, corpus_id: &str, fields: &str) -> Result<Paper, MetadataError> {
        let mut request = self
            .client
            .get(self.paper_url(corpus_id))
            .query(&[("fields", fields)]);
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                MetadataError::ConnectionError(e.to_string())
            } else {
                MetadataError::RequestError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Paper>()
            .await
            .map_err(|e| MetadataError::InvalidResponse(e.to_string()))
    }

    /// Reachability probe: any non-5xx answer counts as reachable.
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.paper_url("1")).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl PaperMetadataSource for SemanticScholarClient {
    async fn get_paper(&self, corpus_id: &str, fields: &str) -> Result<Paper, MetadataError> {
        debug!(corpus_id, "fetching paper metadata");
        with_retry(&self.retry, "paper metadata", || {
            self.fetch_once(corpus_id, fields)
        })
        .await
        .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_url() {
        let config = ScholarConfig {
            url: "https://api.semanticscholar.org/graph/v1/".to_string(),
            ..Default::default()
        };
        let client = SemanticScholarClient::new(&config).unwrap();
        assert_eq!(
            client.paper_url("215416146"),
            "https://api.semanticscholar.org/graph/v1/paper/CorpusID:215416146"
        );
    }
}
