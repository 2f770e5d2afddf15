//! Graph database client over the Neo4j HTTP transaction API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::GraphError;
use crate::models::GraphConfig;
use crate::utils::retry::{RetryConfig, with_retry};

/// A parameterised Cypher statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl Statement {
    pub fn new(cypher: impl Into<String>) -> Self {
        Self {
            statement: cypher.into(),
            parameters: Map::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }
}

/// Runs statement lists, each list in a single transaction.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, statements: Vec<Statement>) -> Result<(), GraphError>;

    async fn health_check(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    errors: Vec<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    code: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct Neo4jClient {
    client: Client,
    base_url: String,
    database: String,
    user: String,
    password: Option<String>,
    retry: RetryConfig,
}

impl Neo4jClient {
    pub fn new(config: &GraphConfig) -> Result<Self, GraphError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GraphError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            retry: RetryConfig::new(config.max_attempts),
        })
    }

    /// `{url}/db/{database}/tx/commit`
    pub fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.base_url, self.database)
    }

    async fn commit(&self, statements: &[Statement]) -> Result<(), GraphError> {
        let response = self
            .client
            .post(self.commit_url())
            .basic_auth(&self.user, self.password.as_ref())
            .json(&CommitRequest { statements })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GraphError::ConnectionError(e.to_string())
                } else {
                    GraphError::RequestError(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GraphError::Status {
                status: status.as_u16(),
                body,
            });
        }
        check_commit_response(&body)
    }
}

/// The endpoint answers 200 even when a statement fails; errors are in the body.
fn check_commit_response(body: &str) -> Result<(), GraphError> {
    let response: CommitResponse =
        serde_json::from_str(body).map_err(|e| GraphError::InvalidResponse(e.to_string()))?;
    match response.errors.into_iter().next() {
        Some(error) => Err(GraphError::Statement {
            code: error.code,
            message: error.message,
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn execute(&self, statements: Vec<Statement>) -> Result<(), GraphError> {
        if statements.is_empty() {
            return Ok(());
        }
        debug!(count = statements.len(), "committing transaction");
        with_retry(&self.retry, "graph commit", || self.commit(&statements))
            .await
            .into_result()
    }

    async fn health_check(&self) -> bool {
        self.execute(vec![Statement::new("RETURN 1")]).await.is_ok()
    }
}
