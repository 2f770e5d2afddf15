use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::format::OutputFormat;
use crate::error::ConfigError;
use crate::services::chunker::MIN_TOKEN_BUDGET;

pub const DEFAULT_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1";
pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_LAYOUT_URL: &str =
    "https://readers.llmsherpa.com/api/document/developer/parseDocument?renderFormat=all";
pub const DEFAULT_GRAPH_URL: &str = "http://localhost:7474";
pub const DEFAULT_USER_AGENT: &str = "requests/2.0.0";
pub const DEFAULT_ENCODING: &str = "cl100k_base";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scholar: ScholarConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("paperpipe").join("config.toml"))
    }

    /// Load the config file (explicit path first, then the default location),
    /// then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override credentials and endpoints from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("S2_API_KEY") {
            self.scholar.api_key = Some(key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = non_empty("LLMSHERPA_API_URL") {
            self.layout.url = url;
        }
        if let Some(url) = non_empty("NEO4J_URL") {
            self.graph.url = url;
        }
        if let Some(user) = non_empty("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = non_empty("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }
        if let Some(database) = non_empty("NEO4J_DATABASE") {
            self.graph.database = database;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }
        let min = MIN_TOKEN_BUDGET as u32;
        if self.chunking.max_tokens < min || self.embedding.max_input_tokens < min {
            return Err(ConfigError::ValidationError(format!(
                "token budgets must be at least {min}"
            )));
        }
        Ok(())
    }

    /// Write the default config to the default location.
    pub fn init(force: bool) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        if path.exists() && !force {
            return Err(ConfigError::PathError(format!(
                "config already exists at {}",
                path.display()
            )));
        }
        Self::default().save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy of the config with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.scholar.api_key = mask(&self.scholar.api_key);
        copy.embedding.api_key = mask(&self.embedding.api_key);
        copy.graph.password = mask(&self.graph.password);
        copy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default = "default_scholar_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_scholar_url() -> String {
    DEFAULT_SCHOLAR_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            url: default_scholar_url(),
            api_key: None,
            timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Open-access hosts frequently serve broken certificate chains.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("retrieved_papers")
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_download_timeout() -> u64 {
    120
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
            user_agent: default_user_agent(),
            timeout_secs: default_download_timeout(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_timeout() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_input_tokens() -> u32 {
    8191
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            api_key: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
            max_input_tokens: default_max_input_tokens(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default = "default_chunk_tokens")]
    pub max_tokens: u32,
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_chunk_tokens() -> u32 {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            max_tokens: default_chunk_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_layout_url")]
    pub url: String,

    #[serde(default = "default_layout_timeout")]
    pub timeout_secs: u64,
}

fn default_layout_url() -> String {
    DEFAULT_LAYOUT_URL.to_string()
}

fn default_layout_timeout() -> u64 {
    300
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            url: default_layout_url(),
            timeout_secs: default_layout_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_url")]
    pub url: String,

    #[serde(default = "default_graph_user")]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_graph_database")]
    pub database: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_graph_user() -> String {
    "neo4j".to_string()
}

fn default_graph_database() -> String {
    "neo4j".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: default_graph_url(),
            user: default_graph_user(),
            password: None,
            database: default_graph_database(),
            timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}
