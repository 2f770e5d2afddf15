//! Error types for the paper pipeline jobs.

use thiserror::Error;

use crate::utils::retry::Retryable;

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Errors related to the paper metadata service.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to reach metadata service: {0}")]
    ConnectionError(String),

    #[error("metadata service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("metadata request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid metadata response: {0}")]
    InvalidResponse(String),
}

impl Retryable for MetadataError {
    fn is_retryable(&self) -> bool {
        match self {
            MetadataError::ConnectionError(_) => true,
            MetadataError::Status { status, .. } => is_transient_status(*status),
            MetadataError::RequestError(e) => e.is_timeout() || e.is_connect(),
            MetadataError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to downloading a single PDF.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("metadata lookup failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("download request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("download returned status {0}")]
    Status(u16),

    #[error("the response is not a pdf (content-type: {0})")]
    NotPdf(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    ConnectionError(String),

    #[error("embedding service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("input truncation failed: {0}")]
    Tokenizer(#[from] ChunkError),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::Status { status, .. } => is_transient_status(*status),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::Tokenizer(_) => false,
        }
    }
}

/// Errors related to tokenizing and chunking text.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("unknown token encoding: {0}")]
    UnknownEncoding(String),

    #[error("failed to load token encoding: {0}")]
    Load(String),

    #[error("failed to decode tokens: {0}")]
    Decode(String),

    #[error("token budget {got} is below the minimum of {min}")]
    BudgetTooSmall { min: usize, got: usize },
}

/// Errors related to plain text extraction from PDFs.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to extract text from {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("no text content extracted from {0}")]
    Empty(String),
}

/// Errors related to the layout-parsing service.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("layout request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("layout service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid layout response: {0}")]
    InvalidResponse(String),

    #[error("unsupported block type: {0}")]
    UnsupportedBlock(String),
}

/// Errors related to graph database operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to connect to graph database: {0}")]
    ConnectionError(String),

    #[error("graph request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("graph database returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("statement failed ({code}): {message}")]
    Statement { code: String, message: String },

    #[error("invalid graph response: {0}")]
    InvalidResponse(String),
}

impl Retryable for GraphError {
    fn is_retryable(&self) -> bool {
        match self {
            GraphError::ConnectionError(_) => true,
            GraphError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GraphError::Status { status, .. } => is_transient_status(*status),
            GraphError::Statement { code, .. } => code.contains("TransientError"),
            GraphError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to building or reading the citation matrix.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
}

/// Errors related to the vector table.
#[derive(Debug, Error)]
pub enum VectorDbError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("no input files")]
    NoFiles,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("vector table error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_status_retryable() {
        let rate_limited = MetadataError::Status {
            status: 429,
            body: String::new(),
        };
        assert!(rate_limited.is_retryable());

        let not_found = MetadataError::Status {
            status: 404,
            body: "Paper not found".to_string(),
        };
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_embedding_status_retryable() {
        let status = |status: u16, body: &str| EmbeddingError::Status {
            status,
            body: body.to_string(),
        };
        assert!(status(503, "Service Unavailable").is_retryable());
        assert!(status(501, "Not Implemented").is_retryable());
        assert!(status(429, "").is_retryable());
        assert!(!status(400, "you requested 8500 tokens").is_retryable());
        assert!(!status(401, "Rate limit docs: https://example.org/429").is_retryable());
        assert!(!EmbeddingError::InvalidResponse("missing data".into()).is_retryable());
    }

    #[test]
    fn test_graph_transient_statement_retryable() {
        let transient = GraphError::Statement {
            code: "Neo.TransientError.Transaction.DeadlockDetected".to_string(),
            message: "deadlock".to_string(),
        };
        assert!(transient.is_retryable());

        let syntax = GraphError::Statement {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: "bad".to_string(),
        };
        assert!(!syntax.is_retryable());
    }
}
