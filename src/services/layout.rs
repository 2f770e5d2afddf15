//! Client for the layout-parsing service.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::error::LayoutError;
use crate::models::{LayoutBlock, LayoutConfig, LayoutDocument};

/// Parses a PDF into its section/chunk layout.
#[async_trait]
pub trait LayoutParser: Send + Sync {
    async fn read_pdf(&self, path: &Path) -> Result<LayoutDocument, LayoutError>;
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    return_dict: ReturnDict,
}

#[derive(Debug, Deserialize)]
struct ReturnDict {
    result: ParseResult,
}

#[derive(Debug, Deserialize)]
struct ParseResult {
    #[serde(default)]
    blocks: Vec<LayoutBlock>,
}

#[derive(Debug, Clone)]
pub struct LayoutReader {
    client: Client,
    url: String,
}

impl LayoutReader {
    pub fn new(config: &LayoutConfig) -> Result<Self, LayoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse the service's JSON body into a layout tree.
pub fn parse_layout_response(body: &str) -> Result<LayoutDocument, LayoutError> {
    let response: ParseResponse = serde_json::from_str(body)
        .map_err(|e| LayoutError::InvalidResponse(e.to_string()))?;
    LayoutDocument::from_blocks(response.return_dict.result.blocks)
}

#[async_trait]
impl LayoutParser for LayoutReader {
    async fn read_pdf(&self, path: &Path) -> Result<LayoutDocument, LayoutError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LayoutError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let doc = parse_layout_response(&body)?;
        debug!(
            path = %path.display(),
            sections = doc.sections().len(),
            chunks = doc.chunks().len(),
            "parsed layout"
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout_response() {
        let body = r#"{
            "status": 200,
            "return_dict": {
                "result": {
                    "blocks": [
                        {"tag": "header", "level": 0, "page_idx": 0, "block_idx": 0,
                         "sentences": ["Abstract"], "bbox": [0, 0, 10, 10]},
                        {"tag": "para", "level": 1, "page_idx": 0, "block_idx": 1,
                         "sentences": ["We propose a method.", "It works."]}
                    ]
                }
            }
        }"#;
        let doc = parse_layout_response(body).unwrap();
        assert_eq!(doc.sections().len(), 1);
        assert_eq!(doc.sections()[0].title, "Abstract");
        assert_eq!(doc.chunks()[0].parent, Some(0));
    }

    #[test]
    fn test_parse_layout_response_missing_result() {
        let err = parse_layout_response(r#"{"return_dict": {}}"#).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidResponse(_)));
    }
}
