//! Paper metadata and download bookkeeping.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fields requested when resolving a candidate to a downloadable PDF.
pub const DOWNLOAD_FIELDS: &str = "corpusId,paperId,isOpenAccess,openAccessPdf";

/// Paper metadata as returned by the Semantic Scholar graph API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub corpus_id: u64,

    #[serde(default)]
    pub paper_id: Option<String>,

    #[serde(default)]
    pub is_open_access: bool,

    #[serde(default)]
    pub open_access_pdf: Option<OpenAccessPdf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAccessPdf {
    #[serde(default)]
    pub url: Option<String>,
}

impl Paper {
    /// URL of a freely downloadable PDF, if the paper is open access and has one.
    pub fn pdf_url(&self) -> Option<&str> {
        if !self.is_open_access {
            return None;
        }
        self.open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

/// A PDF that exists on disk for a corpus ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPaper {
    pub corpus_id: u64,
    pub path: PathBuf,
    /// False when the file was already present and no request was made.
    pub fresh: bool,
}

/// query paper → corpus ID of the first candidate whose PDF was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub query: String,
    pub corpus_id: u64,
}

/// Append link records as `query\tcorpus_id` lines.
pub fn append_links(path: &Path, links: &[LinkRecord]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for link in links {
        writeln!(writer, "{}\t{}", link.query, link.corpus_id)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_response() {
        let json = r#"{
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "corpusId": 215416146,
            "isOpenAccess": true,
            "openAccessPdf": {"url": "https://arxiv.org/pdf/2004.07180.pdf", "status": "GREEN"}
        }"#;
        let paper: Paper = serde_json::from_str(json).unwrap();
        assert_eq!(paper.corpus_id, 215416146);
        assert_eq!(paper.pdf_url(), Some("https://arxiv.org/pdf/2004.07180.pdf"));
    }

    #[test]
    fn test_pdf_url_requires_open_access() {
        let paper = Paper {
            corpus_id: 1,
            paper_id: None,
            is_open_access: false,
            open_access_pdf: Some(OpenAccessPdf {
                url: Some("https://example.org/a.pdf".to_string()),
            }),
        };
        assert_eq!(paper.pdf_url(), None);
    }

    #[test]
    fn test_pdf_url_missing() {
        let json = r#"{"corpusId": 7, "isOpenAccess": true, "openAccessPdf": null}"#;
        let paper: Paper = serde_json::from_str(json).unwrap();
        assert_eq!(paper.pdf_url(), None);

        let json = r#"{"corpusId": 7, "isOpenAccess": true, "openAccessPdf": {"url": ""}}"#;
        let paper: Paper = serde_json::from_str(json).unwrap();
        assert_eq!(paper.pdf_url(), None);
    }

    #[test]
    fn test_append_links_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.tsv");
        append_links(
            &path,
            &[LinkRecord {
                query: "q1".to_string(),
                corpus_id: 10,
            }],
        )
        .unwrap();
        append_links(
            &path,
            &[LinkRecord {
                query: "q2".to_string(),
                corpus_id: 20,
            }],
        )
        .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "q1\t10\nq2\t20\n");
    }
}
