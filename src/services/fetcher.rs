//! Resolves ranked candidates to open-access PDFs and downloads them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::models::{
    DOWNLOAD_FIELDS, DownloadConfig, DownloadedPaper, LinkRecord, QueryCandidates, RetrievalSet,
    ScholarConfig,
};
use crate::services::scholar::{PaperMetadataSource, SemanticScholarClient};
use crate::utils::file::pdf_path_for;

/// Counters for a fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub queries: u64,
    pub linked: u64,
    pub candidates_tried: u64,
    pub not_open_access: u64,
    pub already_present: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub links: Vec<LinkRecord>,
    pub stats: FetchStats,
}

pub struct PaperFetcher {
    metadata: Box<dyn PaperMetadataSource>,
    client: Client,
    directory: PathBuf,
    user_agent: String,
}

/// HTTP client for PDF downloads only. Certificate checks follow
/// `download.accept_invalid_certs`; metadata lookups never use this client.
pub fn build_http_client(config: &DownloadConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
}

impl PaperFetcher {
    pub fn new(
        metadata: Box<dyn PaperMetadataSource>,
        client: Client,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            metadata,
            client,
            directory: config.directory.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Semantic Scholar lookups on their own verified client, downloads on
    /// the download client.
    pub fn from_config(
        scholar: &ScholarConfig,
        download: &DownloadConfig,
    ) -> Result<Self, DownloadError> {
        let metadata = SemanticScholarClient::new(scholar)?;
        let client = build_http_client(download)?;
        Ok(Self::new(Box::new(metadata), client, download))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolve a corpus ID to a PDF on disk.
    ///
    /// Returns `Ok(None)` when the paper is not open access or has no PDF URL.
    pub async fn download_paper(
        &self,
        corpus_id: &str,
    ) -> Result<Option<DownloadedPaper>, DownloadError> {
        let paper = self.metadata.get_paper(corpus_id, DOWNLOAD_FIELDS).await?;

        let Some(url) = paper.pdf_url() else {
            debug!(corpus_id, "no open-access pdf");
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.directory).await?;
        let path = pdf_path_for(&self.directory, &paper.corpus_id.to_string());

        if tokio::fs::try_exists(&path).await? {
            return Ok(Some(DownloadedPaper {
                corpus_id: paper.corpus_id,
                path,
                fresh: false,
            }));
        }

        self.download_pdf(url, &path).await?;
        Ok(Some(DownloadedPaper {
            corpus_id: paper.corpus_id,
            path,
            fresh: true,
        }))
    }

    /// Stream a PDF to `path`. The body lands in `{path}.part` first and is
    /// renamed once complete.
    pub async fn download_pdf(&self, url: &str, path: &Path) -> Result<(), DownloadError> {
        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_pdf_media_type(&content_type) {
            return Err(DownloadError::NotPdf(content_type));
        }

        let partial = path.with_extension("pdf.part");
        let result = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, DownloadError>(())
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, path).await?;
        Ok(())
    }

    /// Try candidates in rank order and stop at the first downloaded PDF.
    pub async fn download_first(
        &self,
        entry: &QueryCandidates,
        stats: &mut FetchStats,
    ) -> Option<LinkRecord> {
        for candidate in &entry.candidates {
            stats.candidates_tried += 1;
            match self.download_paper(candidate).await {
                Ok(Some(downloaded)) => {
                    if downloaded.fresh {
                        info!(
                            corpus_id = downloaded.corpus_id,
                            path = %downloaded.path.display(),
                            "downloaded pdf"
                        );
                    } else {
                        stats.already_present += 1;
                        debug!(corpus_id = downloaded.corpus_id, "pdf already present");
                    }
                    return Some(LinkRecord {
                        query: entry.query.clone(),
                        corpus_id: downloaded.corpus_id,
                    });
                }
                Ok(None) => stats.not_open_access += 1,
                Err(e) => {
                    stats.errors += 1;
                    warn!(query = %entry.query, candidate = %candidate, error = %e, "candidate skipped");
                }
            }
        }
        None
    }

    pub async fn download_papers(&self, set: &RetrievalSet, progress: &ProgressBar) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for entry in set.iter() {
            outcome.stats.queries += 1;
            if let Some(link) = self.download_first(entry, &mut outcome.stats).await {
                outcome.stats.linked += 1;
                outcome.links.push(link);
            }
            progress.inc(1);
        }

        outcome
    }
}

fn is_pdf_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use crate::models::{OpenAccessPdf, Paper};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Metadata double; unknown IDs produce a 404.
    struct FakeMetadata {
        papers: HashMap<String, Paper>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeMetadata {
        fn new(papers: Vec<(&str, Paper)>) -> Self {
            Self {
                papers: papers
                    .into_iter()
                    .map(|(id, p)| (id.to_string(), p))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaperMetadataSource for FakeMetadata {
        async fn get_paper(&self, corpus_id: &str, _fields: &str) -> Result<Paper, MetadataError> {
            self.calls.lock().unwrap().push(corpus_id.to_string());
            self.papers
                .get(corpus_id)
                .cloned()
                .ok_or_else(|| MetadataError::Status {
                    status: 404,
                    body: "Paper not found".to_string(),
                })
        }
    }

    fn paper(corpus_id: u64, open: bool, url: Option<&str>) -> Paper {
        Paper {
            corpus_id,
            paper_id: None,
            is_open_access: open,
            open_access_pdf: url.map(|u| OpenAccessPdf {
                url: Some(u.to_string()),
            }),
        }
    }

    fn fetcher(metadata: FakeMetadata, dir: &Path) -> PaperFetcher {
        let config = DownloadConfig {
            directory: dir.to_path_buf(),
            ..Default::default()
        };
        PaperFetcher::new(Box::new(metadata), Client::new(), &config)
    }

    #[tokio::test]
    async fn test_not_open_access_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = FakeMetadata::new(vec![(
            "11",
            paper(11, false, Some("http://127.0.0.1:9/x.pdf")),
        )]);
        let fetcher = fetcher(metadata, dir.path());

        assert_eq!(fetcher.download_paper("11").await.unwrap(), None);
        assert!(!dir.path().join("11.pdf").exists());
    }

    #[tokio::test]
    async fn test_missing_pdf_url_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = FakeMetadata::new(vec![("12", paper(12, true, None))]);
        let fetcher = fetcher(metadata, dir.path());

        assert_eq!(fetcher.download_paper("12").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("13.pdf"), b"%PDF-1.4").unwrap();
        // Port 9 (discard) is never listening, so a real request would fail.
        let metadata = FakeMetadata::new(vec![(
            "13",
            paper(13, true, Some("http://127.0.0.1:9/13.pdf")),
        )]);
        let fetcher = fetcher(metadata, dir.path());

        let downloaded = fetcher.download_paper("13").await.unwrap().unwrap();
        assert_eq!(downloaded.corpus_id, 13);
        assert_eq!(downloaded.path, dir.path().join("13.pdf"));
        assert!(!downloaded.fresh);
    }

    #[tokio::test]
    async fn test_first_available_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("22.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("23.pdf"), b"%PDF-1.4").unwrap();
        let metadata = FakeMetadata::new(vec![
            ("21", paper(21, false, None)),
            ("22", paper(22, true, Some("http://127.0.0.1:9/22.pdf"))),
            ("23", paper(23, true, Some("http://127.0.0.1:9/23.pdf"))),
        ]);
        let fetcher = fetcher(metadata, dir.path());

        let mut set = RetrievalSet::default();
        set.push("q1", "404");
        set.push("q1", "21");
        set.push("q1", "22");
        set.push("q1", "23");
        set.push("q2", "21");

        let outcome = fetcher.download_papers(&set, &ProgressBar::hidden()).await;

        assert_eq!(
            outcome.links,
            vec![LinkRecord {
                query: "q1".to_string(),
                corpus_id: 22,
            }]
        );
        assert_eq!(outcome.stats.queries, 2);
        assert_eq!(outcome.stats.linked, 1);
        assert_eq!(outcome.stats.errors, 1);
        assert_eq!(outcome.stats.not_open_access, 2);
        assert_eq!(outcome.stats.candidates_tried, 4);
    }

    #[tokio::test]
    async fn test_download_error_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = FakeMetadata::new(vec![(
            "31",
            paper(31, true, Some("http://127.0.0.1:9/31.pdf")),
        )]);
        let fetcher = fetcher(metadata, dir.path());

        let mut set = RetrievalSet::default();
        set.push("q", "31");
        let outcome = fetcher.download_papers(&set, &ProgressBar::hidden()).await;

        assert!(outcome.links.is_empty());
        assert_eq!(outcome.stats.errors, 1);
        assert!(!dir.path().join("31.pdf").exists());
        assert!(!dir.path().join("31.pdf.part").exists());
    }

    /// Answers one request with `content_type` and `body`, then closes.
    async fn serve_once(content_type: &'static str, body: &'static [u8]) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/paper.pdf", addr)
    }

    #[tokio::test]
    async fn test_download_rejects_non_pdf_response() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(FakeMetadata::new(vec![]), dir.path());
        let url = serve_once("text/html", b"<html>paywall</html>").await;

        let err = fetcher
            .download_pdf(&url, &dir.path().join("1.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::NotPdf(ref ct) if ct == "text/html"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_renames_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(FakeMetadata::new(vec![]), dir.path());
        let url = serve_once("application/pdf", b"%PDF-1.4 body").await;
        let path = dir.path().join("2.pdf");

        fetcher.download_pdf(&url, &path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 body");
        assert!(!dir.path().join("2.pdf.part").exists());
    }

    #[tokio::test]
    async fn test_metadata_lookup_uses_scholar_timeout() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let scholar = ScholarConfig {
            url: format!("http://{}", listener.local_addr().unwrap()),
            timeout_secs: 1,
            max_attempts: 1,
            ..Default::default()
        };
        let download = DownloadConfig {
            timeout_secs: 300,
            ..Default::default()
        };
        let fetcher = PaperFetcher::from_config(&scholar, &download).unwrap();

        let result =
            tokio::time::timeout(Duration::from_secs(30), fetcher.download_paper("5")).await;

        assert!(matches!(result, Ok(Err(DownloadError::Metadata(_)))));
    }

    #[test]
    fn test_is_pdf_media_type() {
        assert!(is_pdf_media_type("application/pdf"));
        assert!(is_pdf_media_type("application/PDF; charset=binary"));
        assert!(!is_pdf_media_type("text/html"));
        assert!(!is_pdf_media_type(""));
    }
}
