//! Builds the chunk embedding table for a set of PDFs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VectorDbError;
use crate::models::{VectorRow, VectorTable};
use crate::services::chunker::TokenChunker;
use crate::services::embedding::Embedder;
use crate::services::layout::LayoutParser;
use crate::services::pdf_text::extract_pdf_text;
use crate::utils::file::file_id;
use crate::utils::text::sanitize_text;

/// How a PDF is split into embedding units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    /// Plain extracted text cut into token windows.
    #[default]
    Text,
    /// Layout-parser chunks with their section context.
    Layout,
}

impl FromStr for ChunkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ChunkMode::Text),
            "layout" => Ok(ChunkMode::Layout),
            _ => Err(format!("unknown chunk mode: {s}")),
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkMode::Text => write!(f, "text"),
            ChunkMode::Layout => write!(f, "layout"),
        }
    }
}

enum ChunkSource {
    Text(TokenChunker),
    Layout(Box<dyn LayoutParser>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub files: u64,
    pub files_failed: u64,
    pub chunks: u64,
    pub chunks_failed: u64,
    /// True when the table was read back from an existing output file.
    pub reused: bool,
}

#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub table: VectorTable,
    pub failed: Vec<PathBuf>,
    pub stats: BuildStats,
}

/// Row waiting for its embedding.
struct PendingRow {
    file_id: String,
    chunk_id: u32,
    text: String,
    section: String,
}

pub struct VectorDbBuilder {
    embedder: Box<dyn Embedder>,
    source: ChunkSource,
    batch_size: usize,
}

impl VectorDbBuilder {
    /// Text mode: extracted text split by `chunker`.
    pub fn text(embedder: Box<dyn Embedder>, chunker: TokenChunker, batch_size: usize) -> Self {
        Self {
            embedder,
            source: ChunkSource::Text(chunker),
            batch_size: batch_size.max(1),
        }
    }

    /// Layout mode: chunks come from the layout parser.
    pub fn layout(
        embedder: Box<dyn Embedder>,
        parser: Box<dyn LayoutParser>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            source: ChunkSource::Layout(parser),
            batch_size: batch_size.max(1),
        }
    }

    pub fn mode(&self) -> ChunkMode {
        match self.source {
            ChunkSource::Text(_) => ChunkMode::Text,
            ChunkSource::Layout(_) => ChunkMode::Layout,
        }
    }

    /// Rows for one file, without embeddings.
    async fn file_rows(&self, path: &Path) -> Result<Vec<PendingRow>, String> {
        let id = file_id(path);
        match &self.source {
            ChunkSource::Text(chunker) => {
                let text = extract_pdf_text(path).await.map_err(|e| e.to_string())?;
                let chunks = chunker.chunk(&text).map_err(|e| e.to_string())?;
                Ok(chunks
                    .iter()
                    .enumerate()
                    .map(|(i, chunk)| PendingRow {
                        file_id: id.clone(),
                        chunk_id: i as u32,
                        text: sanitize_text(chunk),
                        section: String::new(),
                    })
                    .collect())
            }
            ChunkSource::Layout(parser) => {
                let doc = parser.read_pdf(path).await.map_err(|e| e.to_string())?;
                Ok(doc
                    .chunks()
                    .iter()
                    .enumerate()
                    .map(|(i, chunk)| PendingRow {
                        file_id: id.clone(),
                        chunk_id: i as u32,
                        text: doc.context_text(chunk),
                        section: doc
                            .parent_of(chunk)
                            .map(|s| s.title.clone())
                            .unwrap_or_default(),
                    })
                    .collect())
            }
        }
    }

    /// Embed `pending` and move the rows into `outcome`. A failed batch is
    /// dropped and counted.
    async fn flush(&self, pending: &mut Vec<PendingRow>, outcome: &mut BuildOutcome) {
        if pending.is_empty() {
            return;
        }
        let rows = std::mem::take(pending);
        let texts = rows.iter().map(|r| r.text.clone()).collect();

        match self.embedder.embed_batch(texts).await {
            Ok(embeddings) if embeddings.len() == rows.len() => {
                for (row, embedding) in rows.into_iter().zip(embeddings) {
                    outcome.table.rows.push(VectorRow {
                        file_id: row.file_id,
                        chunk_id: row.chunk_id,
                        text: row.text,
                        vector_embedding: embedding,
                        section: row.section,
                    });
                }
            }
            Ok(embeddings) => {
                warn!(
                    expected = rows.len(),
                    got = embeddings.len(),
                    "embedding count mismatch, batch dropped"
                );
                outcome.stats.chunks_failed += rows.len() as u64;
            }
            Err(e) => {
                warn!(size = rows.len(), error = %e, "embedding batch failed, batch dropped");
                outcome.stats.chunks_failed += rows.len() as u64;
            }
        }
    }

    /// Chunk and embed every file. Batches span file boundaries.
    pub async fn build(&self, files: &[PathBuf], progress: &ProgressBar) -> BuildOutcome {
        let mut outcome = BuildOutcome::default();
        let mut pending: Vec<PendingRow> = Vec::with_capacity(self.batch_size);

        for path in files {
            outcome.stats.files += 1;
            progress.set_message(file_id(path));

            match self.file_rows(path).await {
                Ok(rows) => {
                    debug!(path = %path.display(), chunks = rows.len(), "chunked file");
                    outcome.stats.chunks += rows.len() as u64;
                    for row in rows {
                        pending.push(row);
                        if pending.len() >= self.batch_size {
                            self.flush(&mut pending, &mut outcome).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    outcome.stats.files_failed += 1;
                    outcome.failed.push(path.clone());
                }
            }
            progress.inc(1);
        }
        self.flush(&mut pending, &mut outcome).await;

        outcome
    }

    /// Read `output` when it exists and `recompute` is off; otherwise build
    /// the table, write it to `output` and the failed paths to
    /// `{output}.failed`.
    pub async fn load_or_build(
        &self,
        output: &Path,
        files: &[PathBuf],
        recompute: bool,
        progress: &ProgressBar,
    ) -> Result<BuildOutcome, VectorDbError> {
        if output.exists() && !recompute {
            info!(path = %output.display(), "reading existing vector table");
            let table = VectorTable::read_csv(output)?;
            return Ok(BuildOutcome {
                stats: BuildStats {
                    files: table.file_count() as u64,
                    chunks: table.len() as u64,
                    reused: true,
                    ..Default::default()
                },
                table,
                failed: Vec::new(),
            });
        }

        if files.is_empty() {
            return Err(VectorDbError::NoFiles);
        }

        let outcome = self.build(files, progress).await;
        outcome.table.write_csv(output)?;
        write_failed_list(&failed_list_path(output), &outcome.failed)?;
        info!(
            path = %output.display(),
            rows = outcome.table.len(),
            failed_files = outcome.failed.len(),
            "vector table written"
        );
        Ok(outcome)
    }
}

/// `{output}.failed`
pub fn failed_list_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".failed");
    PathBuf::from(name)
}

fn write_failed_list(path: &Path, failed: &[PathBuf]) -> std::io::Result<()> {
    let content: String = failed
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect();
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, LayoutError};
    use crate::models::{LayoutBlock, LayoutDocument};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds every text as `[len, call]` and counts calls.
    #[derive(Clone, Default)]
    struct CountingEmbedder {
        calls: Arc<AtomicUsize>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(EmbeddingError::Status {
                    status: 400,
                    body: "bad".into(),
                });
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, call as f32])
                .collect())
        }
    }

    /// Serves a fixed layout for `good.pdf` and fails everything else.
    struct FakeLayout;

    #[async_trait]
    impl LayoutParser for FakeLayout {
        async fn read_pdf(&self, path: &Path) -> Result<LayoutDocument, LayoutError> {
            if file_id(path) != "good" {
                return Err(LayoutError::InvalidResponse("no blocks".into()));
            }
            let block = |tag: &str, level, idx, text: &str| LayoutBlock {
                tag: tag.to_string(),
                level,
                page_idx: 0,
                block_idx: idx,
                sentences: vec![text.to_string()],
                table_rows: Vec::new(),
            };
            LayoutDocument::from_blocks(vec![
                block("header", 0, 0, "Introduction"),
                block("para", 1, 1, "First paragraph."),
                block("para", 1, 2, "Second paragraph."),
                block("header", 0, 3, "Conclusion"),
                block("para", 1, 4, "Done."),
            ])
        }
    }

    fn layout_builder(embedder: CountingEmbedder, batch_size: usize) -> VectorDbBuilder {
        VectorDbBuilder::layout(Box::new(embedder), Box::new(FakeLayout), batch_size)
    }

    #[tokio::test]
    async fn test_layout_mode_rows_and_failed_files() {
        let embedder = CountingEmbedder::default();
        let builder = layout_builder(embedder.clone(), 2);
        let files = vec![PathBuf::from("good.pdf"), PathBuf::from("bad.pdf")];

        let outcome = builder.build(&files, &ProgressBar::hidden()).await;

        assert_eq!(outcome.failed, vec![PathBuf::from("bad.pdf")]);
        assert_eq!(outcome.stats.files_failed, 1);
        assert_eq!(outcome.table.len(), 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let first = &outcome.table.rows[0];
        assert_eq!(first.file_id, "good");
        assert_eq!(first.chunk_id, 0);
        assert_eq!(first.text, "Introduction\nFirst paragraph.");
        assert_eq!(first.section, "Introduction");
        assert_eq!(outcome.table.rows[2].section, "Conclusion");
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped() {
        let embedder = CountingEmbedder {
            fail_on_call: Some(0),
            ..Default::default()
        };
        let builder = layout_builder(embedder, 2);

        let outcome = builder
            .build(&[PathBuf::from("good.pdf")], &ProgressBar::hidden())
            .await;

        assert_eq!(outcome.stats.chunks, 3);
        assert_eq!(outcome.stats.chunks_failed, 2);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.rows[0].chunk_id, 2);
    }

    #[tokio::test]
    async fn test_existing_output_is_reused_without_api_calls() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("query_vector_db.csv");
        let stored = VectorTable {
            rows: vec![VectorRow {
                file_id: "7".to_string(),
                chunk_id: 0,
                text: "stored".to_string(),
                vector_embedding: vec![0.5, 0.25],
                section: String::new(),
            }],
        };
        stored.write_csv(&output).unwrap();

        let embedder = CountingEmbedder::default();
        let builder = layout_builder(embedder.clone(), 10);
        let outcome = builder
            .load_or_build(
                &output,
                &[PathBuf::from("good.pdf")],
                false,
                &ProgressBar::hidden(),
            )
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.table, stored);
        assert!(outcome.stats.reused);
    }

    #[tokio::test]
    async fn test_recompute_rebuilds_and_writes_failed_list() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("candidate_vector_db.csv");
        std::fs::write(&output, "file_id,chunk_id,text,vector_embedding,section\n").unwrap();

        let embedder = CountingEmbedder::default();
        let builder = layout_builder(embedder.clone(), 10);
        let files = vec![PathBuf::from("good.pdf"), PathBuf::from("missing.pdf")];
        let outcome = builder
            .load_or_build(&output, &files, true, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(VectorTable::read_csv(&output).unwrap(), outcome.table);
        let failed = std::fs::read_to_string(failed_list_path(&output)).unwrap();
        assert_eq!(failed, "missing.pdf\n");
    }

    #[tokio::test]
    async fn test_text_mode_unreadable_pdf_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let embedder = CountingEmbedder::default();
        let chunker = TokenChunker::new("cl100k_base", 1000).unwrap();
        let builder = VectorDbBuilder::text(Box::new(embedder.clone()), chunker, 10);
        assert_eq!(builder.mode(), ChunkMode::Text);

        let outcome = builder.build(&[path.clone()], &ProgressBar::hidden()).await;
        assert_eq!(outcome.failed, vec![path]);
        assert!(outcome.table.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_chunk_mode_parse() {
        assert_eq!("Layout".parse::<ChunkMode>().unwrap(), ChunkMode::Layout);
        assert!("pages".parse::<ChunkMode>().is_err());
        assert_eq!(ChunkMode::Text.to_string(), "text");
    }

    #[test]
    fn test_failed_list_path() {
        assert_eq!(
            failed_list_path(Path::new("out/query_vector_db.csv")),
            PathBuf::from("out/query_vector_db.csv.failed")
        );
    }
}
