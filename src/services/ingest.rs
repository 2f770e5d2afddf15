//! Loads parsed PDF layouts into the graph and links cited documents.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::GraphError;
use crate::models::{Chunk, LayoutDocument, Section};
use crate::services::graph::{GraphStore, Statement};
use crate::services::layout::LayoutParser;
use crate::services::relations::CitationMatrix;
use crate::utils::file::{content_hash, file_id};

const SCHEMA: &[&str] = &[
    "CREATE CONSTRAINT sectionKey IF NOT EXISTS FOR (s:Section) REQUIRE (s.key) IS UNIQUE",
    "CREATE CONSTRAINT chunkKey IF NOT EXISTS FOR (c:Chunk) REQUIRE (c.key) IS UNIQUE",
    "CREATE CONSTRAINT documentKey IF NOT EXISTS FOR (d:Document) REQUIRE (d.url_hash) IS UNIQUE",
];

const MERGE_DOCUMENT: &str = "MERGE (d:Document {url_hash: $url_hash}) \
     ON CREATE SET d.url = $url, d.ingested_at = $ingested_at";

const MERGE_SECTION: &str = "MERGE (s:Section {key: $key}) \
     ON CREATE SET s.page_idx = $page_idx, s.title_hash = $title_hash, s.block_idx = $block_idx, \
     s.title = $title, s.tag = $tag, s.level = $level";

const LINK_SECTION_DOCUMENT: &str = "MATCH (d:Document {url_hash: $url_hash}) \
     MATCH (s:Section {key: $key}) MERGE (d)<-[:HAS_DOCUMENT]-(s)";

const LINK_SECTION_PARENT: &str = "MATCH (p:Section {key: $parent_key}) \
     MATCH (s:Section {key: $key}) MERGE (p)<-[:UNDER_SECTION]-(s)";

const MERGE_CHUNK: &str = "MERGE (c:Chunk {key: $key}) \
     ON CREATE SET c.sentences = $sentences, c.sentences_hash = $sentences_hash, \
     c.block_idx = $block_idx, c.page_idx = $page_idx, c.tag = $tag, c.level = $level";

const LINK_CHUNK_SECTION: &str = "MATCH (c:Chunk {key: $key}) \
     MATCH (s:Section {key: $section_key}) MERGE (s)<-[:HAS_PARENT]-(c)";

const LINK_CITATION: &str = "MATCH (citing:Document {url_hash: $citing}), \
     (cited:Document {url_hash: $cited}) MERGE (citing)-[:CITES]->(cited)";

const TABLE_TAG: &str = "table";

fn section_key(url_hash: &str, section: &Section) -> String {
    format!(
        "{}|{}|{}",
        url_hash,
        section.block_idx,
        content_hash(&section.title)
    )
}

fn chunk_key(url_hash: &str, chunk: &Chunk) -> String {
    format!(
        "{}|{}|{}",
        url_hash,
        chunk.block_idx,
        content_hash(&chunk.sentences_text())
    )
}

/// Node counts for one ingested document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    pub sections: usize,
    pub chunks: usize,
    pub linked_chunks: usize,
}

/// The statements that load `doc`, in document order, and their node counts.
pub fn document_statements(
    doc: &LayoutDocument,
    location: &str,
    url_hash: &str,
) -> (Vec<Statement>, DocumentCounts) {
    let mut statements = vec![
        Statement::new(MERGE_DOCUMENT)
            .param("url_hash", url_hash)
            .param("url", location)
            .param("ingested_at", Utc::now().to_rfc3339()),
    ];
    let mut counts = DocumentCounts::default();

    for section in doc.sections().iter().filter(|s| s.tag != TABLE_TAG) {
        let key = section_key(url_hash, section);
        statements.push(
            Statement::new(MERGE_SECTION)
                .param("key", key.as_str())
                .param("page_idx", section.page_idx)
                .param("title_hash", content_hash(&section.title))
                .param("block_idx", section.block_idx)
                .param("title", section.title.as_str())
                .param("tag", section.tag.as_str())
                .param("level", section.level),
        );

        let link = match section.parent.and_then(|idx| doc.section(idx)) {
            Some(parent) => Statement::new(LINK_SECTION_PARENT)
                .param("parent_key", section_key(url_hash, parent))
                .param("key", key),
            None => Statement::new(LINK_SECTION_DOCUMENT)
                .param("url_hash", url_hash)
                .param("key", key),
        };
        statements.push(link);
        counts.sections += 1;
    }

    for chunk in doc.chunks().iter().filter(|c| c.tag != TABLE_TAG) {
        let key = chunk_key(url_hash, chunk);
        let sentences = chunk.sentences_text();
        statements.push(
            Statement::new(MERGE_CHUNK)
                .param("key", key.as_str())
                .param("sentences_hash", content_hash(&sentences))
                .param("sentences", sentences)
                .param("block_idx", chunk.block_idx)
                .param("page_idx", chunk.page_idx)
                .param("tag", chunk.tag.as_str())
                .param("level", chunk.level),
        );
        counts.chunks += 1;

        if let Some(parent) = doc.parent_of(chunk) {
            statements.push(
                Statement::new(LINK_CHUNK_SECTION)
                    .param("key", key)
                    .param("section_key", section_key(url_hash, parent)),
            );
            counts.linked_chunks += 1;
        }
    }

    (statements, counts)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub sections: usize,
    pub chunks: usize,
    pub linked_chunks: usize,
    pub citations: usize,
    pub failed: Vec<PathBuf>,
    /// Document hash per corpus ID (the numeric file stem).
    #[serde(skip)]
    pub doc_hashes: HashMap<u64, String>,
}

pub struct GraphIngester {
    store: Box<dyn GraphStore>,
}

impl GraphIngester {
    pub fn new(store: Box<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Uniqueness constraints for section, chunk and document keys.
    pub async fn ensure_schema(&self) -> Result<(), GraphError> {
        for cypher in SCHEMA {
            self.store.execute(vec![Statement::new(*cypher)]).await?;
        }
        Ok(())
    }

    /// Load one document in a single transaction and return its URL hash.
    pub async fn ingest_document(
        &self,
        doc: &LayoutDocument,
        location: &str,
    ) -> Result<String, GraphError> {
        Ok(self.ingest_counted(doc, location).await?.0)
    }

    async fn ingest_counted(
        &self,
        doc: &LayoutDocument,
        location: &str,
    ) -> Result<(String, DocumentCounts), GraphError> {
        let url_hash = content_hash(location);
        debug!(
            location,
            sections = doc.sections().len(),
            chunks = doc.chunks().len(),
            "ingesting document"
        );

        let (statements, counts) = document_statements(doc, location, &url_hash);
        self.store.execute(statements).await?;

        debug!(
            location,
            sections = counts.sections,
            chunks = counts.chunks,
            linked_chunks = counts.linked_chunks,
            "document ingested"
        );
        Ok((url_hash, counts))
    }

    /// `CITES` edges for every set cell whose row and column documents were
    /// both ingested. Returns the number of edges merged.
    pub async fn create_document_links(
        &self,
        matrix: &CitationMatrix,
        doc_hashes: &HashMap<u64, String>,
    ) -> Result<usize, GraphError> {
        let statements: Vec<Statement> = matrix
            .links()
            .filter_map(|(citing, cited)| {
                let citing = doc_hashes.get(&citing)?;
                let cited = doc_hashes.get(&cited)?;
                Some(
                    Statement::new(LINK_CITATION)
                        .param("citing", citing.as_str())
                        .param("cited", cited.as_str()),
                )
            })
            .collect();

        let count = statements.len();
        self.store.execute(statements).await?;
        Ok(count)
    }

    /// Parse and ingest each file; a file that fails is logged and skipped.
    pub async fn ingest_files(
        &self,
        parser: &dyn LayoutParser,
        files: &[PathBuf],
        progress: &ProgressBar,
    ) -> IngestReport {
        let mut report = IngestReport::default();

        for path in files {
            let location = path.display().to_string();
            progress.set_message(file_id(path));

            let result = match parser.read_pdf(path).await {
                Ok(doc) => self
                    .ingest_counted(&doc, &location)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok((url_hash, counts)) => {
                    report.documents += 1;
                    report.sections += counts.sections;
                    report.chunks += counts.chunks;
                    report.linked_chunks += counts.linked_chunks;
                    if let Ok(corpus_id) = file_id(path).parse::<u64>() {
                        report.doc_hashes.insert(corpus_id, url_hash);
                    }
                }
                Err(e) => {
                    warn!(path = %location, error = %e, "skipping document");
                    report.failed.push(path.clone());
                }
            }
            progress.inc(1);
        }

        info!(
            documents = report.documents,
            failed = report.failed.len(),
            "documents processed"
        );
        report
    }
}
