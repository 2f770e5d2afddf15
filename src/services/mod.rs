pub mod chunker;
pub mod embedding;
pub mod fetcher;
pub mod graph;
pub mod ingest;
pub mod layout;
pub mod pdf_text;
pub mod relations;
pub mod scholar;
pub mod vector_db;

pub use chunker::TokenChunker;
pub use embedding::{Embedder, EmbeddingClient};
pub use fetcher::{FetchOutcome, FetchStats, PaperFetcher, build_http_client};
pub use graph::{GraphStore, Neo4jClient, Statement};
pub use ingest::{GraphIngester, IngestReport};
pub use layout::{LayoutParser, LayoutReader};
pub use pdf_text::extract_pdf_text;
pub use relations::{CitationMatrix, MatrixStats, RelationInputs, RelationReport, build_relations};
pub use scholar::{PaperMetadataSource, SemanticScholarClient};
pub use vector_db::{BuildOutcome, BuildStats, ChunkMode, VectorDbBuilder};
