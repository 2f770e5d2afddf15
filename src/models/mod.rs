mod config;
mod format;
mod layout;
mod paper;
mod retrieval;
mod vector;

pub use config::{
    ChunkingConfig, Config, DEFAULT_EMBEDDING_MODEL, DEFAULT_ENCODING, DEFAULT_GRAPH_URL,
    DEFAULT_LAYOUT_URL, DEFAULT_SCHOLAR_URL, DEFAULT_USER_AGENT, DownloadConfig, EmbeddingConfig,
    GraphConfig, LayoutConfig, OutputConfig, ScholarConfig,
};
pub use format::OutputFormat;
pub use layout::{BlockKind, Chunk, LayoutBlock, LayoutDocument, Section};
pub use paper::{
    DOWNLOAD_FIELDS, DownloadedPaper, LinkRecord, OpenAccessPdf, Paper, append_links,
};
pub use retrieval::{QueryCandidates, RetrievalSet, SELF_MATCH_SCORE};
pub use vector::{VectorRow, VectorTable};
