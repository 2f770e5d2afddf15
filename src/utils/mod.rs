//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{collect_pdfs, content_hash, file_id, pdf_path_for, read_id_list};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{flatten_newlines, sanitize_text};
