mod config;
mod embed;
mod fetch;
mod ingest;
mod matrix;
mod status;

pub use config::ConfigCommand;
pub use embed::EmbedArgs;
pub use fetch::FetchArgs;
pub use ingest::IngestArgs;
pub use matrix::MatrixArgs;

pub use config::handle_config;
pub use embed::handle_embed;
pub use fetch::handle_fetch;
pub use ingest::handle_ingest;
pub use matrix::handle_matrix;
pub use status::handle_status;
