pub mod answerer;
pub mod chunker;
pub mod config;
pub mod document_processor;
pub mod embedding_service;
pub mod error;
pub mod gemini_service;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod query_service;

pub use answerer::{get_sources, Answerer};
pub use chunker::chunk_pages;
pub use config::{GeminiConfig, IndexerConfig, RagConfig};
pub use document_processor::DocumentProcessor;
pub use embedding_service::{Embedder, GeminiEmbedder};
pub use error::{RagError, Result};
pub use gemini_service::{Completer, GeminiProvider, GeminiService};
pub use indexer::{Index, Indexer, RateLimiter};
pub use models::*;
pub use pipeline::{
    index_document, prepare_document, IndexedDocument, PreparedDocument, ServiceProvider,
};
pub use query_service::{check_preconditions, search, QueryService};
