//! Upload-to-index orchestration shared by the CLI and the HTTP API.

use crate::chunker::chunk_pages;
use crate::config::IndexerConfig;
use crate::document_processor::DocumentProcessor;
use crate::embedding_service::Embedder;
use crate::error::Result;
use crate::gemini_service::Completer;
use crate::indexer::{Index, Indexer};
use crate::models::*;
use std::sync::Arc;

/// Builds the model services for the credential carried by a request.
pub trait ServiceProvider: Send + Sync {
    fn embedder(&self, credential: &str) -> Result<Arc<dyn Embedder>>;
    fn completer(&self, credential: &str) -> Result<Arc<dyn Completer>>;
}

#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: ParsedDocument,
    pub chunks: Vec<Chunk>,
}

/// A parsed document together with the index built over its chunks.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: ParsedDocument,
    pub index: Arc<Index>,
}

/// Parses and chunks an upload. CPU-bound; no services are contacted.
pub fn prepare_document(raw: &RawDocument, max_chunk_chars: usize) -> Result<PreparedDocument> {
    let document = DocumentProcessor::new().process_upload(raw)?;
    let chunks = chunk_pages(&document.pages, max_chunk_chars)?;
    Ok(PreparedDocument { document, chunks })
}

pub async fn index_document(
    prepared: PreparedDocument,
    embedding_service: Arc<dyn Embedder>,
    config: IndexerConfig,
) -> Result<IndexedDocument> {
    let indexer = Indexer::new(embedding_service, config)?;

    let wait = indexer.estimated_wait(prepared.chunks.len());
    log::info!(
        "Estimated {} minutes wait to process {}",
        wait.as_secs().div_ceil(60),
        prepared.document.filename
    );

    let index = indexer.build_index(prepared.chunks).await?;
    Ok(IndexedDocument {
        document: prepared.document,
        index: Arc::new(index),
    })
}
