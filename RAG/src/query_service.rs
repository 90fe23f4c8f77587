use crate::answerer::{get_sources, Answerer};
use crate::embedding_service::Embedder;
use crate::error::{RagError, Result};
use crate::gemini_service::Completer;
use crate::indexer::Index;
use crate::models::*;
use std::sync::Arc;

/// Checks, in order, that a credential is configured, a document has been
/// indexed and a question was asked. Runs before any service is contacted.
pub fn check_preconditions(
    credential: Option<&str>,
    index: Option<&Index>,
    query: &str,
) -> Result<()> {
    if credential.map_or(true, |key| key.trim().is_empty()) {
        return Err(RagError::MissingCredential);
    }
    if index.is_none() {
        return Err(RagError::MissingIndex);
    }
    if query.trim().is_empty() {
        return Err(RagError::MissingQuery);
    }
    Ok(())
}

/// Top-`k` chunks for `query`, most similar first. The query is embedded with
/// the same service that built the index.
pub async fn search(
    index: &Index,
    embedding_service: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<Chunk>> {
    let query_embedding = embedding_service.embed_query(query).await?;
    let relevant_chunks: Vec<Chunk> = index
        .nearest(&query_embedding, k)?
        .into_iter()
        .map(|(chunk, _)| chunk.clone())
        .collect();

    log::info!("Found {} relevant chunks", relevant_chunks.len());
    Ok(relevant_chunks)
}

pub struct QueryService {
    embedding_service: Arc<dyn Embedder>,
    answerer: Answerer,
}

impl QueryService {
    pub fn new(
        embedding_service: Arc<dyn Embedder>,
        completion_service: Arc<dyn Completer>,
    ) -> Self {
        Self {
            embedding_service,
            answerer: Answerer::new(completion_service),
        }
    }

    pub async fn query(
        &self,
        index: Option<&Index>,
        query: &str,
        max_results: usize,
    ) -> Result<QueryResponse> {
        let start_time = std::time::Instant::now();

        let index = index.ok_or(RagError::MissingIndex)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::MissingQuery);
        }

        let retrieved = search(index, self.embedding_service.as_ref(), query, max_results).await?;
        let answer = self.answerer.answer(&retrieved, query).await?;
        let sources = get_sources(&answer, &retrieved);

        let processing_time = start_time.elapsed().as_millis();
        log::info!(
            "Answered with {} of {} retrieved chunks cited in {}ms",
            sources.len(),
            retrieved.len(),
            processing_time
        );

        Ok(QueryResponse {
            status: "success".to_string(),
            response: answer.display_text().to_string(),
            sources,
            retrieved,
            processing_time_ms: processing_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_checked_first() {
        assert!(matches!(
            check_preconditions(None, None, ""),
            Err(RagError::MissingCredential)
        ));
        assert!(matches!(
            check_preconditions(Some(" "), None, "q"),
            Err(RagError::MissingCredential)
        ));
    }

    #[test]
    fn missing_index_is_reported_before_missing_query() {
        assert!(matches!(
            check_preconditions(Some("key"), None, ""),
            Err(RagError::MissingIndex)
        ));
    }
}
