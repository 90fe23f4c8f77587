use crate::rag_response::{DocumentResponse, UploadResponse};
use doc_discovery::{
    check_preconditions, index_document, prepare_document, IndexedDocument, QueryResponse,
    QueryService, RagConfig, RagError, RawDocument, Result, ServiceProvider,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Sessions {
    documents: HashMap<Uuid, Arc<IndexedDocument>>,
    // oldest upload first
    order: VecDeque<Uuid>,
}

impl Sessions {
    fn insert(&mut self, id: Uuid, document: Arc<IndexedDocument>) -> bool {
        let replaced = self.documents.insert(id, document).is_some();
        self.order.retain(|existing| *existing != id);
        self.order.push_back(id);
        replaced
    }

    fn remove(&mut self, id: &Uuid) -> bool {
        self.order.retain(|existing| existing != id);
        self.documents.remove(id).is_some()
    }

    fn evict_beyond(&mut self, max_sessions: usize) -> Vec<Uuid> {
        let mut evicted = Vec::new();
        while self.documents.len() > max_sessions {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.documents.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }
}

/// In-memory sessions, each holding one uploaded document and its index. A new
/// upload to an existing session replaces its document wholesale. Past
/// `max_sessions`, the least recently uploaded session is dropped.
pub struct RagSystem {
    sessions: RwLock<Sessions>,
    provider: Arc<dyn ServiceProvider>,
    config: RagConfig,
    max_sessions: usize,
}

impl RagSystem {
    pub fn new(config: RagConfig, provider: Arc<dyn ServiceProvider>, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            provider,
            config,
            max_sessions: max_sessions.max(1),
        }
    }

    /// The request's own credential, else the server-wide default.
    pub fn resolve_credential(&self, request_credential: Option<String>) -> Option<String> {
        request_credential.or_else(|| self.config.api_key.clone())
    }

    pub async fn upload(
        &self,
        credential: Option<&str>,
        session_id: Option<Uuid>,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse> {
        let raw = RawDocument::from_upload(filename, bytes)?;
        let credential = credential
            .filter(|key| !key.trim().is_empty())
            .ok_or(RagError::MissingCredential)?;

        let max_chunk_chars = self.config.max_chunk_chars;
        let format = raw.format;
        let prepared = tokio::task::spawn_blocking(move || prepare_document(&raw, max_chunk_chars))
            .await
            .map_err(|e| RagError::DocumentParse {
                format: format.to_string(),
                message: format!("parser task failed: {}", e),
            })??;

        let chunk_count = prepared.chunks.len();
        let estimated = self.config.indexer.estimated_wait(chunk_count);
        let embedder = self.provider.embedder(credential)?;
        let indexed = index_document(prepared, embedder, self.config.indexer).await?;

        let session_id = session_id.unwrap_or_else(Uuid::new_v4);
        let response = UploadResponse {
            session_id,
            filename: indexed.document.filename.clone(),
            pages: indexed.document.pages.len(),
            chunks: chunk_count,
            estimated_seconds: estimated.as_secs(),
        };

        let (replaced, evicted) = {
            let mut sessions = self.sessions.write().await;
            let replaced = sessions.insert(session_id, Arc::new(indexed));
            (replaced, sessions.evict_beyond(self.max_sessions))
        };
        for id in evicted {
            log::info!("Session {} evicted, limit of {} reached", id, self.max_sessions);
        }
        log::info!(
            "Session {} {} with {} ({} chunks)",
            session_id,
            if replaced { "updated" } else { "created" },
            response.filename,
            chunk_count
        );

        Ok(response)
    }

    pub async fn query(
        &self,
        credential: Option<&str>,
        session_id: Option<Uuid>,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<QueryResponse> {
        let session = self.session(session_id).await;
        check_preconditions(credential, session.as_ref().map(|s| s.index.as_ref()), query)?;

        let credential = credential.ok_or(RagError::MissingCredential)?;
        let session = session.ok_or(RagError::MissingIndex)?;

        let query_service = QueryService::new(
            self.provider.embedder(credential)?,
            self.provider.completer(credential)?,
        );
        query_service
            .query(
                Some(session.index.as_ref()),
                query,
                top_k.unwrap_or(self.config.top_k),
            )
            .await
    }

    pub async fn document(&self, session_id: Uuid) -> Result<DocumentResponse> {
        let session = self
            .session(Some(session_id))
            .await
            .ok_or(RagError::MissingIndex)?;

        Ok(DocumentResponse {
            session_id,
            filename: session.document.filename.clone(),
            text: session.document.full_text(),
            pages: session.document.pages.clone(),
        })
    }

    /// Drops the session's document and index.
    pub async fn remove(&self, session_id: Uuid) -> Result<()> {
        if !self.sessions.write().await.remove(&session_id) {
            return Err(RagError::MissingIndex);
        }
        log::info!("Session {} removed", session_id);
        Ok(())
    }

    async fn session(&self, session_id: Option<Uuid>) -> Option<Arc<IndexedDocument>> {
        let id = session_id?;
        self.sessions.read().await.documents.get(&id).cloned()
    }
}
