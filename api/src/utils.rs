use crate::auth::Credential;
use crate::query_payload::QueryPayload;
use crate::rag_response::{DocumentResponse, UploadResponse};
use crate::rag_utils::RagSystem;
use crate::upload_request::UploadRequest;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doc_discovery::{ErrorResponse, QueryResponse, RagError};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            RagError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RagError::EmptyInput | RagError::DocumentParse { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RagError::MissingQuery | RagError::MissingIndex => StatusCode::BAD_REQUEST,
            RagError::MissingCredential => StatusCode::UNAUTHORIZED,
            RagError::EmbeddingService(_) | RagError::CompletionService(_) => {
                StatusCode::BAD_GATEWAY
            }
            RagError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_precondition() {
            log::warn!("Rejected request: {}", self.0);
        } else {
            log::error!("Request failed ({}): {}", self.0.kind(), self.0);
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub async fn handle_upload(
    State(rag_system): State<Arc<RagSystem>>,
    Credential(credential): Credential,
    Query(request): Query<UploadRequest>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let credential = rag_system.resolve_credential(credential);
    let response = rag_system
        .upload(
            credential.as_deref(),
            request.session_id,
            &request.filename,
            body.to_vec(),
        )
        .await?;
    Ok(Json(response))
}

pub async fn handle_query(
    State(rag_system): State<Arc<RagSystem>>,
    Credential(credential): Credential,
    Json(payload): Json<QueryPayload>,
) -> Result<Json<QueryResponse>, ApiError> {
    let credential = rag_system.resolve_credential(credential);
    let response = rag_system
        .query(
            credential.as_deref(),
            payload.session_id,
            &payload.query,
            payload.top_k,
        )
        .await?;
    Ok(Json(response))
}

pub async fn handle_document(
    State(rag_system): State<Arc<RagSystem>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, ApiError> {
    Ok(Json(rag_system.document(session_id).await?))
}

pub async fn handle_delete(
    State(rag_system): State<Arc<RagSystem>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    rag_system.remove(session_id).await?;
    Ok(Json(json!({ "status": "ok", "session_id": session_id })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
