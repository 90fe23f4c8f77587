use doc_discovery::Page;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub filename: String,
    pub pages: usize,
    pub chunks: usize,
    pub estimated_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DocumentResponse {
    pub session_id: Uuid,
    pub filename: String,
    pub text: String,
    pub pages: Vec<Page>,
}
