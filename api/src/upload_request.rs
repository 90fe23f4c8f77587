use serde::Deserialize;
use uuid::Uuid;

/// Query string of `POST /documents`. The body is the raw file.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Replaces the document of an existing session instead of opening a new one.
    pub session_id: Option<Uuid>,
}
