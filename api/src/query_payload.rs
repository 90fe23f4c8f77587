use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct QueryPayload {
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub query: String,
    pub top_k: Option<usize>,
}
