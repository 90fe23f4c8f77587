mod auth;
mod config;
mod query_payload;
mod rag_response;
mod rag_utils;
mod upload_request;
mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use config::ApiConfig;
use doc_discovery::{GeminiProvider, RagConfig};
use rag_utils::RagSystem;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utils::{handle_delete, handle_document, handle_query, handle_upload, health};

fn build_router(rag_system: Arc<RagSystem>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents", post(handle_upload))
        .route(
            "/documents/:session_id",
            get(handle_document).delete(handle_delete),
        )
        .route("/query", post(handle_query))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(rag_system)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let rag_config = RagConfig::from_env()?;
    let api_config = ApiConfig::from_env()?;
    if rag_config.api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; requests must send their own bearer credential");
    }

    let provider = Arc::new(GeminiProvider::new(rag_config.gemini.clone()));
    let rag_system = Arc::new(RagSystem::new(rag_config, provider, api_config.max_sessions));
    let app = build_router(rag_system, api_config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&api_config.bind_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
