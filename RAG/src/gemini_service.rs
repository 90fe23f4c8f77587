use crate::config::GeminiConfig;
use crate::embedding_service::{Embedder, GeminiEmbedder};
use crate::error::{RagError, Result};
use crate::models::*;
use crate::pipeline::ServiceProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Produces free-form text for a prompt.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiService {
    client: Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiService {
    pub fn new(api_key: &str, config: GeminiConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::MissingCredential);
        }

        Ok(Self {
            client: build_client(&config)?,
            api_key: api_key.to_string(),
            config,
        })
    }
}

#[async_trait]
impl Completer for GeminiService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );

        let gemini_response: GeminiResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(RagError::CompletionService)?;

        let answer = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "No response generated".to_string());

        Ok(answer)
    }
}

/// Builds Gemini-backed services for whichever credential a request carries.
#[derive(Debug, Clone, Default)]
pub struct GeminiProvider {
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }
}

impl ServiceProvider for GeminiProvider {
    fn embedder(&self, credential: &str) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(GeminiEmbedder::new(credential, self.config.clone())?))
    }

    fn completer(&self, credential: &str) -> Result<Arc<dyn Completer>> {
        Ok(Arc::new(GeminiService::new(credential, self.config.clone())?))
    }
}

pub(crate) fn build_client(config: &GeminiConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Posts a JSON body and decodes a JSON reply. Failures come back as the
/// service's own message so callers can surface it unmodified.
pub(crate) async fn post_json<Req, Resp>(
    client: &Client,
    url: &str,
    body: &Req,
) -> std::result::Result<Resp, String>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("Gemini API request failed: {}", e.without_url()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| format!("Failed to read Gemini API response: {}", e.without_url()))?;

    if !status.is_success() {
        log::error!("Gemini API returned {}", status);
        return Err(service_message(&text));
    }

    serde_json::from_str(&text).map_err(|e| format!("Unexpected Gemini API response: {}", e))
}

fn service_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("Gemini API error: {}", body))
}
