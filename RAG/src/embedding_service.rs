use crate::config::GeminiConfig;
use crate::error::{RagError, Result};
use crate::gemini_service::{build_client, post_json};
use crate::models::*;
use async_trait::async_trait;
use reqwest::Client;

/// Turns text into fixed-length vectors. Implementations must return one vector
/// per input, in input order, and the query and document vectors must share one
/// embedding space.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingService("No embedding returned for query".to_string()))
    }
}

pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiEmbedder {
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

    async fn batch_embed(&self, texts: &[String], task_type: &str) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", self.config.embedding_model);
        let request = GeminiBatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: model.clone(),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: text.clone() }],
                    },
                    task_type: task_type.to_string(),
                })
                .collect(),
        };

        let url = format!(
            "{}/{}:batchEmbedContents?key={}",
            self.config.base_url, model, self.api_key
        );

        log::debug!("Embedding {} text(s) with {}", texts.len(), model);
        let response: GeminiBatchEmbedResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(RagError::EmbeddingService)?;

        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.batch_embed(texts, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.batch_embed(&[query.to_string()], "RETRIEVAL_QUERY")
            .await?
            .pop()
            .ok_or_else(|| RagError::EmbeddingService("No embedding returned for query".to_string()))
    }
}

pub fn calculate_similarity(embedding1: &[f32], embedding2: &[f32]) -> f32 {
    let min_len = embedding1.len().min(embedding2.len());

    let dot_product: f32 = embedding1[..min_len]
        .iter()
        .zip(embedding2[..min_len].iter())
        .map(|(a, b)| a * b)
        .sum();

    let norm1: f32 = embedding1[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm2: f32 = embedding2[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm1 == 0.0 || norm2 == 0.0 {
        0.0
    } else {
        dot_product / (norm1 * norm2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((calculate_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_zero_vectors_score_zero() {
        assert_eq!(calculate_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(calculate_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn blank_credential_is_missing() {
        assert!(matches!(
            GeminiEmbedder::new("  ", GeminiConfig::default()),
            Err(RagError::MissingCredential)
        ));
    }

    struct Doubling;

    #[async_trait]
    impl Embedder for Doubling {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32 * 2.0]).collect())
        }
    }

    #[tokio::test]
    async fn default_query_embedding_uses_document_path() {
        assert_eq!(Doubling.embed_query("abc").await.unwrap(), vec![6.0]);
    }
}
