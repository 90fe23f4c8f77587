use crate::config::IndexerConfig;
use crate::embedding_service::{calculate_similarity, Embedder};
use crate::error::{RagError, Result};
use crate::models::Chunk;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Chunks paired with their embeddings, in the order the chunks were produced.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct Index {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl Index {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Up to `k` chunks by descending cosine similarity. Equal scores keep
    /// insertion order.
    pub fn nearest(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(&Chunk, f32)>> {
        if !self.entries.is_empty() && query_embedding.len() != self.dimensions {
            return Err(RagError::EmbeddingService(format!(
                "Query embedding has {} dimensions but the index has {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(&Chunk, f32)> = self
            .entries
            .par_iter()
            .map(|entry| (&entry.chunk, calculate_similarity(query_embedding, &entry.embedding)))
            .collect();

        // sort_by is stable, so ties stay in insertion order. NaN ranks last.
        scored.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Spaces requests evenly so no more than `requests_per_minute` go out in any
/// 60-second window. The first request never waits.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Result<Self> {
        if requests_per_minute == 0 {
            return Err(RagError::Config(
                "requests_per_minute must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            interval: Duration::from_secs(60) / requests_per_minute,
            next_slot: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&mut self) {
        if let Some(slot) = self.next_slot {
            if slot > Instant::now() {
                log::debug!(
                    "Rate limit reached, waiting {:?}",
                    slot.saturating_duration_since(Instant::now())
                );
            }
            sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.interval);
    }
}

pub struct Indexer {
    embedding_service: Arc<dyn Embedder>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(embedding_service: Arc<dyn Embedder>, config: IndexerConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".to_string()));
        }
        // validates requests_per_minute
        RateLimiter::new(config.requests_per_minute)?;

        Ok(Self {
            embedding_service,
            config,
        })
    }

    pub fn batch_count(&self, chunk_count: usize) -> usize {
        self.config.batch_count(chunk_count)
    }

    pub fn estimated_wait(&self, chunk_count: usize) -> Duration {
        self.config.estimated_wait(chunk_count)
    }

    /// Embeds every chunk, one request per batch, and fails as a whole if any
    /// batch fails.
    pub async fn build_index(&self, chunks: Vec<Chunk>) -> Result<Index> {
        let mut limiter = RateLimiter::new(self.config.requests_per_minute)?;
        let total_batches = self.batch_count(chunks.len());
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dimensions = 0;

        log::info!(
            "Embedding {} chunks in {} batch(es) at {} requests/minute",
            chunks.len(),
            total_batches,
            self.config.requests_per_minute
        );

        for (batch_idx, batch) in chunks.chunks(self.config.batch_size).enumerate() {
            limiter.acquire().await;

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedding_service
                .embed_documents(&texts)
                .await
                .map_err(|e| {
                    log::error!("Embedding batch {}/{} failed: {}", batch_idx + 1, total_batches, e);
                    e
                })?;

            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingService(format!(
                    "Embedding service returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(vectors) {
                if dimensions == 0 {
                    dimensions = embedding.len();
                } else if embedding.len() != dimensions {
                    return Err(RagError::EmbeddingService(format!(
                        "Embedding dimensions changed from {} to {}",
                        dimensions,
                        embedding.len()
                    )));
                }
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    embedding,
                });
            }

            log::debug!("Embedded batch {}/{}", batch_idx + 1, total_batches);
        }

        log::info!("Index built with {} entries ({} dimensions)", entries.len(), dimensions);
        Ok(Index {
            entries,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    fn chunk(page: u32, idx: u32, content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata { page, chunk: idx },
        }
    }

    fn config(requests_per_minute: u32, batch_size: usize) -> IndexerConfig {
        IndexerConfig {
            requests_per_minute,
            batch_size,
        }
    }

    #[test]
    fn estimate_skips_the_trailing_wait() {
        let indexer = Indexer::new(Arc::new(LengthEmbedder), config(20, 10)).unwrap();
        assert_eq!(indexer.batch_count(25), 3);
        assert_eq!(indexer.estimated_wait(25), Duration::from_secs(6));
        assert_eq!(indexer.estimated_wait(10), Duration::ZERO);
        assert_eq!(indexer.estimated_wait(0), Duration::ZERO);
    }

    #[test]
    fn zero_budget_or_batch_is_rejected() {
        assert!(matches!(
            Indexer::new(Arc::new(LengthEmbedder), config(0, 10)),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            Indexer::new(Arc::new(LengthEmbedder), config(10, 0)),
            Err(RagError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_spaces_requests_by_interval() {
        let mut limiter = RateLimiter::new(30).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn index_keeps_chunk_order() {
        let chunks = vec![chunk(1, 0, "a"), chunk(1, 1, "bbb"), chunk(2, 0, "cc")];
        let indexer = Indexer::new(Arc::new(LengthEmbedder), config(60, 2)).unwrap();
        let index = indexer.build_index(chunks.clone()).await.unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimensions(), 2);
        assert_eq!(index.chunks().cloned().collect::<Vec<_>>(), chunks);
    }

    #[tokio::test(start_paused = true)]
    async fn short_batch_response_fails_the_build() {
        let chunks = vec![chunk(1, 0, "a"), chunk(1, 1, "b")];
        let indexer = Indexer::new(Arc::new(ShortEmbedder), config(60, 2)).unwrap();
        assert!(matches!(
            indexer.build_index(chunks).await,
            Err(RagError::EmbeddingService(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn nearest_ranks_and_breaks_ties_by_insertion() {
        let chunks = vec![chunk(1, 0, "aa"), chunk(1, 1, "bb"), chunk(1, 2, "cccc")];
        let indexer = Indexer::new(Arc::new(LengthEmbedder), config(60, 10)).unwrap();
        let index = indexer.build_index(chunks).await.unwrap();

        let hits = index.nearest(&[2.0, 1.0], 2).unwrap();
        let ids: Vec<String> = hits.iter().map(|(c, _)| c.source_id()).collect();
        assert_eq!(ids, vec!["1-0", "1-1"]);

        assert!(matches!(
            index.nearest(&[1.0, 2.0, 3.0], 1),
            Err(RagError::EmbeddingService(_))
        ));
        assert!(index.nearest(&[2.0, 1.0], 0).unwrap().is_empty());
    }

    struct NanEmbedder;

    #[async_trait]
    impl Embedder for NanEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "broken" => vec![f32::NAN, 1.0],
                    _ => vec![t.len() as f32, 1.0],
                })
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nan_scores_do_not_break_ranking() {
        let chunks = vec![
            chunk(1, 0, "a"),
            chunk(1, 1, "broken"),
            chunk(1, 2, "bb"),
            chunk(2, 0, "broken"),
            chunk(2, 1, "ccc"),
        ];
        let indexer = Indexer::new(Arc::new(NanEmbedder), config(60, 10)).unwrap();
        let index = indexer.build_index(chunks).await.unwrap();

        let top: Vec<String> = index
            .nearest(&[1.0, 1.0], 3)
            .unwrap()
            .iter()
            .map(|(c, _)| c.source_id())
            .collect();
        assert_eq!(top, vec!["1-0", "1-2", "2-1"]);

        let all = index.nearest(&[1.0, 1.0], 5).unwrap();
        let tail: Vec<String> = all[3..].iter().map(|(c, _)| c.source_id()).collect();
        assert_eq!(tail, vec!["1-1", "2-0"]);
        assert!(all[3..].iter().all(|(_, score)| score.is_nan()));
    }
}
