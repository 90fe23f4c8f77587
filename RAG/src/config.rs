use crate::error::{RagError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 20;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: 0.0,
            max_output_tokens: 1000,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexerConfig {
    pub requests_per_minute: u32,
    pub batch_size: usize,
}

impl IndexerConfig {
    pub fn batch_count(&self, chunk_count: usize) -> usize {
        chunk_count.div_ceil(self.batch_size.max(1))
    }

    /// Lower bound on the time spent waiting on the rate limit while indexing
    /// `chunk_count` chunks. The last batch never waits.
    pub fn estimated_wait(&self, chunk_count: usize) -> Duration {
        let interval = Duration::from_secs(60) / self.requests_per_minute.max(1);
        interval * self.batch_count(chunk_count).saturating_sub(1) as u32
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Fallback credential when a request does not bring its own.
    pub api_key: Option<String>,
    pub gemini: GeminiConfig,
    pub indexer: IndexerConfig,
    pub max_chunk_chars: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            gemini: GeminiConfig::default(),
            indexer: IndexerConfig::default(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl RagConfig {
    /// Reads settings from the process environment. Call `dotenv::dotenv()` first
    /// to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let gemini_defaults = defaults.gemini;

        let config = Self {
            api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            gemini: GeminiConfig {
                base_url: env::var("GEMINI_BASE_URL").unwrap_or(gemini_defaults.base_url),
                model: env::var("GEMINI_MODEL").unwrap_or(gemini_defaults.model),
                embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                    .unwrap_or(gemini_defaults.embedding_model),
                temperature: env_or("GEMINI_TEMPERATURE", gemini_defaults.temperature)?,
                max_output_tokens: env_or(
                    "GEMINI_MAX_OUTPUT_TOKENS",
                    gemini_defaults.max_output_tokens,
                )?,
                request_timeout: Duration::from_secs(env_or(
                    "GEMINI_REQUEST_TIMEOUT_SECS",
                    gemini_defaults.request_timeout.as_secs(),
                )?),
            },
            indexer: IndexerConfig {
                requests_per_minute: env_or(
                    "RAG_REQUESTS_PER_MINUTE",
                    defaults.indexer.requests_per_minute,
                )?,
                batch_size: env_or("RAG_EMBED_BATCH_SIZE", defaults.indexer.batch_size)?,
            },
            max_chunk_chars: env_or("RAG_MAX_CHUNK_CHARS", defaults.max_chunk_chars)?,
            top_k: env_or("RAG_TOP_K", defaults.top_k)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexer.requests_per_minute == 0 {
            return Err(RagError::Config(
                "RAG_REQUESTS_PER_MINUTE must be greater than zero".to_string(),
            ));
        }
        if self.indexer.batch_size == 0 {
            return Err(RagError::Config(
                "RAG_EMBED_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.max_chunk_chars == 0 {
            return Err(RagError::Config(
                "RAG_MAX_CHUNK_CHARS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| RagError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 5);
        assert_eq!(config.indexer.requests_per_minute, 20);
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let mut config = RagConfig::default();
        config.indexer.requests_per_minute = 0;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn unparsable_env_value_is_a_config_error() {
        env::set_var("DOC_DISCOVERY_TEST_NUMBER", "many");
        let parsed: Result<u32> = env_or("DOC_DISCOVERY_TEST_NUMBER", 3);
        assert!(matches!(parsed, Err(RagError::Config(_))));
        env::remove_var("DOC_DISCOVERY_TEST_NUMBER");
        assert_eq!(env_or("DOC_DISCOVERY_TEST_NUMBER", 3u32).unwrap(), 3);
    }
}
