use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("File type not supported: {0}")]
    UnsupportedFormat(String),

    #[error("No text could be extracted from the document")]
    EmptyInput,

    #[error("Failed to read {format} document: {message}")]
    DocumentParse { format: String, message: String },

    /// Carries the embedding service's own message.
    #[error("{0}")]
    EmbeddingService(String),

    /// Carries the completion service's own message.
    #[error("{0}")]
    CompletionService(String),

    #[error("Please enter a question!")]
    MissingQuery,

    #[error("Please upload a document!")]
    MissingIndex,

    #[error("Please configure your Gemini API key!")]
    MissingCredential,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::EmptyInput => "empty_input",
            Self::DocumentParse { .. } => "document_parse",
            Self::EmbeddingService(_) => "embedding_service",
            Self::CompletionService(_) => "completion_service",
            Self::MissingQuery => "missing_query",
            Self::MissingIndex => "missing_index",
            Self::MissingCredential => "missing_credential",
            Self::Config(_) => "config",
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingQuery | Self::MissingIndex | Self::MissingCredential
        )
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
