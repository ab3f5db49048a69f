use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("File too large: {size} bytes exceeds the {limit} byte ceiling")]
    Oversize { size: u64, limit: u64 },
    #[error("Document is encrypted and cannot be extracted")]
    Encrypted,
    #[error("Empty or corrupt input: {0}")]
    CorruptInput(String),
    #[error("Embedding provider exhausted after {attempts} attempts: {reason}")]
    EmbeddingExhausted { attempts: u32, reason: String },
    #[error("Index write failure: {0}")]
    IndexWrite(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short stage/reason code carried into task records and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::OpenAI(_) => "embedding-provider",
            Self::UnsupportedFormat(_) => "unsupported-format",
            Self::Oversize { .. } => "oversize",
            Self::Encrypted => "encrypted",
            Self::CorruptInput(_) => "corrupt-input",
            Self::EmbeddingExhausted { .. } => "embedding-exhausted",
            Self::IndexWrite(_) => "index-write",
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Join(_) | Self::Io(_) | Self::Anyhow(_) | Self::Internal(_) => "internal",
            Self::Reqwest(_) => "upstream-http",
            Self::ObjectStore(_) => "object-storage",
        }
    }

    /// Whether the ingestion pipeline may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::OpenAI(_)
                | Self::IndexWrite(_)
                | Self::Reqwest(_)
                | Self::Io(_)
        )
    }
}
