use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use anyhow::anyhow;
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tokio::sync::Semaphore;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, warn};

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackendKind},
};

/// Inputs longer than this are clamped before being sent to the provider.
const EMBEDDING_INPUT_CHAR_LIMIT: usize = 12_000;
const RETRY_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
    /// Bounds concurrent provider calls so batch embedding cannot overwhelm
    /// the provider or blow through its rate limits.
    permits: Arc<Semaphore>,
    timeout: Duration,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match config.embedding_backend {
            EmbeddingBackendKind::OpenAI => {
                let client = openai_client.ok_or_else(|| {
                    AppError::Internal("OpenAI embedding backend requires a client".into())
                })?;
                Ok(Self::new_openai(
                    client,
                    config.embedding_model.clone(),
                    config.embedding_dimensions,
                    config.embedding_concurrency,
                    Duration::from_secs(config.provider_timeout_secs),
                ))
            }
            EmbeddingBackendKind::Hashed => Ok(Self::new_hashed(
                config.embedding_dimensions as usize,
                config.embedding_concurrency,
            )),
        }
    }

    pub fn new_openai(
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
        }
    }

    pub fn new_hashed(dimension: usize, concurrency: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    /// Embed a single search query. Same model and dimensionality as chunk
    /// embedding, so query and chunk vectors stay comparable.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embed_one_with_retry(text).await
    }

    /// Embed a batch of chunk texts, preserving input order. Calls run with
    /// bounded concurrency; each input is retried independently so one bad
    /// item does not discard embeddings already obtained for the others.
    pub async fn embed_chunks(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let futures = texts.iter().map(|text| self.embed_one_with_retry(text));
        futures::future::try_join_all(futures).await
    }

    async fn embed_one_with_retry(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let clamped = truncate_for_embedding(text, EMBEDDING_INPUT_CHAR_LIMIT);

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .map(jitter)
            .take(RETRY_ATTEMPTS as usize);

        let result = Retry::spawn(retry_strategy, || async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| AppError::Internal("embedding semaphore closed".into()))?;

            match tokio::time::timeout(self.timeout, self.embed_once(&clamped)).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(
                        timeout_secs = self.timeout.as_secs(),
                        "embedding provider call timed out"
                    );
                    Err(AppError::Internal("embedding provider call timed out".into()))
                }
            }
        })
        .await;

        result.map_err(|err| AppError::EmbeddingExhausted {
            attempts: RETRY_ATTEMPTS,
            reason: err.to_string(),
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embedding = response
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        AppError::Anyhow(anyhow!("No embedding data received from provider"))
                    })?
                    .embedding;

                debug!(dimensions = embedding.len(), "embedding generated");

                Ok(embedding)
            }
        }
    }
}

// Feature-hashing embedding: tokenize on non-alphanumerics, hash each token
// into a bucket, L2-normalize. Deterministic, so cosine scores are stable
// across runs, which is what the tests rely on.
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

fn truncate_for_embedding(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    text.chars().take(max_chars).collect()
}
