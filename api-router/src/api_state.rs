use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::{
        config::{AppConfig, EmbeddingBackendKind},
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::SearchEngine;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: Arc<StorageManager>,
    pub pipeline: Arc<IngestionPipeline>,
    pub search: Arc<SearchEngine>,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        let openai_client = match config.embedding_backend {
            EmbeddingBackendKind::OpenAI => {
                let openai_config = OpenAIConfig::new()
                    .with_api_key(config.openai_api_key.clone())
                    .with_api_base(config.openai_base_url.clone());
                Some(Arc::new(Client::with_config(openai_config)))
            }
            EmbeddingBackendKind::Hashed => None,
        };
        let embedding = Arc::new(EmbeddingProvider::from_config(config, openai_client)?);
        info!(
            backend = embedding.backend_label(),
            dimensions = embedding.dimension(),
            "embedding provider ready"
        );

        // The chunk index dimension follows the provider; schema setup is
        // idempotent across restarts.
        db.ensure_initialized(embedding.dimension()).await?;

        let storage = Arc::new(StorageManager::new(config).await?);
        Self::assemble(db, config.clone(), storage, embedding)
    }

    /// Wire up the state from already-built components. Tests use this with
    /// an in-memory database and the hashed embedding backend.
    pub fn assemble(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        storage: Arc<StorageManager>,
        embedding: Arc<EmbeddingProvider>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&embedding),
            Arc::clone(&storage),
            &config,
        )?);
        let search = Arc::new(SearchEngine::new(Arc::clone(&db), embedding));

        Ok(Self {
            db,
            config,
            storage,
            pipeline,
            search,
        })
    }
}
