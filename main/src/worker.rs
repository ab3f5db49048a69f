use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::{
        config::{get_config, EmbeddingBackendKind},
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::{pipeline::IngestionPipeline, run_worker_loop};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

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
        EmbeddingBackendKind::OpenAI => Some(Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ))),
        EmbeddingBackendKind::Hashed => None,
    };
    let embedding_provider = Arc::new(EmbeddingProvider::from_config(&config, openai_client)?);
    tracing::info!(
        backend = embedding_provider.backend_label(),
        dimensions = embedding_provider.dimension(),
        "embedding provider ready"
    );

    db.ensure_initialized(embedding_provider.dimension()).await?;

    let storage = Arc::new(StorageManager::new(&config).await?);

    let pipeline = Arc::new(IngestionPipeline::new(
        db.clone(),
        embedding_provider,
        storage,
        &config,
    )?);

    run_worker_loop(db, pipeline).await
}
