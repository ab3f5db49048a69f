use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Real provider: OpenAI-compatible embeddings endpoint.
    OpenAI,
    /// Deterministic feature-hashing stand-in for tests and offline demos.
    /// Never mixed with the real backend; selected explicitly here.
    Hashed,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackendKind,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    /// Optional HTTP endpoint of the optical text recognition collaborator.
    /// When unset, scanned PDFs degrade to a placeholder instead.
    #[serde(default)]
    pub ocr_endpoint: Option<String>,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_embedding_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::OpenAI
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_embedding_concurrency() -> usize {
    4
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_chunk_max_chars() -> usize {
    500
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(any(test, feature = "test-utils"))]
impl AppConfig {
    /// In-memory everything; useful for tests that never touch the network.
    pub fn for_tests() -> Self {
        Self {
            surrealdb_address: "mem://".into(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: "test".into(),
            surrealdb_database: "test".into(),
            http_port: 0,
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            embedding_backend: EmbeddingBackendKind::Hashed,
            embedding_model: default_embedding_model(),
            embedding_dimensions: 16,
            embedding_concurrency: default_embedding_concurrency(),
            provider_timeout_secs: default_provider_timeout_secs(),
            data_dir: String::new(),
            storage: StorageKind::Memory,
            max_file_bytes: 1024 * 1024,
            chunk_max_chars: default_chunk_max_chars(),
            ocr_endpoint: None,
        }
    }
}
