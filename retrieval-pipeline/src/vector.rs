//! Nearest-neighbor lookup over the chunk index. The HNSW index on
//! `document_chunk.embedding` serves the `<|k,ef|>` operator; distances come
//! back cosine, matching the index definition.

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::document_chunk::deserialize_flexible_id},
};
use serde::Deserialize;
use tracing::debug;

/// Search-effort parameter for the HNSW traversal.
const KNN_EF: usize = 40;

/// One raw index match, before thresholding and scoring.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkMatch {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub document_id: String,
    pub ordinal: u32,
    pub content: String,
    pub owner_id: Option<String>,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f32,
}

/// Return up to `top_k` chunks closest to `embedding`, ascending by
/// distance, optionally restricted to one owner's documents.
pub async fn find_similar_chunks(
    db: &SurrealDbClient,
    embedding: Vec<f32>,
    top_k: usize,
    owner_id: Option<&str>,
) -> Result<Vec<ChunkMatch>, AppError> {
    let top_k = top_k.max(1);

    // k and ef are operator syntax, not bindable; the vector and owner are
    // bound as parameters.
    let query = if owner_id.is_some() {
        format!(
            "SELECT id, document_id, ordinal, content, owner_id, \
                    vector::distance::knn() AS distance \
             FROM document_chunk \
             WHERE owner_id = $owner_id AND embedding <|{top_k},{KNN_EF}|> $embedding \
             ORDER BY distance"
        )
    } else {
        format!(
            "SELECT id, document_id, ordinal, content, owner_id, \
                    vector::distance::knn() AS distance \
             FROM document_chunk \
             WHERE embedding <|{top_k},{KNN_EF}|> $embedding \
             ORDER BY distance"
        )
    };

    let mut request = db.client.query(query).bind(("embedding", embedding));
    if let Some(owner) = owner_id {
        request = request.bind(("owner_id", owner.to_string()));
    }

    let matches: Vec<ChunkMatch> = request.await?.take(0)?;
    debug!(match_count = matches.len(), top_k, "vector index query returned");

    Ok(matches)
}
