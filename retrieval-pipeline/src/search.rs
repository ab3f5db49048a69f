//! Query-side retrieval: embed the query, run the vector index lookup,
//! threshold and rank, and shape results for callers.

use std::collections::HashMap;
use std::sync::Arc;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::document::Document},
    utils::embedding::EmbeddingProvider,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    scoring::{distance_to_similarity, make_snippet},
    vector::find_similar_chunks,
};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;
pub const DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: String,
    pub title: String,
    pub snippet: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub total_results: usize,
}

pub struct SearchEngine {
    db: Arc<SurrealDbClient>,
    embedding: Arc<EmbeddingProvider>,
}

impl SearchEngine {
    pub fn new(db: Arc<SurrealDbClient>, embedding: Arc<EmbeddingProvider>) -> Self {
        Self { db, embedding }
    }

    /// Thresholded top-k semantic search. `limit` is clamped to 1..=50 and
    /// defaults to 10; `threshold` defaults to 0.5. A query matching nothing
    /// above the threshold returns empty results, never an error.
    #[instrument(skip_all, fields(limit, threshold))]
    pub async fn search(
        &self,
        query: &str,
        owner_id: Option<&str>,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<SearchResults, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::Validation(
                "search query must not be empty".into(),
            ));
        }

        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);

        let query_embedding = self.embedding.embed_query(query).await?;
        let matches =
            find_similar_chunks(&self.db, query_embedding, limit, owner_id).await?;

        // Matches arrive ascending by distance, so similarity is already
        // descending; the stable filter keeps tied scores in index order.
        let mut hits: Vec<(String, String, f32)> = Vec::new();
        for chunk_match in matches {
            let score = distance_to_similarity(chunk_match.distance);
            if score >= threshold {
                hits.push((chunk_match.document_id, chunk_match.content, score));
            }
        }

        let titles = self.titles_for(hits.iter().map(|(id, _, _)| id.as_str())).await?;

        let results: Vec<SearchHit> = hits
            .into_iter()
            .map(|(document_id, content, score)| {
                let title = titles
                    .get(&document_id)
                    .cloned()
                    .unwrap_or_else(|| document_id.clone());
                SearchHit {
                    document_id,
                    title,
                    snippet: make_snippet(&content),
                    score,
                }
            })
            .collect();

        debug!(total_results = results.len(), "search completed");

        Ok(SearchResults {
            total_results: results.len(),
            results,
        })
    }

    /// File names for the matched documents, one lookup per distinct id.
    async fn titles_for<'a>(
        &self,
        document_ids: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, AppError> {
        let mut titles = HashMap::new();
        for id in document_ids {
            if titles.contains_key(id) {
                continue;
            }
            // A chunk can outlive its document only transiently during a
            // delete; fall back to the id instead of failing the search.
            if let Ok(document) = Document::get(id, &self.db).await {
                titles.insert(id.to_string(), document.file_name);
            }
        }
        Ok(titles)
    }
}
