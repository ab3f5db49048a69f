use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(DocumentChunk, "document_chunk", {
    document_id: String,
    ordinal: u32,
    content: String,
    embedding: Vec<f32>,
    owner_id: Option<String>
});

impl DocumentChunk {
    pub fn new(
        document_id: String,
        ordinal: u32,
        content: String,
        embedding: Vec<f32>,
        owner_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            ordinal,
            content,
            embedding,
            owner_id,
        }
    }

    /// Replace the full chunk set for a document in one transaction, so a
    /// concurrent search never observes a mix of old and new chunks.
    pub async fn replace_for_document(
        document_id: &str,
        chunks: Vec<DocumentChunk>,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        const QUERY: &str = r#"
            BEGIN TRANSACTION;
            DELETE document_chunk WHERE document_id = $document_id;
            FOR $chunk IN $chunks {
                CREATE type::thing('document_chunk', $chunk.id) CONTENT {
                    document_id: $chunk.document_id,
                    ordinal: $chunk.ordinal,
                    content: $chunk.content,
                    embedding: $chunk.embedding,
                    owner_id: $chunk.owner_id,
                    created_at: $chunk.created_at,
                    updated_at: $chunk.updated_at
                };
            };
            COMMIT TRANSACTION;
        "#;

        db.client
            .query(QUERY)
            .bind(("document_id", document_id.to_string()))
            .bind(("chunks", chunks))
            .await
            .map_err(|err| AppError::IndexWrite(err.to_string()))?;

        Ok(())
    }

    /// Remove every chunk for a document. Safe to call for a document with no
    /// chunks; the predicate delete is a no-op then.
    pub async fn delete_by_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.client
            .query("DELETE document_chunk WHERE document_id = $document_id")
            .bind(("document_id", document_id.to_string()))
            .await?;

        Ok(())
    }

    pub async fn count_for_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<usize, AppError> {
        let mut result = db
            .client
            .query(
                "SELECT count() AS total FROM document_chunk \
                 WHERE document_id = $document_id GROUP ALL",
            )
            .bind(("document_id", document_id.to_string()))
            .await?;

        #[derive(serde::Deserialize)]
        struct CountRow {
            total: usize,
        }

        let row: Option<CountRow> = result.take(0)?;
        Ok(row.map_or(0, |r| r.total))
    }

    pub async fn for_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<DocumentChunk>, AppError> {
        let mut result = db
            .client
            .query(
                "SELECT * FROM document_chunk \
                 WHERE document_id = $document_id ORDER BY ordinal ASC",
            )
            .bind(("document_id", document_id.to_string()))
            .await?;

        let chunks: Vec<DocumentChunk> = result.take(0)?;
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SurrealDbClient {
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb")
    }

    fn chunk(document_id: &str, ordinal: u32, content: &str) -> DocumentChunk {
        DocumentChunk::new(
            document_id.to_string(),
            ordinal,
            content.to_string(),
            vec![0.1, 0.2, 0.3],
            Some("owner-1".into()),
        )
    }

    #[tokio::test]
    async fn test_replace_then_count() {
        let db = memory_db().await;

        DocumentChunk::replace_for_document(
            "doc-1",
            vec![chunk("doc-1", 0, "first"), chunk("doc-1", 1, "second")],
            &db,
        )
        .await
        .expect("replace");

        assert_eq!(
            DocumentChunk::count_for_document("doc-1", &db).await.expect("count"),
            2
        );

        // A second replace swaps the whole set, not appends to it.
        DocumentChunk::replace_for_document("doc-1", vec![chunk("doc-1", 0, "only")], &db)
            .await
            .expect("replace again");

        let remaining = DocumentChunk::for_document("doc-1", &db).await.expect("fetch");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "only");
        assert_eq!(remaining[0].ordinal, 0);
    }

    #[tokio::test]
    async fn test_delete_by_document_scopes_to_one_document() {
        let db = memory_db().await;

        DocumentChunk::replace_for_document("doc-a", vec![chunk("doc-a", 0, "a")], &db)
            .await
            .expect("store a");
        DocumentChunk::replace_for_document("doc-b", vec![chunk("doc-b", 0, "b")], &db)
            .await
            .expect("store b");

        DocumentChunk::delete_by_document("doc-a", &db).await.expect("delete a");

        assert_eq!(DocumentChunk::count_for_document("doc-a", &db).await.expect("count a"), 0);
        assert_eq!(DocumentChunk::count_for_document("doc-b", &db).await.expect("count b"), 1);
    }

    #[tokio::test]
    async fn test_delete_with_zero_chunks_is_noop() {
        let db = memory_db().await;

        DocumentChunk::delete_by_document("ghost", &db)
            .await
            .expect("delete on an unknown document id must not error");
    }
}
