use state_machines::state_machine;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Processed,
    Cancelled,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Cancelled => "cancelled",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Processed | DocumentStatus::Cancelled | DocumentStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum DocumentTransition {
    StartProcessing,
    Complete,
    Fail,
    Cancel,
    Reindex,
}

impl DocumentTransition {
    fn as_str(&self) -> &'static str {
        match self {
            DocumentTransition::StartProcessing => "start_processing",
            DocumentTransition::Complete => "complete",
            DocumentTransition::Fail => "fail",
            DocumentTransition::Cancel => "cancel",
            DocumentTransition::Reindex => "reindex",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: DocumentLifecycleMachine,
        initial: Pending,
        states: [Pending, Processing, Processed, Cancelled, Failed],
        events {
            start_processing {
                transition: { from: Pending, to: Processing }
            }
            complete {
                transition: { from: Processing, to: Processed }
            }
            fail {
                transition: { from: Processing, to: Failed }
            }
            cancel {
                transition: { from: Pending, to: Cancelled }
                transition: { from: Processing, to: Cancelled }
            }
            reindex {
                transition: { from: Processed, to: Processing }
            }
        }
    }

    pub(super) fn pending() -> DocumentLifecycleMachine<(), Pending> {
        DocumentLifecycleMachine::new(())
    }

    pub(super) fn processing() -> DocumentLifecycleMachine<(), Processing> {
        pending()
            .start_processing()
            .expect("start_processing transition from Pending should exist")
    }

    pub(super) fn processed() -> DocumentLifecycleMachine<(), Processed> {
        processing()
            .complete()
            .expect("complete transition from Processing should exist")
    }
}

fn invalid_transition(status: &DocumentStatus, event: DocumentTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid document transition: {} -> {}",
        status.as_str(),
        event.as_str()
    ))
}

fn compute_next_status(
    status: &DocumentStatus,
    event: DocumentTransition,
) -> Result<DocumentStatus, AppError> {
    use lifecycle::*;
    match (status, event) {
        (DocumentStatus::Pending, DocumentTransition::StartProcessing) => pending()
            .start_processing()
            .map(|_| DocumentStatus::Processing)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processing, DocumentTransition::Complete) => processing()
            .complete()
            .map(|_| DocumentStatus::Processed)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processing, DocumentTransition::Fail) => processing()
            .fail()
            .map(|_| DocumentStatus::Failed)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Pending, DocumentTransition::Cancel) => pending()
            .cancel()
            .map(|_| DocumentStatus::Cancelled)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processing, DocumentTransition::Cancel) => processing()
            .cancel()
            .map(|_| DocumentStatus::Cancelled)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processed, DocumentTransition::Reindex) => processed()
            .reindex()
            .map(|_| DocumentStatus::Processing)
            .map_err(|_| invalid_transition(status, event)),
        _ => Err(invalid_transition(status, event)),
    }
}

stored_object!(Document, "document", {
    owner_id: Option<String>,
    file_name: String,
    mime_type: String,
    byte_size: u64,
    sha256: String,
    text: Option<String>,
    status: DocumentStatus,
    extraction_method: Option<String>,
    confidence: f32,
    word_count: u32,
    page_count: Option<u32>,
    indexed: bool,
    index_error: Option<String>,
    failure_reason: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    processed_at: Option<DateTime<Utc>>
});

impl Document {
    pub fn new(
        owner_id: Option<String>,
        file_name: String,
        mime_type: String,
        byte_size: u64,
        sha256: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            owner_id,
            file_name,
            mime_type,
            byte_size,
            sha256,
            text: None,
            status: DocumentStatus::Pending,
            extraction_method: None,
            confidence: 0.0,
            word_count: 0,
            page_count: None,
            indexed: false,
            index_error: None,
            failure_reason: None,
            processed_at: None,
        }
    }

    pub async fn create(self, db: &SurrealDbClient) -> Result<Document, AppError> {
        let stored = db.store_item(self).await?;
        stored.ok_or_else(|| AppError::Internal("document row was not created".into()))
    }

    pub async fn get(id: &str, db: &SurrealDbClient) -> Result<Document, AppError> {
        db.get_item::<Document>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document {id}")))
    }

    /// Cheap status probe used by the pipeline's cooperative cancellation checks.
    pub async fn current_status(
        id: &str,
        db: &SurrealDbClient,
    ) -> Result<DocumentStatus, AppError> {
        let doc = Self::get(id, db).await?;
        Ok(doc.status)
    }

    /// Guarded transition helper. The `WHERE status = $from` clause makes the
    /// transition race-safe against a concurrent cancel or delete: if the row
    /// moved on, no update happens and `Ok(None)` is returned.
    async fn transition(
        id: &str,
        from: DocumentStatus,
        event: DocumentTransition,
        db: &SurrealDbClient,
    ) -> Result<Option<Document>, AppError> {
        let to = compute_next_status(&from, event)?;

        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $to, updated_at = $now
            WHERE status = $from
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("from", from.as_str()))
            .bind(("to", to.as_str()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        Ok(updated)
    }

    pub async fn mark_processing(id: &str, db: &SurrealDbClient) -> Result<Document, AppError> {
        Self::transition(id, DocumentStatus::Pending, DocumentTransition::StartProcessing, db)
            .await?
            .ok_or_else(|| {
                invalid_transition(&DocumentStatus::Pending, DocumentTransition::StartProcessing)
            })
    }

    /// Move an already processed document back into processing for re-indexing
    /// (e.g. after a transcript overwrote its text).
    pub async fn mark_reindexing(id: &str, db: &SurrealDbClient) -> Result<Document, AppError> {
        Self::transition(id, DocumentStatus::Processed, DocumentTransition::Reindex, db)
            .await?
            .ok_or_else(|| {
                invalid_transition(&DocumentStatus::Processed, DocumentTransition::Reindex)
            })
    }

    /// Persist the extraction output while the document stays in `Processing`.
    /// Chunking and embedding still follow; `mark_processed` closes the run.
    pub async fn store_extraction(
        id: &str,
        text: String,
        method: &str,
        confidence: f32,
        word_count: u32,
        page_count: Option<u32>,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET text = $text,
                extraction_method = $method,
                confidence = $confidence,
                word_count = $word_count,
                page_count = $page_count,
                updated_at = $now
            WHERE status = $processing
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("text", text))
            .bind(("method", method.to_string()))
            .bind(("confidence", confidence))
            .bind(("word_count", word_count))
            .bind(("page_count", page_count))
            .bind(("processing", DocumentStatus::Processing.as_str()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "document {id} left Processing before extraction could be stored"
            ))
        })
    }

    /// Close a pipeline run. `indexed = false` with an `index_error` records the
    /// "search indexing incomplete" condition; the document is still Processed.
    pub async fn mark_processed(
        id: &str,
        indexed: bool,
        index_error: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        let to = compute_next_status(&DocumentStatus::Processing, DocumentTransition::Complete)?;

        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $to,
                indexed = $indexed,
                index_error = $index_error,
                processed_at = $now,
                updated_at = $now
            WHERE status = $from
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("to", to.as_str()))
            .bind(("from", DocumentStatus::Processing.as_str()))
            .bind(("indexed", indexed))
            .bind(("index_error", index_error))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| {
            invalid_transition(&DocumentStatus::Processing, DocumentTransition::Complete)
        })
    }

    /// Record an indexing result without touching the status. Used when a
    /// retried index pass completes for a document that is already Processed.
    pub async fn set_index_state(
        id: &str,
        indexed: bool,
        index_error: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET indexed = $indexed,
                index_error = $index_error,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("indexed", indexed))
            .bind(("index_error", index_error))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("document {id}")))
    }

    pub async fn mark_failed(
        id: &str,
        reason: &str,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        let to = compute_next_status(&DocumentStatus::Processing, DocumentTransition::Fail)?;

        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $to,
                failure_reason = $reason,
                updated_at = $now
            WHERE status = $from
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("to", to.as_str()))
            .bind(("from", DocumentStatus::Processing.as_str()))
            .bind(("reason", reason.to_string()))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated
            .ok_or_else(|| invalid_transition(&DocumentStatus::Processing, DocumentTransition::Fail))
    }

    /// Request cancellation. Returns the updated document when the guarded
    /// update actually flipped the status, `None` when the document had already
    /// reached a terminal state (the caller decides whether that is an error).
    pub async fn try_cancel(
        id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Document>, AppError> {
        if let Some(doc) =
            Self::transition(id, DocumentStatus::Processing, DocumentTransition::Cancel, db)
                .await?
        {
            return Ok(Some(doc));
        }
        Self::transition(id, DocumentStatus::Pending, DocumentTransition::Cancel, db).await
    }

    /// Overwrite the extracted text in place once a transcription collaborator
    /// supplies the transcript for an audio/video document.
    pub async fn apply_transcript(
        id: &str,
        transcript: String,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        let word_count = count_words(&transcript);

        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET text = $text,
                extraction_method = $method,
                confidence = $confidence,
                word_count = $word_count,
                indexed = false,
                index_error = NONE,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("text", transcript))
            .bind(("method", "transcription"))
            .bind(("confidence", 1.0_f32))
            .bind(("word_count", word_count))
            .bind(("now", SurrealDatetime::from(Utc::now())))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| AppError::NotFound(format!("document {id}")))
    }

    pub async fn delete(id: &str, db: &SurrealDbClient) -> Result<Option<Document>, AppError> {
        Ok(db.delete_item::<Document>(id).await?)
    }
}

pub fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}
