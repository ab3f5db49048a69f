use std::time::Duration;

use chrono::Duration as ChronoDuration;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

pub const MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LEASE_SECS: i64 = 300;

#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum TaskState {
    #[serde(rename = "Pending")]
    #[default]
    Pending,
    #[serde(rename = "Reserved")]
    Reserved,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Succeeded")]
    Succeeded,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "DeadLetter")]
    DeadLetter,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "Pending",
            TaskState::Reserved => "Reserved",
            TaskState::Processing => "Processing",
            TaskState::Succeeded => "Succeeded",
            TaskState::Failed => "Failed",
            TaskState::Cancelled => "Cancelled",
            TaskState::DeadLetter => "DeadLetter",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Cancelled | TaskState::DeadLetter
        )
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct TaskErrorInfo {
    pub code: Option<String>,
    pub message: String,
}

stored_object!(IndexTask, "index_task", {
    document_id: String,
    owner_id: Option<String>,
    state: TaskState,
    attempts: u32,
    max_attempts: u32,
    #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime")]
    scheduled_at: chrono::DateTime<chrono::Utc>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    locked_at: Option<chrono::DateTime<chrono::Utc>>,
    lease_duration_secs: i64,
    worker_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    last_error_at: Option<chrono::DateTime<chrono::Utc>>
});

impl IndexTask {
    pub fn new(document_id: String, owner_id: Option<String>) -> Self {
        let now = chrono::Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            owner_id,
            state: TaskState::Pending,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            scheduled_at: now,
            locked_at: None,
            lease_duration_secs: DEFAULT_LEASE_SECS,
            worker_id: None,
            error_code: None,
            error_message: None,
            last_error_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub async fn enqueue(
        document_id: String,
        owner_id: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<IndexTask, AppError> {
        let task = Self::new(document_id, owner_id);
        let stored = db.store_item(task).await?;
        stored.ok_or_else(|| AppError::Internal("index task row was not created".into()))
    }

    /// Claim the next due task with a single conditional update. The lease
    /// check lets a worker re-claim tasks whose holder died, and the one-task-
    /// per-document queue shape makes the document id a mutual-exclusion key:
    /// two workers can never index the same document concurrently.
    pub async fn claim_next_ready(
        db: &SurrealDbClient,
        worker_id: &str,
        now: chrono::DateTime<chrono::Utc>,
        lease_duration: Duration,
    ) -> Result<Option<IndexTask>, AppError> {
        const CLAIM_QUERY: &str = r#"
            UPDATE (
                SELECT * FROM type::table($table)
                WHERE state IN $candidate_states
                  AND scheduled_at <= $now
                  AND (
                        attempts < max_attempts
                        OR state IN $sticky_states
                  )
                  AND (
                        locked_at = NONE
                        OR time::unix($now) - time::unix(locked_at) >= lease_duration_secs
                  )
                ORDER BY scheduled_at ASC, created_at ASC
                LIMIT 1
            )
            SET attempts = IF state IN $increment_states THEN
                    math::min([attempts + 1, max_attempts])
                ELSE
                    attempts
                END,
                state = $reserved_state,
                locked_at = $now,
                worker_id = $worker_id,
                lease_duration_secs = $lease_secs,
                updated_at = $now
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(CLAIM_QUERY)
            .bind(("table", Self::table_name()))
            .bind((
                "candidate_states",
                vec![
                    TaskState::Pending.as_str(),
                    TaskState::Failed.as_str(),
                    TaskState::Reserved.as_str(),
                    TaskState::Processing.as_str(),
                ],
            ))
            .bind((
                "sticky_states",
                vec![TaskState::Reserved.as_str(), TaskState::Processing.as_str()],
            ))
            .bind((
                "increment_states",
                vec![TaskState::Pending.as_str(), TaskState::Failed.as_str()],
            ))
            .bind(("reserved_state", TaskState::Reserved.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("worker_id", worker_id.to_string()))
            .bind(("lease_secs", i64::try_from(lease_duration.as_secs()).unwrap_or(DEFAULT_LEASE_SECS)))
            .await?;

        let task: Option<IndexTask> = result.take(0)?;
        Ok(task)
    }

    /// Guarded state update scoped to this worker's claim. Returns the updated
    /// row, or an error when the task moved on (cancelled, re-claimed, ...).
    async fn guarded_update(
        &self,
        from: TaskState,
        query: &'static str,
        db: &SurrealDbClient,
    ) -> Result<Option<IndexTask>, AppError> {
        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(query)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("from", from.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("worker_id", self.worker_id.clone().unwrap_or_default()))
            .await?;

        Ok(result.take(0)?)
    }

    pub async fn mark_processing(&self, db: &SurrealDbClient) -> Result<IndexTask, AppError> {
        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET state = 'Processing',
                updated_at = $now,
                locked_at = $now
            WHERE state = $from AND worker_id = $worker_id
            RETURN *;
        "#;

        self.guarded_update(TaskState::Reserved, QUERY, db)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "index task {} is no longer reserved by this worker",
                    self.id
                ))
            })
    }

    pub async fn mark_succeeded(&self, db: &SurrealDbClient) -> Result<IndexTask, AppError> {
        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET state = 'Succeeded',
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE,
                error_code = NONE,
                error_message = NONE,
                last_error_at = NONE
            WHERE state = $from AND worker_id = $worker_id
            RETURN *;
        "#;

        self.guarded_update(TaskState::Processing, QUERY, db)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "index task {} left Processing before it could succeed",
                    self.id
                ))
            })
    }

    pub async fn mark_failed(
        &self,
        error: TaskErrorInfo,
        retry_delay: Duration,
        db: &SurrealDbClient,
    ) -> Result<IndexTask, AppError> {
        let now = chrono::Utc::now();
        let retry_at = now
            + ChronoDuration::from_std(retry_delay).unwrap_or_else(|_| ChronoDuration::seconds(30));

        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET state = 'Failed',
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE,
                scheduled_at = $retry_at,
                error_code = $error_code,
                error_message = $error_message,
                last_error_at = $now
            WHERE state = $from AND worker_id = $worker_id
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("from", TaskState::Processing.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("retry_at", SurrealDatetime::from(retry_at)))
            .bind(("error_code", error.code))
            .bind(("error_message", error.message))
            .bind(("worker_id", self.worker_id.clone().unwrap_or_default()))
            .await?;

        let updated: Option<IndexTask> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "index task {} left Processing before it could be failed",
                self.id
            ))
        })
    }

    pub async fn mark_dead_letter(
        &self,
        error: TaskErrorInfo,
        db: &SurrealDbClient,
    ) -> Result<IndexTask, AppError> {
        const QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET state = 'DeadLetter',
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE,
                error_code = $error_code,
                error_message = $error_message,
                last_error_at = $now
            WHERE state = $from
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("from", TaskState::Failed.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("error_code", error.code))
            .bind(("error_message", error.message))
            .await?;

        let updated: Option<IndexTask> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "index task {} is not in Failed and cannot be dead-lettered",
                self.id
            ))
        })
    }

    /// Cancel every non-terminal task for a document. Used by stop-processing
    /// and by the delete sequence before chunks are removed.
    pub async fn cancel_for_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<u64, AppError> {
        const QUERY: &str = r#"
            UPDATE type::table($table)
            SET state = 'Cancelled',
                updated_at = $now,
                locked_at = NONE,
                worker_id = NONE
            WHERE document_id = $document_id
              AND state IN ['Pending', 'Reserved', 'Processing', 'Failed']
            RETURN *;
        "#;

        let mut result = db
            .client
            .query(QUERY)
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_string()))
            .bind(("now", SurrealDatetime::from(chrono::Utc::now())))
            .await?;

        let cancelled: Vec<IndexTask> = result.take(0)?;
        Ok(cancelled.len() as u64)
    }
}
