//! Coordinates the multi-store write for ingestion so the document table and
//! the chunk index never diverge: no orphaned chunks, no documents whose
//! indexing silently vanished, no partially cancelled runs.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::{
            document::{count_words, Document, DocumentStatus},
            document_chunk::DocumentChunk,
            index_task::{IndexTask, TaskErrorInfo},
        },
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{
    chunker::chunk_text,
    extract::{self, ocr::OcrClient, Extraction},
    format::{self, FormatKind},
};

/// Embeddings are requested in sub-batches so cancellation can take effect
/// between provider calls rather than after the whole batch.
const EMBED_SUB_BATCH: usize = 4;

const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Chunks written and visible to search.
    Indexed(usize),
    /// The document was cancelled mid-run; partial chunks were rolled back.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeleteOutcome {
    pub cancelled_processing: bool,
    pub chunks_removed: usize,
    pub document_removed: bool,
}

pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    embedding: Arc<EmbeddingProvider>,
    storage: Arc<StorageManager>,
    ocr: Option<OcrClient>,
    chunk_max_chars: usize,
    max_file_bytes: u64,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedding: Arc<EmbeddingProvider>,
        storage: Arc<StorageManager>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        let ocr = match &config.ocr_endpoint {
            Some(endpoint) => Some(OcrClient::new(
                endpoint.clone(),
                Duration::from_secs(config.provider_timeout_secs),
            )?),
            None => None,
        };

        Ok(Self {
            db,
            embedding,
            storage,
            ocr,
            chunk_max_chars: config.chunk_max_chars,
            max_file_bytes: config.max_file_bytes,
        })
    }

    /// Full upload path: size guard, classify, create the document record,
    /// store the raw bytes, run extraction, and queue background indexing.
    ///
    /// Oversize and unsupported inputs reject before any record exists.
    #[tracing::instrument(skip_all, fields(file_name = %file_name, mime_type = %mime_type))]
    pub async fn ingest_upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Bytes,
        owner_id: Option<String>,
    ) -> Result<(Document, Extraction), AppError> {
        extract::ensure_within_limit(bytes.len() as u64, self.max_file_bytes)?;

        let kind = format::classify(file_name, mime_type);
        if kind == FormatKind::Unsupported {
            return Err(AppError::UnsupportedFormat(format!(
                "cannot extract text from {file_name} ({mime_type})"
            )));
        }
        debug!(format = kind.as_str(), "classified upload");

        let sha256 = hex_digest(&bytes);
        let document = Document::new(
            owner_id.clone(),
            file_name.to_string(),
            mime_type.to_string(),
            bytes.len() as u64,
            sha256,
        )
        .create(&self.db)
        .await?;
        let document_id = document.id.clone();

        self.storage
            .put_upload(&document_id, file_name, bytes.clone())
            .await?;

        Document::mark_processing(&document_id, &self.db).await?;

        let extraction = match extract::extract(&bytes, kind, self.ocr.as_ref()).await {
            Ok(extraction) => extraction,
            Err(err) => {
                // Rejections (encrypted, corrupt beyond degrading) fail the
                // document rather than leaving it stuck in Processing.
                Document::mark_failed(&document_id, &err.to_string(), &self.db).await?;
                return Err(err);
            }
        };

        let document = Document::store_extraction(
            &document_id,
            extraction.text.clone(),
            extraction.method,
            extraction.confidence,
            extraction.word_count,
            extraction.page_count,
            &self.db,
        )
        .await?;

        // Cooperative cancellation point: a stop request racing the upload
        // wins here and no indexing work is queued.
        if Document::current_status(&document_id, &self.db).await? == DocumentStatus::Cancelled {
            info!(%document_id, "document cancelled during extraction, skipping indexing");
            return Ok((document, extraction));
        }

        IndexTask::enqueue(document_id.clone(), owner_id, &self.db).await?;
        info!(%document_id, method = extraction.method, "upload ingested, indexing queued");

        Ok((document, extraction))
    }

    /// Direct ingestion of raw text, bypassing classification and extraction.
    /// Runs the whole pipeline inline and returns the chunk count.
    #[tracing::instrument(skip_all, fields(file_name = %file_name))]
    pub async fn ingest_text(
        &self,
        text: String,
        file_name: &str,
        owner_id: Option<String>,
    ) -> Result<(Document, usize), AppError> {
        if text.trim().is_empty() {
            return Err(AppError::CorruptInput("text body is empty".into()));
        }
        extract::ensure_within_limit(text.len() as u64, self.max_file_bytes)?;

        let word_count = count_words(&text);
        let document = Document::new(
            owner_id,
            file_name.to_string(),
            "text/plain".to_string(),
            text.len() as u64,
            hex_digest(text.as_bytes()),
        )
        .create(&self.db)
        .await?;
        let document_id = document.id.clone();

        Document::mark_processing(&document_id, &self.db).await?;
        Document::store_extraction(
            &document_id,
            text,
            "direct-text",
            1.0,
            word_count,
            None,
            &self.db,
        )
        .await?;

        let chunk_count = self.index_document_now(&document_id).await?;
        let document = Document::get(&document_id, &self.db).await?;

        Ok((document, chunk_count))
    }

    /// Synchronous chunk-embed-index pass for one document, finalized in the
    /// same call. Returns the number of chunks written (0 when cancelled).
    ///
    /// Any queued background task for the document is cancelled first, so an
    /// inline pass never runs alongside a worker claiming the same document.
    pub async fn index_document_now(&self, document_id: &str) -> Result<usize, AppError> {
        IndexTask::cancel_for_document(document_id, &self.db).await?;

        match self.run_index_pass(document_id).await {
            Ok(IndexOutcome::Indexed(count)) => {
                self.finalize_indexed(document_id, count).await?;
                Ok(count)
            }
            Ok(IndexOutcome::Cancelled) => Ok(0),
            Err(err) => {
                self.finalize_incomplete(document_id, &err).await;
                Err(err)
            }
        }
    }

    /// Drive one claimed background task through the index pass, with the
    /// queue bookkeeping: success, scheduled retry, or dead letter.
    #[tracing::instrument(
        skip_all,
        fields(
            task_id = %task.id,
            document_id = %task.document_id,
            attempt = task.attempts,
            worker_id = task.worker_id.as_deref().unwrap_or("unknown-worker")
        )
    )]
    pub async fn process_task(&self, task: IndexTask) -> Result<(), AppError> {
        let processing_task = task.mark_processing(&self.db).await?;
        let document_id = processing_task.document_id.clone();

        match self.run_index_pass(&document_id).await {
            Ok(IndexOutcome::Indexed(count)) => {
                self.finalize_indexed(&document_id, count).await?;
                processing_task.mark_succeeded(&self.db).await?;
                info!(chunk_count = count, "index task succeeded");
                Ok(())
            }
            Ok(IndexOutcome::Cancelled) => {
                // The cancel request normally cancels the task row too; this
                // covers a cancel that only reached the document.
                IndexTask::cancel_for_document(&document_id, &self.db).await?;
                info!("index task ended: document was cancelled");
                Ok(())
            }
            Err(err) => {
                self.finalize_incomplete(&document_id, &err).await;

                let reason = err.to_string();
                let error_info = TaskErrorInfo {
                    code: Some(err.code().to_string()),
                    message: reason.clone(),
                };

                // Provider exhaustion already consumed its own retry budget;
                // requeueing it would just burn the same calls again.
                let retryable = err.is_retryable()
                    && !matches!(err, AppError::EmbeddingExhausted { .. });

                if retryable && processing_task.can_retry() {
                    let delay = retry_delay(processing_task.attempts);
                    processing_task
                        .mark_failed(error_info, delay, &self.db)
                        .await?;
                    warn!(
                        retry_in_secs = delay.as_secs(),
                        error = %reason,
                        "index task failed; scheduled retry"
                    );
                } else {
                    let failed_task = processing_task
                        .mark_failed(error_info.clone(), Duration::from_secs(0), &self.db)
                        .await?;
                    failed_task.mark_dead_letter(error_info, &self.db).await?;
                    warn!(error = %reason, "index task failed; moved to dead letter queue");
                }

                Err(AppError::IndexWrite(reason))
            }
        }
    }

    /// Chunk, embed and index one document's extracted text, checking for
    /// cancellation after chunking and after every embedding sub-batch.
    /// A cancelled run rolls back any chunks already written; so does a run
    /// whose document record was deleted out from under it.
    async fn run_index_pass(&self, document_id: &str) -> Result<IndexOutcome, AppError> {
        let document = match Document::get(document_id, &self.db).await {
            Ok(document) => document,
            Err(AppError::NotFound(_)) => return self.rollback_cancelled(document_id).await,
            Err(err) => return Err(err),
        };
        if document.status == DocumentStatus::Cancelled {
            return self.rollback_cancelled(document_id).await;
        }

        let text = document.text.unwrap_or_default();
        let chunk_texts = chunk_text(&text, self.chunk_max_chars);
        debug!(chunk_count = chunk_texts.len(), "chunked document text");

        if self.is_cancelled(document_id).await? {
            return self.rollback_cancelled(document_id).await;
        }

        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunk_texts.len());
        for sub_batch in chunk_texts.chunks(EMBED_SUB_BATCH) {
            embeddings.extend(self.embedding.embed_chunks(sub_batch).await?);

            if self.is_cancelled(document_id).await? {
                return self.rollback_cancelled(document_id).await;
            }
        }

        let chunks: Vec<DocumentChunk> = chunk_texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (content, embedding))| {
                DocumentChunk::new(
                    document_id.to_string(),
                    ordinal as u32,
                    content,
                    embedding,
                    document.owner_id.clone(),
                )
            })
            .collect();
        let chunk_count = chunks.len();

        DocumentChunk::replace_for_document(document_id, chunks, &self.db).await?;

        if self.is_cancelled(document_id).await? {
            return self.rollback_cancelled(document_id).await;
        }

        Ok(IndexOutcome::Indexed(chunk_count))
    }

    /// A deleted record counts as cancelled: the delete sequence removes
    /// chunks before the record, so any chunks this run writes afterwards
    /// must be rolled back rather than left orphaned.
    async fn is_cancelled(&self, document_id: &str) -> Result<bool, AppError> {
        match Document::current_status(document_id, &self.db).await {
            Ok(status) => Ok(status == DocumentStatus::Cancelled),
            Err(AppError::NotFound(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    async fn rollback_cancelled(&self, document_id: &str) -> Result<IndexOutcome, AppError> {
        DocumentChunk::delete_by_document(document_id, &self.db).await?;
        info!(%document_id, "rolled back chunks for cancelled document");
        Ok(IndexOutcome::Cancelled)
    }

    /// Record a completed index pass. Runs started from Processing close the
    /// lifecycle; retried runs for already-Processed documents only clear the
    /// index flag.
    async fn finalize_indexed(&self, document_id: &str, count: usize) -> Result<(), AppError> {
        let status = match Document::current_status(document_id, &self.db).await {
            Ok(status) => status,
            Err(AppError::NotFound(_)) => {
                // Deleted after the index write; the chunks must not outlive
                // the record.
                DocumentChunk::delete_by_document(document_id, &self.db).await?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        match status {
            DocumentStatus::Processing => {
                Document::mark_processed(document_id, true, None, &self.db).await?;
            }
            DocumentStatus::Processed => {
                Document::set_index_state(document_id, true, None, &self.db).await?;
            }
            DocumentStatus::Cancelled => {
                // Cancel won the race after the index write; undo it.
                DocumentChunk::delete_by_document(document_id, &self.db).await?;
                return Ok(());
            }
            status => {
                warn!(%document_id, status = status.as_str(), "unexpected status after indexing");
            }
        }
        debug!(%document_id, chunk_count = count, "indexing finalized");
        Ok(())
    }

    /// Indexing failed but the document stays stored: mark it Processed with
    /// the incomplete-indexing condition recorded. Best effort; the original
    /// error is what the caller reports.
    async fn finalize_incomplete(&self, document_id: &str, err: &AppError) {
        let index_error = Some(format!("{}: {err}", err.code()));
        let result = match Document::current_status(document_id, &self.db).await {
            Err(AppError::NotFound(_)) => {
                // Nothing to record on a deleted document; just make sure no
                // chunks were left behind.
                DocumentChunk::delete_by_document(document_id, &self.db).await
            }
            Ok(DocumentStatus::Processing) => {
                Document::mark_processed(document_id, false, index_error, &self.db)
                    .await
                    .map(|_| ())
            }
            Ok(DocumentStatus::Processed) => {
                Document::set_index_state(document_id, false, index_error, &self.db)
                    .await
                    .map(|_| ())
            }
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };

        if let Err(record_err) = result {
            warn!(%document_id, error = %record_err, "failed to record incomplete indexing");
        }
    }

    /// Stop an in-flight ingestion. Valid only while the document is
    /// Processing; otherwise the caller learns the actual status.
    pub async fn stop_processing(&self, document_id: &str) -> Result<Document, AppError> {
        let status = Document::current_status(document_id, &self.db).await?;
        if status != DocumentStatus::Processing {
            return Err(AppError::Validation(format!(
                "document {document_id} is {}, only processing documents can be stopped",
                status.as_str()
            )));
        }

        let cancelled = Document::try_cancel(document_id, &self.db)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "document {document_id} left processing before it could be stopped"
                ))
            })?;

        IndexTask::cancel_for_document(document_id, &self.db).await?;
        // The worker rolls back chunks when it observes the cancel; this
        // sweep covers a worker that already exited.
        DocumentChunk::delete_by_document(document_id, &self.db).await?;

        info!(%document_id, "processing stopped");
        Ok(cancelled)
    }

    /// Delete a document in an order that can never orphan chunks: stop
    /// processing first, remove index chunks second, remove the record last.
    /// Safe to call repeatedly; a second delete is a no-op.
    #[tracing::instrument(skip_all, fields(%document_id))]
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome, AppError> {
        let cancelled_processing = Document::try_cancel(document_id, &self.db)
            .await?
            .is_some();
        IndexTask::cancel_for_document(document_id, &self.db).await?;

        let chunks_removed = DocumentChunk::count_for_document(document_id, &self.db).await?;
        DocumentChunk::delete_by_document(document_id, &self.db).await?;

        let removed = Document::delete(document_id, &self.db).await?;
        if let Some(document) = &removed {
            self.storage
                .delete_upload(&document.id, &document.file_name)
                .await?;
        }

        info!(
            cancelled_processing,
            chunks_removed,
            document_removed = removed.is_some(),
            "document deleted"
        );

        Ok(DeleteOutcome {
            cancelled_processing,
            chunks_removed,
            document_removed: removed.is_some(),
        })
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    let delay = RETRY_BASE_DELAY_SECS.saturating_mul(2_u64.pow(exponent));
    Duration::from_secs(delay.min(RETRY_MAX_DELAY_SECS))
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests;
