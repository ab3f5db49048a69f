use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use common::{
    error::AppError,
    storage::types::{
        document::{Document, DocumentStatus},
        index_task::IndexTask,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const PREVIEW_MAX_CHARS: usize = 200;

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document_id: String,
    pub extraction_method: String,
    pub word_count: u32,
    pub preview: String,
    pub status: String,
}

/// Multipart upload. The size guard runs against the actual byte count
/// before any document record exists; the multipart limit above only stops
/// runaway streams.
pub async fn upload_document(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .clone()
        .unwrap_or_else(|| "upload".to_string());
    let mime_type = input
        .file
        .metadata
        .content_type
        .clone()
        .unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string()
        });

    let bytes = tokio::fs::read(input.file.contents.path())
        .await
        .map_err(AppError::from)?;

    info!(
        file_name = %file_name,
        mime_type = %mime_type,
        byte_size = bytes.len(),
        "received upload"
    );

    let (document, extraction) = state
        .pipeline
        .ingest_upload(&file_name, &mime_type, Bytes::from(bytes), input.owner_id)
        .await?;

    let response = UploadResponse {
        document_id: document.id,
        extraction_method: extraction.method.to_string(),
        word_count: extraction.word_count,
        preview: preview_of(&extraction.text),
        status: document.status.as_str().to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub document_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub status: String,
    pub extraction_method: Option<String>,
    pub confidence: f32,
    pub word_count: u32,
    pub page_count: Option<u32>,
    pub indexed: bool,
    pub index_error: Option<String>,
}

pub async fn get_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = Document::get(&id, &state.db).await?;

    Ok(Json(DocumentResponse {
        document_id: document.id,
        file_name: document.file_name,
        mime_type: document.mime_type,
        byte_size: document.byte_size,
        status: document.status.as_str().to_string(),
        extraction_method: document.extraction_method,
        confidence: document.confidence,
        word_count: document.word_count,
        page_count: document.page_count,
        indexed: document.indexed,
        index_error: document.index_error,
    }))
}

pub async fn delete_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.pipeline.delete_document(&id).await?;

    Ok(Json(json!({
        "status": "success",
        "documentRemoved": outcome.document_removed,
        "processingCancelled": outcome.cancelled_processing,
        "chunksRemoved": outcome.chunks_removed,
    })))
}

pub async fn stop_processing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state.pipeline.stop_processing(&id).await?;

    Ok(Json(json!({
        "status": "success",
        "documentId": document.id,
        "documentStatus": document.status.as_str(),
    })))
}

/// Synchronous chunk-embed-index pass for an already-stored document.
pub async fn index_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // 404 before any pipeline work for unknown ids.
    Document::get(&id, &state.db).await?;

    let chunk_count = state.pipeline.index_document_now(&id).await?;

    Ok(Json(json!({
        "status": "success",
        "documentId": id,
        "chunkCount": chunk_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TranscriptParams {
    pub transcript: String,
}

/// The transcription collaborator delivers its result here: the document
/// text is overwritten in place and the document is queued for re-indexing.
pub async fn put_transcript(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(params): Json<TranscriptParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.transcript.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "transcript must not be empty".into(),
        ));
    }

    let document = Document::apply_transcript(&id, params.transcript, &state.db).await?;

    if document.status == DocumentStatus::Processed {
        Document::mark_reindexing(&id, &state.db).await?;
    }
    IndexTask::enqueue(id.clone(), document.owner_id.clone(), &state.db).await?;

    info!(document_id = %id, "transcript applied, re-indexing queued");

    Ok(Json(json!({
        "status": "success",
        "documentId": id,
        "wordCount": document.word_count,
    })))
}

fn preview_of(text: &str) -> String {
    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(PREVIEW_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", preview.trim_end())
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_text() {
        let text = "x".repeat(500);
        let preview = preview_of(&text);
        assert!(preview.chars().count() <= PREVIEW_MAX_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_preview_keeps_short_text() {
        assert_eq!(preview_of("short"), "short");
    }
}
