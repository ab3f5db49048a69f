use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestParams {
    pub text: String,
    pub file_name: String,
    pub owner_id: Option<String>,
}

/// Direct text ingestion: store, chunk, embed and index in one call.
pub async fn ingest_text(
    State(state): State<ApiState>,
    Json(params): Json<IngestParams>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        file_name = %params.file_name,
        text_bytes = params.text.len(),
        "received text ingestion request"
    );

    let (document, chunk_count) = state
        .pipeline
        .ingest_text(params.text, &params.file_name, params.owner_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "documentId": document.id,
            "chunkCount": chunk_count,
            "documentStatus": document.status.as_str(),
        })),
    ))
}
