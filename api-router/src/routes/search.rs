use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub owner_id: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

/// Semantic search over indexed chunks. Empty queries reject with 400; a
/// query with no matches above the threshold returns an empty result set.
pub async fn search(
    State(state): State<ApiState>,
    Json(params): Json<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .search
        .search(
            &params.query,
            params.owner_id.as_deref(),
            params.limit,
            params.threshold,
        )
        .await?;

    Ok(Json(results))
}
