#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post, put},
    Router,
};
use routes::{
    documents::{
        delete_document, get_document, index_document, put_transcript, stop_processing,
        upload_document,
    },
    ingest::ingest_text,
    liveness::live,
    readiness::ready,
    search::search,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    // The multipart limit sits above the pipeline's own size guard so the
    // guard, not the framework, produces the 413.
    let upload_body_limit = (app_state.config.max_file_bytes as usize).saturating_mul(2);

    let api = Router::new()
        .route(
            "/documents",
            post(upload_document).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/documents/{id}", get(get_document))
        .route("/documents/{id}", delete(delete_document))
        .route("/documents/{id}/stop", post(stop_processing))
        .route("/documents/{id}/index", post(index_document))
        .route("/documents/{id}/transcript", put(put_transcript))
        .route("/ingest", post(ingest_text))
        .route("/search", post(search));

    public.merge(api)
}
