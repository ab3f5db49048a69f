use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::utils::config::get_config;
use ingestion_pipeline::run_worker_loop;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Combined deployment: HTTP API and the background index worker in one
/// process, sharing nothing but the database.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let api_state = ApiState::new(&config).await?;

    let worker_db = Arc::clone(&api_state.db);
    let worker_pipeline = Arc::clone(&api_state.pipeline);
    tokio::spawn(async move {
        info!("Starting worker loop");
        if let Err(e) = run_worker_loop(worker_db, worker_pipeline).await {
            error!("Worker process error: {}", e);
        }
    });

    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
