//! Thin client for the optical text recognition collaborator. The provider
//! is an opaque HTTP service: scanned-PDF bytes in, recognized text out.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::error::AppError;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct OcrClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
}

impl OcrClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Send document bytes for recognition. The timeout set at construction
    /// bounds the call; a timeout surfaces as a reqwest error here and the
    /// caller decides whether to degrade.
    pub async fn recognize(&self, bytes: &[u8]) -> Result<String, AppError> {
        let payload = json!({ "data": STANDARD.encode(bytes) });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: OcrResponse = response.json().await?;
        debug!(chars = body.text.len(), "optical recognition returned text");

        Ok(body.text)
    }
}
