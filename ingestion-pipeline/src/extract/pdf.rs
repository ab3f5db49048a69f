//! PDF extraction: text layer first, optical recognition for scanned
//! documents, placeholder as the last resort. Encrypted PDFs reject before
//! any extraction attempt; every other failure degrades.

use common::error::AppError;
use lopdf::Document as PdfDocument;
use tracing::{debug, warn};

use super::{ocr::OcrClient, Extraction};

/// Below this many extracted characters the text layer is treated as absent.
const MIN_TEXT_CHARS: usize = 100;
/// Expected characters per page for a document with a real text layer; a
/// yield under 10% of this suggests a scanned document.
const EXPECTED_CHARS_PER_PAGE: usize = 250;
const MIN_DENSITY_RATIO: f64 = 0.1;

const PARSE_FAILED_PLACEHOLDER: &str =
    "PDF extraction failed: the file could not be parsed as a PDF. \
     The document was stored without extracted text.";
const SCANNED_PLACEHOLDER: &str =
    "PDF extraction failed: the document appears to be scanned and no \
     optical recognition service is available. The document was stored \
     without extracted text.";

pub async fn extract_pdf(bytes: &[u8], ocr: Option<&OcrClient>) -> Result<Extraction, AppError> {
    let structure = match load_structure(bytes.to_vec()).await? {
        Ok(structure) => structure,
        Err(err) => {
            debug!(error = %err, "pdf parse failed");
            return Ok(Extraction::degraded(
                PARSE_FAILED_PLACEHOLDER.to_string(),
                "pdf-placeholder",
                None,
            ));
        }
    };

    if structure.encrypted {
        return Err(AppError::Encrypted);
    }

    let page_count = structure.page_count;

    match text_layer(bytes.to_vec()).await? {
        Some(text) if has_plausible_density(&text, page_count) => {
            return Ok(Extraction::succeeded(
                text,
                "pdf-text-layer",
                0.9,
                Some(page_count),
            ));
        }
        _ => {
            debug!(page_count, "pdf text layer missing or sparse, treating as scanned");
        }
    }

    if let Some(client) = ocr {
        match client.recognize(bytes).await {
            Ok(text) if !text.trim().is_empty() => {
                return Ok(Extraction::succeeded(
                    text,
                    "pdf-ocr",
                    0.6,
                    Some(page_count),
                ));
            }
            Ok(_) => warn!("optical recognition returned empty text"),
            Err(err) => warn!(error = %err, "optical recognition failed"),
        }
    }

    Ok(Extraction::degraded(
        SCANNED_PLACEHOLDER.to_string(),
        "pdf-placeholder",
        Some(page_count),
    ))
}

struct PdfStructure {
    encrypted: bool,
    page_count: u32,
}

async fn load_structure(
    bytes: Vec<u8>,
) -> Result<Result<PdfStructure, lopdf::Error>, AppError> {
    let parsed = tokio::task::spawn_blocking(move || {
        PdfDocument::load_mem(&bytes).map(|document| PdfStructure {
            encrypted: document.is_encrypted(),
            page_count: document.get_pages().len() as u32,
        })
    })
    .await?;

    Ok(parsed)
}

async fn text_layer(bytes: Vec<u8>) -> Result<Option<String>, AppError> {
    let extracted = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map(|text| text.trim().to_string())
    })
    .await?;

    match extracted {
        Ok(text) if !text.is_empty() => Ok(Some(text)),
        Ok(_) => Ok(None),
        Err(err) => {
            debug!(error = %err, "text layer extraction failed");
            Ok(None)
        }
    }
}

fn has_plausible_density(text: &str, page_count: u32) -> bool {
    let chars = text.chars().count();
    if chars < MIN_TEXT_CHARS {
        return false;
    }

    let expected = (page_count.max(1) as usize) * EXPECTED_CHARS_PER_PAGE;
    (chars as f64) >= (expected as f64) * MIN_DENSITY_RATIO
}
