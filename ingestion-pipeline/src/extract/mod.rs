//! Per-format extraction strategies.
//!
//! Every strategy produces an [`Extraction`] or a rejection error. Parser
//! failures on office documents and PDFs degrade to a placeholder text with
//! confidence 0.0 instead of erroring, so a document record always exists;
//! oversize, unsupported and encrypted inputs reject before any extraction.

mod media;
mod office;
mod pdf;
mod text;

pub mod ocr;

pub use media::PENDING_TRANSCRIPT_PLACEHOLDER;

use common::{
    error::AppError,
    storage::types::document::count_words,
};
use tracing::{info, warn};

use crate::format::FormatKind;

use self::ocr::OcrClient;

/// The outcome of one extraction attempt that did not reject.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub method: &'static str,
    pub confidence: f32,
    pub word_count: u32,
    /// Pages for PDFs, sheets for spreadsheets, slides for decks.
    pub page_count: Option<u32>,
    /// True when the text is a placeholder rather than real content.
    pub degraded: bool,
}

impl Extraction {
    pub fn succeeded(
        text: String,
        method: &'static str,
        confidence: f32,
        page_count: Option<u32>,
    ) -> Self {
        let word_count = count_words(&text);
        Self {
            text,
            method,
            confidence,
            word_count,
            page_count,
            degraded: false,
        }
    }

    pub fn degraded(text: String, method: &'static str, page_count: Option<u32>) -> Self {
        let word_count = count_words(&text);
        Self {
            text,
            method,
            confidence: 0.0,
            word_count,
            page_count,
            degraded: true,
        }
    }
}

/// Reject oversized inputs before any extraction work happens.
pub fn ensure_within_limit(size: u64, limit: u64) -> Result<(), AppError> {
    if size > limit {
        return Err(AppError::Oversize { size, limit });
    }
    Ok(())
}

/// Run the strategy selected by the classifier over the raw bytes.
///
/// `Unsupported` rejects here; media formats produce the pending-transcript
/// placeholder and are completed later by the transcription collaborator.
pub async fn extract(
    bytes: &[u8],
    kind: FormatKind,
    ocr: Option<&OcrClient>,
) -> Result<Extraction, AppError> {
    let extraction = match kind {
        FormatKind::PlainText => text::extract_plain(bytes, "plain-text"),
        FormatKind::Markdown => text::extract_plain(bytes, "markdown"),
        FormatKind::Csv => text::extract_plain(bytes, "csv"),
        FormatKind::ModernWord => office::extract_docx(bytes).await?,
        FormatKind::ModernExcel => office::extract_xlsx(bytes).await?,
        FormatKind::ModernSlides => office::extract_pptx(bytes).await?,
        FormatKind::LegacyWord | FormatKind::LegacyExcel | FormatKind::LegacySlides => {
            office::legacy_placeholder(kind)
        }
        FormatKind::Pdf => pdf::extract_pdf(bytes, ocr).await?,
        kind if kind.is_media() => media::pending_transcript(kind),
        _ => {
            return Err(AppError::UnsupportedFormat(
                "no extraction strategy for this file type".into(),
            ))
        }
    };

    if extraction.degraded {
        warn!(
            method = extraction.method,
            "extraction degraded to placeholder text"
        );
    } else {
        info!(
            method = extraction.method,
            word_count = extraction.word_count,
            "extraction succeeded"
        );
    }

    Ok(extraction)
}
