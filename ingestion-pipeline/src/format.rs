//! Maps a file name and declared MIME type onto an extraction strategy.
//!
//! The extension wins when the two disagree, because browsers and HTTP
//! clients routinely upload office documents and markdown as
//! `application/octet-stream` or `text/plain`.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    PlainText,
    Markdown,
    Csv,
    LegacyWord,
    ModernWord,
    LegacyExcel,
    ModernExcel,
    LegacySlides,
    ModernSlides,
    Pdf,
    Audio,
    Video,
    Unsupported,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::PlainText => "plain-text",
            FormatKind::Markdown => "markdown",
            FormatKind::Csv => "csv",
            FormatKind::LegacyWord => "legacy-word",
            FormatKind::ModernWord => "modern-word",
            FormatKind::LegacyExcel => "legacy-excel",
            FormatKind::ModernExcel => "modern-excel",
            FormatKind::LegacySlides => "legacy-slides",
            FormatKind::ModernSlides => "modern-slides",
            FormatKind::Pdf => "pdf",
            FormatKind::Audio => "audio",
            FormatKind::Video => "video",
            FormatKind::Unsupported => "unsupported",
        }
    }

    /// Formats whose extraction is delegated to the transcription
    /// collaborator rather than performed here.
    pub fn is_media(&self) -> bool {
        matches!(self, FormatKind::Audio | FormatKind::Video)
    }
}

/// Classify an upload. Never errors; callers decide whether `Unsupported`
/// is a rejection.
pub fn classify(file_name: &str, mime_type: &str) -> FormatKind {
    if let Some(kind) = from_extension(file_name) {
        return kind;
    }
    from_mime(mime_type).unwrap_or(FormatKind::Unsupported)
}

fn from_extension(file_name: &str) -> Option<FormatKind> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let kind = match extension.as_str() {
        "txt" | "text" | "log" => FormatKind::PlainText,
        "md" | "markdown" => FormatKind::Markdown,
        "csv" | "tsv" => FormatKind::Csv,
        "doc" => FormatKind::LegacyWord,
        "docx" => FormatKind::ModernWord,
        "xls" => FormatKind::LegacyExcel,
        "xlsx" => FormatKind::ModernExcel,
        "ppt" => FormatKind::LegacySlides,
        "pptx" => FormatKind::ModernSlides,
        "pdf" => FormatKind::Pdf,
        "mp3" | "wav" | "m4a" | "ogg" | "flac" | "aac" => FormatKind::Audio,
        "mp4" | "mov" | "webm" | "mkv" | "avi" => FormatKind::Video,
        _ => return None,
    };

    Some(kind)
}

fn from_mime(mime_type: &str) -> Option<FormatKind> {
    // Parameters like `; charset=utf-8` are irrelevant for dispatch.
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase();

    let kind = match essence.as_str() {
        "text/plain" => FormatKind::PlainText,
        "text/markdown" => FormatKind::Markdown,
        "text/csv" | "text/tab-separated-values" => FormatKind::Csv,
        "application/msword" => FormatKind::LegacyWord,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            FormatKind::ModernWord
        }
        "application/vnd.ms-excel" => FormatKind::LegacyExcel,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            FormatKind::ModernExcel
        }
        "application/vnd.ms-powerpoint" => FormatKind::LegacySlides,
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            FormatKind::ModernSlides
        }
        "application/pdf" => FormatKind::Pdf,
        _ if essence.starts_with("text/") => FormatKind::PlainText,
        _ if essence.starts_with("audio/") => FormatKind::Audio,
        _ if essence.starts_with("video/") => FormatKind::Video,
        _ => return None,
    };

    Some(kind)
}
