use crate::format::FormatKind;

use super::Extraction;

/// Shown until the transcription collaborator supplies a transcript, at
/// which point the document text is overwritten in place.
pub const PENDING_TRANSCRIPT_PLACEHOLDER: &str =
    "Transcription pending: this recording has been stored and will become \
     searchable once a transcript is available.";

pub fn pending_transcript(kind: FormatKind) -> Extraction {
    let method = match kind {
        FormatKind::Audio => "audio-pending-transcript",
        _ => "video-pending-transcript",
    };
    Extraction::degraded(PENDING_TRANSCRIPT_PLACEHOLDER.to_string(), method, None)
}
