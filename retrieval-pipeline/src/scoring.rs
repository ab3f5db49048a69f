//! Score and snippet shaping for search results.

/// Characters kept when truncating chunk text into a result snippet.
pub const SNIPPET_MAX_CHARS: usize = 200;

pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Cosine distance from the index becomes a similarity in [0, 1]. The same
/// measure applies to index-time and query-time vectors, so scores are
/// comparable across calls.
pub fn distance_to_similarity(distance: f32) -> f32 {
    clamp_unit(1.0 - distance)
}

/// Truncate chunk text into a snippet on a character boundary, marking the
/// cut with an ellipsis.
pub fn make_snippet(text: &str) -> String {
    let mut chars = text.chars();
    let snippet: String = chars.by_ref().take(SNIPPET_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", snippet.trim_end())
    } else {
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit_bounds() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(1.7), 1.0);
    }

    #[test]
    fn test_distance_to_similarity() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert_eq!(distance_to_similarity(1.0), 0.0);
        // Cosine distance can exceed 1 for opposed vectors; similarity floors at 0.
        assert_eq!(distance_to_similarity(1.8), 0.0);
    }

    #[test]
    fn test_short_text_is_not_truncated() {
        assert_eq!(make_snippet("short chunk"), "short chunk");
    }

    #[test]
    fn test_long_text_truncates_on_char_boundary() {
        let text = "é".repeat(SNIPPET_MAX_CHARS + 50);
        let snippet = make_snippet(&text);
        assert!(snippet.ends_with('…'));
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS + 1);
    }
}
