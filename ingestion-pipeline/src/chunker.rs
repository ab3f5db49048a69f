//! Sentence-greedy chunking. Sentences are never split: a chunk may exceed
//! the size bound only when a single sentence does, which trades strict size
//! adherence for semantic coherence.

/// Split `text` into ordered, non-empty chunks of at most `max_chars`
/// characters (over-length single sentences excepted). Deterministic for
/// identical input; empty input yields an empty vector.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let sentences = split_sentences(text);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();

        // +1 accounts for the joining space.
        let would_be = if current.is_empty() {
            sentence_chars
        } else {
            current_chars + 1 + sentence_chars
        };

        if !current.is_empty() && would_be > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if current.is_empty() {
            current_chars = sentence_chars;
            current = sentence;
        } else {
            current.push(' ');
            current.push_str(&sentence);
            current_chars += 1 + sentence_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on sentence-terminal punctuation, keeping the terminator attached
/// to its sentence. Trailing text without a terminator is its own sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            push_non_empty(&mut sentences, &mut current);
        }
    }
    push_non_empty(&mut sentences, &mut current);

    sentences
}

fn push_non_empty(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    // Runs of terminators ("..", "?!") produce candidates that are pure
    // punctuation; those are discarded along with genuinely empty ones.
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk_text("", 500).is_empty());
        assert!(chunk_text("   \n\t  ", 500).is_empty());
    }

    #[test]
    fn test_three_short_sentences_fit_one_chunk() {
        let text = "First sentence here. Second one follows! Third wraps up?";
        let chunks = chunk_text(text, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "First sentence here. Second one follows! Third wraps up?"
        );
    }

    #[test]
    fn test_chunks_respect_the_bound() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. \
                    Nu xi omicron pi. Rho sigma tau upsilon.";
        let chunks = chunk_text(text, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "oversized chunk: {chunk:?}");
        }
    }

    #[test]
    fn test_over_length_sentence_is_kept_whole() {
        let long_sentence = format!("{} end.", "word ".repeat(40));
        let chunks = chunk_text(&long_sentence, 50);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chars().count() > 50);
    }

    #[test]
    fn test_over_length_sentence_does_not_absorb_neighbors() {
        let text = format!("Short one. {} long tail. Short two.", "word ".repeat(30));
        let chunks = chunk_text(&text, 40);

        assert_eq!(chunks[0], "Short one.");
        assert!(chunks[1].chars().count() > 40);
        assert_eq!(chunks[2], "Short two.");
    }

    #[test]
    fn test_deterministic() {
        let text = "One two three. Four five six! Seven eight? Nine ten.";
        let first = chunk_text(text, 25);
        let second = chunk_text(text, 25);
        assert_eq!(first, second);
    }

    #[test]
    fn test_concatenation_preserves_sentence_sequence() {
        let text = "A first thought. A second thought! A third? And a trailing fragment";
        let chunks = chunk_text(text, 20);

        let rejoined = chunks.join(" ");
        let original_sentences = super::split_sentences(text);
        let rejoined_sentences = super::split_sentences(&rejoined);
        assert_eq!(original_sentences, rejoined_sentences);
    }

    #[test]
    fn test_no_empty_chunks_from_punctuation_runs() {
        let chunks = chunk_text("Wait... what?! Really.", 500);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
    }

    #[test]
    fn test_ordinals_are_dense_by_construction() {
        let text = "S1. S2. S3. S4. S5. S6. S7. S8.";
        let chunks = chunk_text(text, 8);
        // Every chunk is non-empty and positionally indexed by its Vec slot.
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        assert!(chunks.len() >= 4);
    }
}
