use super::Extraction;

/// Direct decode for plain text, markdown and CSV. Invalid UTF-8 sequences
/// are replaced rather than rejected; the upload already passed the size
/// guard, so whatever decodes is the document.
pub fn extract_plain(bytes: &[u8], method: &'static str) -> Extraction {
    let text = String::from_utf8_lossy(bytes).into_owned();
    Extraction::succeeded(text, method, 1.0, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8_is_unchanged() {
        let extraction = extract_plain("héllo wörld".as_bytes(), "plain-text");
        assert_eq!(extraction.text, "héllo wörld");
        assert_eq!(extraction.confidence, 1.0);
        assert_eq!(extraction.word_count, 2);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let extraction = extract_plain(&[0x68, 0x69, 0xFF], "plain-text");
        assert!(extraction.text.starts_with("hi"));
        assert!(extraction.text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_empty_input() {
        let extraction = extract_plain(b"", "csv");
        assert!(extraction.text.is_empty());
        assert_eq!(extraction.word_count, 0);
    }
}
