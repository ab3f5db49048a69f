//! Modern office formats are ZIP containers holding XML parts; the text
//! lives in well-known parts (`word/document.xml`, `xl/sharedStrings.xml`,
//! `ppt/slides/slideN.xml`). A parse failure never propagates: the document
//! is stored with a placeholder and confidence 0.0 instead.

use std::io::{Cursor, Read};

use common::error::AppError;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use zip::ZipArchive;

use crate::format::FormatKind;

use super::Extraction;

const UNPARSED_PLACEHOLDER: &str =
    "This office document could not be parsed; its content was not extracted.";

pub async fn extract_docx(bytes: &[u8]) -> Result<Extraction, AppError> {
    let bytes = bytes.to_vec();
    let parsed = tokio::task::spawn_blocking(move || docx_text(&bytes)).await?;

    Ok(match parsed {
        Ok(text) => Extraction::succeeded(text, "docx-xml", 1.0, None),
        Err(err) => {
            debug!(error = %err, "docx parse failed");
            Extraction::degraded(UNPARSED_PLACEHOLDER.to_string(), "office-placeholder", None)
        }
    })
}

pub async fn extract_xlsx(bytes: &[u8]) -> Result<Extraction, AppError> {
    let bytes = bytes.to_vec();
    let parsed = tokio::task::spawn_blocking(move || xlsx_text(&bytes)).await?;

    Ok(match parsed {
        Ok((text, sheets)) => Extraction::succeeded(text, "xlsx-shared-strings", 1.0, Some(sheets)),
        Err(err) => {
            debug!(error = %err, "xlsx parse failed");
            Extraction::degraded(UNPARSED_PLACEHOLDER.to_string(), "office-placeholder", None)
        }
    })
}

pub async fn extract_pptx(bytes: &[u8]) -> Result<Extraction, AppError> {
    let bytes = bytes.to_vec();
    let parsed = tokio::task::spawn_blocking(move || pptx_text(&bytes)).await?;

    Ok(match parsed {
        Ok((text, slides)) => Extraction::succeeded(text, "pptx-xml", 1.0, Some(slides)),
        Err(err) => {
            debug!(error = %err, "pptx parse failed");
            Extraction::degraded(UNPARSED_PLACEHOLDER.to_string(), "office-placeholder", None)
        }
    })
}

/// Legacy binary office formats are deliberately not parsed. The placeholder
/// tells the user to convert rather than pretending extraction happened.
pub fn legacy_placeholder(kind: FormatKind) -> Extraction {
    let format_name = match kind {
        FormatKind::LegacyWord => "Word (.doc)",
        FormatKind::LegacyExcel => "Excel (.xls)",
        FormatKind::LegacySlides => "PowerPoint (.ppt)",
        _ => "legacy office",
    };
    let text = format!(
        "This legacy {format_name} file is not supported for text extraction. \
         Please convert it to the modern XML-based format and upload it again."
    );
    Extraction::degraded(text, "legacy-office-placeholder", None)
}

fn docx_text(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let xml = read_part(&mut archive, "word/document.xml")?;
    let paragraphs = collect_text(&xml, "w:t", Some("w:p"))?;
    Ok(paragraphs)
}

fn xlsx_text(bytes: &[u8]) -> anyhow::Result<(String, u32)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let sheet_count = archive
        .file_names()
        .filter(|name| name.starts_with("xl/worksheets/sheet") && name.ends_with(".xml"))
        .count() as u32;

    // Cell strings are deduplicated into the shared-strings part; numeric
    // cells carry no retrievable prose and are skipped.
    let text = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => collect_text(&xml, "t", Some("si"))?,
        Err(_) => String::new(),
    };

    Ok((text, sheet_count))
}

fn pptx_text(bytes: &[u8]) -> anyhow::Result<(String, u32)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut slide_parts: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    // Lexicographic order would put slide10 before slide2.
    slide_parts.sort_by_key(|name| slide_number(name));

    let slide_count = slide_parts.len() as u32;
    let mut slides = Vec::with_capacity(slide_parts.len());
    for part in &slide_parts {
        let xml = read_part(&mut archive, part)?;
        slides.push(collect_text(&xml, "a:t", Some("a:p"))?);
    }

    Ok((slides.join("\n\n"), slide_count))
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> anyhow::Result<String> {
    let mut part = archive.by_name(name)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Pull character data out of every `text_tag` element, inserting a newline
/// whenever a `break_tag` element closes.
fn collect_text(
    xml: &str,
    text_tag: &str,
    break_tag: Option<&str>,
) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut output = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) if element.name().as_ref() == text_tag.as_bytes() => {
                in_text = true;
            }
            Event::End(element) if element.name().as_ref() == text_tag.as_bytes() => {
                in_text = false;
            }
            Event::End(element)
                if break_tag.is_some_and(|tag| element.name().as_ref() == tag.as_bytes()) =>
            {
                if !output.ends_with('\n') && !output.is_empty() {
                    output.push('\n');
                }
            }
            Event::Text(text) if in_text => {
                output.push_str(&text.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(output.trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn zip_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(content.as_bytes()).expect("write part");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[tokio::test]
    async fn test_docx_paragraph_text() {
        let document = r#"<?xml version="1.0"?>
            <w:document xmlns:w="ns">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let bytes = zip_with(&[("word/document.xml", document)]);

        let extraction = extract_docx(&bytes).await.expect("extract");
        assert!(!extraction.degraded);
        assert_eq!(extraction.text, "First paragraph.\nSecond paragraph.");
        assert_eq!(extraction.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_docx_garbage_degrades() {
        let extraction = extract_docx(b"definitely not a zip").await.expect("extract");
        assert!(extraction.degraded);
        assert_eq!(extraction.confidence, 0.0);
        assert!(extraction.text.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_xlsx_shared_strings_and_sheet_count() {
        let shared = r#"<?xml version="1.0"?>
            <sst xmlns="ns">
              <si><t>Revenue</t></si>
              <si><t>Q1 totals</t></si>
            </sst>"#;
        let bytes = zip_with(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", "<worksheet/>"),
            ("xl/worksheets/sheet2.xml", "<worksheet/>"),
        ]);

        let extraction = extract_xlsx(&bytes).await.expect("extract");
        assert!(!extraction.degraded);
        assert_eq!(extraction.text, "Revenue\nQ1 totals");
        assert_eq!(extraction.page_count, Some(2));
    }

    #[tokio::test]
    async fn test_xlsx_without_shared_strings_is_empty_not_degraded() {
        let bytes = zip_with(&[("xl/worksheets/sheet1.xml", "<worksheet/>")]);
        let extraction = extract_xlsx(&bytes).await.expect("extract");
        assert!(!extraction.degraded);
        assert!(extraction.text.is_empty());
        assert_eq!(extraction.page_count, Some(1));
    }

    #[tokio::test]
    async fn test_pptx_slide_text_and_count() {
        let slide1 = r#"<p:sld xmlns:a="ns"><a:p><a:r><a:t>Title slide</a:t></a:r></a:p></p:sld>"#;
        let slide2 = r#"<p:sld xmlns:a="ns"><a:p><a:r><a:t>Closing remarks</a:t></a:r></a:p></p:sld>"#;
        let bytes = zip_with(&[
            ("ppt/slides/slide1.xml", slide1),
            ("ppt/slides/slide2.xml", slide2),
        ]);

        let extraction = extract_pptx(&bytes).await.expect("extract");
        assert!(!extraction.degraded);
        assert!(extraction.text.contains("Title slide"));
        assert!(extraction.text.contains("Closing remarks"));
        assert_eq!(extraction.page_count, Some(2));
    }

    #[test]
    fn test_legacy_placeholder_names_the_format() {
        let extraction = legacy_placeholder(FormatKind::LegacyExcel);
        assert!(extraction.degraded);
        assert!(extraction.text.contains(".xls"));
        assert!(extraction.text.contains("convert"));
    }
}
