//! Document ingestion: turn an uploaded file into plain text.
//!
//! Word documents (`.docx`) are ZIP archives; the body lives in
//! `word/document.xml`. Everything else is treated as UTF-8 text.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;
use zip::ZipArchive;

const DOCUMENT_XML: &str = "word/document.xml";

/// Bytes of `document.xml` allowed per character of the text limit; run
/// properties and revision marks make WordprocessingML very verbose.
const XML_BYTES_PER_CHAR: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Docx,
    Text,
}

impl DocumentFormat {
    /// Pick a format from the file extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        let is_docx = filename
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("docx"));
        if is_docx { Self::Docx } else { Self::Text }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("not a valid Word document: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("could not read {DOCUMENT_XML}: {0}")]
    Read(#[from] std::io::Error),

    #[error("{DOCUMENT_XML} is larger than {limit} bytes uncompressed")]
    TooLarge { limit: u64 },

    #[error("malformed document XML at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
}

/// Extract plain text from `bytes`, choosing the reader by `filename`.
///
/// `max_chars` bounds how much of a Word document body is decompressed;
/// the text itself is length-checked later, with the other inputs.
pub fn extract_text(filename: &str, bytes: &[u8], max_chars: usize) -> Result<String, IngestError> {
    match DocumentFormat::from_filename(filename) {
        DocumentFormat::Docx => extract_docx(bytes, max_chars),
        DocumentFormat::Text => Ok(decode_text(bytes)),
    }
}

/// Lossy UTF-8 decode with any leading byte-order mark removed.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn extract_docx(bytes: &[u8], max_chars: usize) -> Result<String, IngestError> {
    let limit = (max_chars as u64).saturating_mul(XML_BYTES_PER_CHAR);
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let entry = archive.by_name(DOCUMENT_XML)?;
    if entry.size() > limit {
        return Err(IngestError::TooLarge { limit });
    }

    // The declared size comes from the archive and may be wrong.
    let mut xml = String::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_string(&mut xml)?;
    if xml.len() as u64 > limit {
        return Err(IngestError::TooLarge { limit });
    }

    let text = document_text(&xml)?;
    tracing::debug!(chars = text.len(), "extracted text from Word document");
    Ok(text)
}

/// Collect the text runs of a WordprocessingML body.
///
/// Paragraphs are separated by a blank line; tabs and line breaks inside a
/// paragraph are kept. Empty paragraphs are dropped.
///
/// Text boxes nest whole paragraphs inside a run of the enclosing one. The
/// enclosing text read so far is emitted before the nested paragraph, so
/// everything comes out in reading order.
fn document_text(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        let event = reader.read_event().map_err(|source| IngestError::Xml {
            position: reader.buffer_position(),
            source,
        })?;
        match event {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:p" => {
                    if depth > 0 {
                        flush_paragraph(&mut paragraphs, &mut current);
                    }
                    depth += 1;
                }
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(ref t) if in_text => {
                let text = t.unescape().map_err(|source| IngestError::Xml {
                    position: reader.buffer_position(),
                    source,
                })?;
                current.push_str(&text);
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    flush_paragraph(&mut paragraphs, &mut current);
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n\n"))
}

fn flush_paragraph(paragraphs: &mut Vec<String>, current: &mut String) {
    if !current.trim().is_empty() {
        paragraphs.push(std::mem::take(current));
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    const LIMIT: usize = crate::config::Limits::DEFAULT_MAX_DOCUMENT_CHARS;

    fn docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            zip.start_file("[Content_Types].xml", FileOptions::default())
                .unwrap();
            zip.write_all(b"<Types/>").unwrap();
            zip.start_file(DOCUMENT_XML, FileOptions::default()).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_filename("report.DOCX"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_filename("notes.md"), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_filename("docx"), DocumentFormat::Text);
    }

    #[test]
    fn docx_paragraphs_and_runs() {
        let bytes = docx(
            r#"<w:p><w:r><w:t>Solar </w:t></w:r><w:r><w:t>Power</w:t></w:r></w:p>
<w:p><w:r><w:t>Panels</w:t><w:tab/><w:t>are cheap</w:t><w:br/><w:t>and getting cheaper &amp; better.</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t xml:space="preserve">Storage matters. </w:t></w:r></w:p>"#,
        );
        let text = extract_text("solar.docx", &bytes, LIMIT).unwrap();
        assert_eq!(
            text,
            "Solar Power\n\nPanels\tare cheap\nand getting cheaper & better.\n\nStorage matters. "
        );
    }

    #[test]
    fn docx_ignores_text_outside_runs() {
        let bytes = docx(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>"#);
        assert_eq!(extract_text("a.docx", &bytes, LIMIT).unwrap(), "Title");
    }

    #[test]
    fn docx_text_box_keeps_enclosing_paragraph() {
        let bytes = docx(
            r#"<w:p><w:r><w:t>Before</w:t></w:r><w:r><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r><w:r><w:t>After</w:t></w:r></w:p>
<w:p><w:r><w:t>Next</w:t></w:r></w:p>"#,
        );
        assert_eq!(
            extract_text("a.docx", &bytes, LIMIT).unwrap(),
            "Before\n\nBox\n\nAfter\n\nNext"
        );
    }

    #[test]
    fn docx_body_over_the_bound_is_rejected() {
        // Highly compressible: tiny archive, large body.
        let run = "<w:p><w:r><w:t>aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa</w:t></w:r></w:p>";
        let bytes = docx(&run.repeat(2_000));
        assert!(bytes.len() < 20_000, "archive is {} bytes", bytes.len());

        let err = extract_text("big.docx", &bytes, 100).unwrap_err();
        assert!(
            matches!(err, IngestError::TooLarge { limit } if limit == 100 * XML_BYTES_PER_CHAR),
            "got: {err}"
        );

        let text = extract_text("big.docx", &bytes, LIMIT).unwrap();
        assert_eq!(text.len(), 2_000 * 32 + 1_999 * 2);
    }

    #[test]
    fn garbage_docx_is_an_archive_error() {
        let err = extract_text("broken.docx", b"not a zip", LIMIT).unwrap_err();
        assert!(matches!(err, IngestError::Archive(_)));
    }

    #[test]
    fn docx_without_body_is_an_archive_error() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            zip.start_file("other.xml", FileOptions::default()).unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text("empty.docx", &buf.into_inner(), LIMIT).unwrap_err();
        assert!(matches!(err, IngestError::Archive(_)));
    }

    #[test]
    fn text_files_strip_bom_and_decode_lossily() {
        assert_eq!(extract_text("a.txt", b"\xEF\xBB\xBFhello", LIMIT).unwrap(), "hello");
        assert_eq!(extract_text("a.md", b"caf\xC3\xA9", LIMIT).unwrap(), "café");
        assert_eq!(extract_text("a.bin", b"ok\xFF", LIMIT).unwrap(), "ok\u{FFFD}");
    }
}
