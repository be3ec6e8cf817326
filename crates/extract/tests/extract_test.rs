//! # Extraction Tests

use docchat_extract::{extractor_for, normalize_whitespace};
use std::io::Write;

#[test]
fn test_plain_text_extraction() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "hello from a text file").unwrap();

    let extractor = extractor_for("txt").unwrap();
    let text = extractor.extract(file.path()).unwrap();
    assert_eq!(text, "hello from a text file");
}

#[test]
fn test_markdown_uses_plain_text_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "# Heading\n\nbody").unwrap();

    let extractor = extractor_for("md").unwrap();
    assert_eq!(extractor.extract(file.path()).unwrap(), "# Heading\n\nbody");
}

#[test]
fn test_unknown_format_has_no_extractor() {
    assert!(extractor_for("exe").is_none());
    assert!(extractor_for("docx").is_none());
}

#[test]
fn test_normalize_unifies_line_endings_and_spaces() {
    let raw = "line one\r\nline  two\t\tmore\r\n\r\n\r\n\r\nlast   line  ";
    let normalized = normalize_whitespace(raw);
    assert_eq!(normalized, "line one\nline two more\n\nlast line");
}

#[test]
fn test_normalize_keeps_single_paragraph_break() {
    let raw = "para one\n\npara two";
    assert_eq!(normalize_whitespace(raw), "para one\n\npara two");
}

#[test]
fn test_non_utf8_bytes_decode_lossily() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[b'o', b'k', 0xFF, b'!']).unwrap();

    let extractor = extractor_for("txt").unwrap();
    let text = extractor.extract(file.path()).unwrap();
    assert!(text.starts_with("ok"));
    assert!(text.ends_with('!'));
}
