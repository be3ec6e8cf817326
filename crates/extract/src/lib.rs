//! # docchat-extract: Text Extraction
//!
//! Per-format text extraction for the ingestion pipeline. Each supported file
//! type gets a `TextExtractor` implementation; `extractor_for` dispatches on
//! the lowercased file extension.

use regex::Regex;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read source file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse file content: {0}")]
    Parse(String),
    #[error("No extractor registered for file type: {0}")]
    UnsupportedFormat(String),
}

/// Extracts plain text from a file on disk.
pub trait TextExtractor: Send + Sync + Debug {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Reads a file as UTF-8 text, tolerating other encodings by lossy decoding.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Markdown files are ingested as-is; headings and list markers carry useful
/// structure for chunking.
#[derive(Debug, Default)]
pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        PlainTextExtractor.extract(path)
    }
}

/// Extracts the text drawn on every page of a PDF.
#[cfg(feature = "pdf")]
#[derive(Debug, Default)]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        use pdf::file::FileOptions;

        let data = fs::read(path)?;
        let file = FileOptions::cached()
            .load(data.as_slice())
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        let resolver = file.resolver();
        let mut full_text = String::new();

        for page_num in 0..file.num_pages() {
            let page = file
                .get_page(page_num)
                .map_err(|e| ExtractError::Parse(e.to_string()))?;
            if let Some(content) = &page.contents {
                let operations = content
                    .operations(&resolver)
                    .map_err(|e| ExtractError::Parse(e.to_string()))?;
                for op in operations.iter() {
                    if let pdf::content::Op::TextDraw { text } = op {
                        full_text.push_str(&text.to_string_lossy());
                    }
                }
                full_text.push('\n');
            }
        }
        Ok(full_text)
    }
}

/// Returns the extractor for a lowercased file extension, or `None` when the
/// format is not supported.
pub fn extractor_for(file_type: &str) -> Option<Box<dyn TextExtractor>> {
    match file_type {
        "txt" => Some(Box::new(PlainTextExtractor)),
        "md" | "markdown" => Some(Box::new(MarkdownExtractor)),
        #[cfg(feature = "pdf")]
        "pdf" => Some(Box::new(PdfExtractor)),
        _ => None,
    }
}

/// Normalizes extracted text: unifies line endings, strips trailing spaces,
/// collapses runs of spaces and tabs, and bounds consecutive blank lines to
/// one (keeping paragraph boundaries meaningful for the chunker).
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let spaces = Regex::new(r"[ \t]+").unwrap();
    let blank_lines = Regex::new(r"\n{3,}").unwrap();

    let collapsed = spaces.replace_all(&unified, " ");
    let lines: Vec<&str> = collapsed.lines().map(|l| l.trim_end()).collect();
    let rejoined = lines.join("\n");

    blank_lines.replace_all(&rejoined, "\n\n").trim().to_string()
}
