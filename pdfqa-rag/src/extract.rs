//! PDF text extraction.
//!
//! `pdf-extract` is tried first since it decodes font encodings that raw
//! content-stream text misses. It panics on some malformed files, so every
//! call runs under [`catch_unwind`](std::panic::catch_unwind); a panic or
//! error falls back to lopdf's per-page extraction.
//!
//! Pages are read in document order, each page's whitespace runs are collapsed
//! to single spaces, and non-empty pages are joined with a blank line. An empty
//! result is not an error here; the pipeline turns it into
//! [`RagError::EmptyDocument`].

use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use lopdf::Document;
use tracing::{debug, error, warn};

use crate::error::{RagError, Result};

/// Separator placed between the text of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extract the cleaned full text of the PDF at `path`.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] if neither extractor can read the file.
pub fn extract_text(path: &Path) -> Result<String> {
    let primary = match catch_extraction(|| pdf_extract::extract_text_by_pages(path)) {
        Ok(pages) => return Ok(join_pages(&pages)),
        Err(reason) => reason,
    };
    warn!(path = %path.display(), reason = %primary, "pdf-extract failed, falling back to lopdf");

    let document = Document::load(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to load PDF");
        RagError::Extraction(format!("failed to load '{}': {primary}; {e}", path.display()))
    })?;
    extract_document(&document)
}

/// Extract the cleaned full text of an in-memory PDF.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String> {
    let primary = match catch_extraction(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
        Ok(pages) => return Ok(join_pages(&pages)),
        Err(reason) => reason,
    };
    warn!(reason = %primary, "pdf-extract failed, falling back to lopdf");

    let document = Document::load_mem(bytes).map_err(|e| {
        error!(error = %e, "failed to parse PDF bytes");
        RagError::Extraction(format!("failed to parse PDF: {primary}; {e}"))
    })?;
    extract_document(&document)
}

/// Run one extractor call, turning both its error and any panic into a
/// message.
fn catch_extraction<F, E>(extract: F) -> std::result::Result<Vec<String>, String>
where
    F: FnOnce() -> std::result::Result<Vec<String>, E>,
    E: Display,
{
    match catch_unwind(AssertUnwindSafe(extract)) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("extractor panicked: {message}"))
        }
    }
}

fn extract_document(document: &Document) -> Result<String> {
    if document.is_encrypted() {
        return Err(RagError::Extraction("encrypted PDFs are not supported".to_string()));
    }

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    let mut last_error = None;

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(raw) => texts.push(raw),
            Err(e) => {
                warn!(page = page_number, error = %e, "skipping page that failed to decode");
                last_error = Some(format!("page {page_number}: {e}"));
            }
        }
    }

    if texts.is_empty() {
        if let Some(reason) = last_error {
            return Err(RagError::Extraction(format!("no page could be decoded ({reason})")));
        }
    }
    Ok(join_pages(&texts))
}

fn join_pages(pages: &[String]) -> String {
    let text = pages
        .iter()
        .map(|page| collapse_whitespace(page))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);
    debug!(page_count = pages.len(), text_len = text.chars().count(), "extracted PDF text");
    text
}

/// Collapse every run of whitespace (tabs, newlines, repeated spaces) into a
/// single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
