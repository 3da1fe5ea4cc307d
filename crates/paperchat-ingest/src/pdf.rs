//! PDF text extraction.

use anyhow::Result;
use lopdf::Document;
use tracing::debug;

/// True when the bytes look like a PDF document.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    data.starts_with(b"%PDF")
}

/// Extract plain text from PDF bytes, page by page.
///
/// Pages that fail to decode are skipped; extraction only fails when the
/// document itself cannot be loaded.
pub fn extract_text_from_pdf(data: &[u8]) -> Result<String> {
    let doc = Document::load_mem(data)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();

    let mut text = String::new();
    for page in pages {
        match doc.extract_text(&[page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => debug!(page, error = %e, "page text extraction failed"),
        }
    }

    Ok(clean_extracted_text(&text))
}

/// Strip inline citation brackets like `[1]` or `[2,3]` and collapse runs of
/// blank lines left behind by the page loop.
pub fn clean_extracted_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    let mut cleaned = String::with_capacity(out.len());
    let mut blank_run = 0usize;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line.trim_end());
        cleaned.push('\n');
    }
    cleaned.trim().to_string()
}
