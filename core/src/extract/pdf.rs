use crate::error::{CoreError, CoreResult};
use lopdf::Document;
use std::path::Path;

/// Loaded PDF with 1-indexed page access.
pub struct PdfDoc {
    doc: Document,
    page_numbers: Vec<u32>,
}

impl PdfDoc {
    pub fn open(path: &Path) -> CoreResult<Self> {
        let doc = Document::load(path)
            .map_err(|e| CoreError::Pdf(format!("{}: {}", path.display(), e)))?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        Ok(Self { doc, page_numbers })
    }

    pub fn page_count(&self) -> u32 {
        self.page_numbers.len() as u32
    }

    /// Raw text of one 1-indexed page. Pages the parser cannot decode yield
    /// empty text; the condition is logged, not swallowed.
    pub fn text_on_page(&self, page: u32) -> String {
        if !self.page_numbers.contains(&page) {
            return String::new();
        }
        match self.doc.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(page, error = %e, "pdf page text extraction failed");
                String::new()
            }
        }
    }

    /// All pages in order as (page_number, raw_text).
    pub fn pages(&self) -> Vec<(u32, String)> {
        self.page_numbers
            .iter()
            .map(|p| (*p, self.text_on_page(*p)))
            .collect()
    }
}
