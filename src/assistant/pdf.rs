use std::panic::{ self, AssertUnwindSafe };
use std::path::PathBuf;

use log::{ info, warn };
use thiserror::Error;

pub const NO_FILE: &str = "Please upload a PDF file.";
pub const DEFAULT_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub enum PdfInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("{0}")]
    Extract(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Source of per-page text for a document, in page order.
pub trait PageExtractor: Send + Sync {
    fn extract_pages(&self, input: &PdfInput) -> Result<Vec<String>, PdfError>;
}

/// Page extraction backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractPages;

impl PageExtractor for PdfExtractPages {
    fn extract_pages(&self, input: &PdfInput) -> Result<Vec<String>, PdfError> {
        let bytes = match input {
            PdfInput::Path(path) => std::fs::read(path)?,
            PdfInput::Bytes(bytes) => bytes.clone(),
        };

        // pdf-extract panics on some malformed documents
        match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(PdfError::Extract(e.to_string())),
            Err(_) => Err(PdfError::Extract("malformed PDF document".to_string())),
        }
    }
}

/// Page texts joined by newlines, cut to `limit` characters. The ellipsis is
/// always appended, whether or not anything was cut.
pub fn render_preview(pages: &[String], limit: usize) -> String {
    let text = pages.join("\n");
    let head: String = text.chars().take(limit).collect();
    format!("PDF Content:\n{}...", head)
}

pub fn process_pdf(extractor: &dyn PageExtractor, file: Option<&PdfInput>, limit: usize) -> String {
    let input = match file {
        None => {
            return NO_FILE.to_string();
        }
        Some(PdfInput::Bytes(bytes)) if bytes.is_empty() => {
            return NO_FILE.to_string();
        }
        Some(input) => input,
    };

    match extractor.extract_pages(input) {
        Ok(pages) => {
            info!("Extracted {} pages of PDF text", pages.len());
            render_preview(&pages, limit)
        }
        Err(e) => {
            warn!("PDF extraction failed: {}", e);
            format!("Error processing PDF: {}", e)
        }
    }
}
