//! qpdf FFI wrapper for page-level operations
//!
//! Merging and page extraction use the qpdf crate (vendored FFI). Page
//! selection is parsed by [`crate::pdf::pages`]; this layer only copies pages.

use crate::error::{Error, Result};
use qpdf::QPdf;

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

fn open_qpdf(data: &[u8]) -> Result<QPdf> {
    QPdf::read_from_memory(data).map_err(map_qpdf_error)
}

fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    Error::Qpdf {
        reason: e.to_string(),
    }
}

impl QpdfWrapper {
    /// Number of pages in a PDF
    pub fn page_count(input_data: &[u8]) -> Result<u32> {
        open_qpdf(input_data)?
            .get_num_pages()
            .map_err(map_qpdf_error)
    }

    /// Copy the given 0-indexed pages, in order, into a new PDF
    pub fn extract_pages(input_data: &[u8], indices: &[u32]) -> Result<Vec<u8>> {
        let source = open_qpdf(input_data)?;
        let num_pages = source.get_num_pages().map_err(map_qpdf_error)?;

        if indices.is_empty() {
            return Err(Error::Qpdf {
                reason: "No pages to extract".to_string(),
            });
        }

        let dest = QPdf::empty();
        for &idx in indices {
            let page = source.get_page(idx).ok_or(Error::PageOutOfBounds {
                page: i64::from(idx) + 1,
                total: num_pages,
            })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(map_qpdf_error)
    }

    /// Merge PDFs, keeping input order
    pub fn merge(inputs: &[&[u8]]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::Qpdf {
                reason: "No input PDFs provided".to_string(),
            });
        }

        let dest = QPdf::empty();

        for (i, input_data) in inputs.iter().enumerate() {
            let source = QPdf::read_from_memory(input_data).map_err(|e| Error::InvalidPdf {
                reason: format!("Failed to read input PDF {}: {}", i + 1, e),
            })?;

            let pages = source.get_pages().map_err(|e| Error::Qpdf {
                reason: format!("Failed to get pages from input PDF {}: {}", i + 1, e),
            })?;

            for page in &pages {
                let copied = dest.copy_from_foreign(page);
                dest.add_page(&copied, false).map_err(map_qpdf_error)?;
            }
        }

        dest.writer().write_to_memory().map_err(map_qpdf_error)
    }
}
