//! PDFium bindings shared by the stamping and text operations

use crate::error::{Error, Result};
use pdfium_render::prelude::*;

/// Bind to a PDFium library next to the binary, under /opt/pdfium, or on the
/// system library path, in that order.
pub(crate) fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

pub(crate) fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError) => {
            Error::InvalidPdf {
                reason: format!("{}", err),
            }
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

/// Plain text of every page, in page order. Pages without a text layer
/// yield an empty string.
pub fn extract_page_texts(data: &[u8]) -> Result<Vec<String>> {
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let texts: Vec<String> = document
        .pages()
        .iter()
        .map(|page| page.text().map(|t| t.all()).unwrap_or_default())
        .collect();

    tracing::debug!(pages = texts.len(), "extracted page text");
    Ok(texts)
}
