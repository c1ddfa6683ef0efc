//! PDF processing layer
//!
//! Page copying goes through qpdf; stamping and text extraction through PDFium.

mod pdfium;
pub mod pages;
mod qpdf;
pub mod redact;
pub mod stamp;

pub use pages::parse_page_selection;
pub use pdfium::extract_page_texts;
pub use qpdf::QpdfWrapper;
pub use redact::{compile_patterns, redact_pages, REDACTION_MARKER};
pub use stamp::{stamp_pages, target_pages, StampOptions, StampPosition};
