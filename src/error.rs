//! Error types for pdfshell

use thiserror::Error;

/// Result type alias for pdfshell
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pdfshell
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced file is absent or not visible in the caller's scope
    #[error("File not available: {name}")]
    NotFound { name: String },

    /// Path escapes its designated root or carries traversal segments
    #[error("Access denied: {path} is outside of its designated directory")]
    AccessDenied { path: String },

    /// Path could not be canonicalized or is not a regular file
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// Malformed or missing argument
    #[error("Invalid argument '{key}': {reason}")]
    InvalidArgument { key: String, reason: String },

    /// Input file exceeds the size ceiling
    #[error("File '{name}' too large ({size} bytes). Maximum size is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },

    /// Input file content type is not accepted for this argument
    #[error("Invalid file type for '{name}': {}. Accepted types are: {}", .found.as_deref().unwrap_or("unknown"), .accepted.join(", "))]
    UnsupportedType {
        name: String,
        found: Option<String>,
        accepted: Vec<String>,
    },

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page selection matched no pages
    #[error("No pages selected by range: {range}")]
    EmptySelection { range: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: i64, total: u32 },

    /// No operation registered under this name
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    Qpdf { reason: String },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Stamp image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Redaction pattern failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_argument(key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable tag recorded as the audit `error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::AccessDenied { .. } => "access_denied",
            Error::InvalidPath { .. } => "invalid_path",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::TooLarge { .. } => "too_large",
            Error::UnsupportedType { .. } => "unsupported_type",
            Error::InvalidPageRange { .. } => "invalid_page_range",
            Error::EmptySelection { .. } => "empty_selection",
            Error::PageOutOfBounds { .. } => "page_out_of_bounds",
            Error::UnknownTool { .. } => "unknown_tool",
            Error::InvalidPdf { .. } => "invalid_pdf",
            Error::Qpdf { .. } | Error::Pdfium { .. } | Error::Image(_) => "pdf_processing",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::Io(_) | Error::Serialization(_) => "internal",
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Server paths and library internals are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::NotFound { name } => format!("File not available: {}", name),
            Error::AccessDenied { .. } => "Access denied".to_string(),
            Error::InvalidPath { .. } => "Invalid file path".to_string(),
            Error::InvalidArgument { key, reason } => {
                format!("Invalid argument '{}': {}", key, reason)
            }
            Error::TooLarge { name, limit, .. } => format!(
                "File '{}' too large. Maximum size is {}MB",
                name,
                limit / (1024 * 1024)
            ),
            Error::UnsupportedType { name, accepted, .. } => format!(
                "Invalid file type for '{}'. Accepted types are: {}",
                name,
                accepted.join(", ")
            ),
            Error::InvalidPageRange { range } => format!("Invalid page range: {}", range),
            Error::EmptySelection { range } => format!("No pages selected by range: {}", range),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::UnknownTool { name } => format!("Unknown tool: {}", name),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::Qpdf { .. } | Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Image(_) => "Invalid stamp image".to_string(),
            Error::InvalidPattern(e) => format!("Invalid pattern: {}", e),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }
}
