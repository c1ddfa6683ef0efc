//! pdfshell library
//!
//! A PDF workbench whose every filename argument goes through one resolver:
//! - `source`: hashing, path validation, session directories
//! - `engine`: `run_tool`, the operation registry and the audit trace
//! - `tools`: merge, split, add_stamp and redact
//! - `server`: MCP front end, one session per connection

pub mod config;
pub mod engine;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;
pub mod tools;

pub use config::Config;
pub use engine::{AuditRecord, AuditStore, Engine, JsonlAuditStore, MemoryAuditStore};
pub use error::{Error, Result};
pub use server::{run_server, PdfShellServer, ToolRunResult};
pub use source::{ArgKey, AvailableFile, PathResolver, SessionStore};
