//! Path resolution, validation and session storage

pub mod resolver;
pub mod session;
pub mod validate;

pub use resolver::{ArgKey, PathResolver, ResolvedPath};
pub use session::{validate_session_id, AvailableFile, SessionStore, SweepReport};
pub use validate::{
    hash_file, sniff_content_type, validate, ContentType, PathRole, DOWNLOAD_TYPES,
    MAX_INPUT_BYTES,
};
