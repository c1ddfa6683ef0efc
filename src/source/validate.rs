//! Content hashing and resolved-path validation

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

/// Maximum size of any input file (25 MiB)
pub const MAX_INPUT_BYTES: u64 = 25 * 1024 * 1024;

const HASH_CHUNK_SIZE: usize = 8192;

/// Content types accepted for input files, sniffed by extension and signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    Png,
    Jpeg,
    Markdown,
}

/// Default allow-list for document inputs
pub const PDF_TYPES: &[ContentType] = &[ContentType::Pdf];

/// Allow-list for stamp images
pub const IMAGE_TYPES: &[ContentType] = &[ContentType::Png, ContentType::Jpeg];

/// Everything an operation can produce, for handing files back to clients
pub const DOWNLOAD_TYPES: &[ContentType] = &[
    ContentType::Pdf,
    ContentType::Png,
    ContentType::Jpeg,
    ContentType::Markdown,
];

impl ContentType {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Markdown => "text/markdown",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(ContentType::Pdf),
            "png" => Some(ContentType::Png),
            "jpg" | "jpeg" => Some(ContentType::Jpeg),
            "md" => Some(ContentType::Markdown),
            _ => None,
        }
    }

    fn matches_signature(&self, head: &[u8]) -> bool {
        match self {
            ContentType::Pdf => head.starts_with(b"%PDF"),
            ContentType::Png => head.starts_with(b"\x89PNG\r\n\x1a\n"),
            ContentType::Jpeg => head.starts_with(&[0xFF, 0xD8, 0xFF]),
            ContentType::Markdown => !head.contains(&0),
        }
    }
}

/// How a path is used by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// Existing file read by the operation
    Input,
    /// File the operation will create; its parent must be contained
    Output,
    /// Directory the operation writes into; the directory itself must be contained
    OutputDir,
}

/// SHA-256 of a file's content as lowercase hex, streamed in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "file not found for hashing");
        return Err(Error::NotFound {
            name: display_name(path),
        });
    }

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hex::encode(hasher.finalize());
    tracing::debug!(path = %path.display(), digest = %digest, "hashed file");
    Ok(digest)
}

/// Sniff a file's content type: the extension names a candidate, the leading
/// bytes must carry that type's signature.
pub fn sniff_content_type(path: &Path) -> Result<Option<ContentType>> {
    let Some(candidate) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ContentType::from_extension)
    else {
        return Ok(None);
    };

    let mut head = Vec::with_capacity(8);
    File::open(path)?.take(8).read_to_end(&mut head)?;
    Ok(candidate.matches_signature(&head).then_some(candidate))
}

/// Validate an already-joined path against the root it must stay inside.
///
/// Gates, in order: canonicalization, containment of the canonical path (the
/// parent directory for [`PathRole::Output`]), absence of `..` segments, and
/// for inputs existence, regular-file, size and content-type checks.
/// Returns the canonical path. Never touches the filesystem beyond reads.
pub fn validate(
    path: &Path,
    expected_root: &Path,
    session_id: Option<&str>,
    role: PathRole,
    accepted_types: &[ContentType],
) -> Result<PathBuf> {
    let canonical = canonicalize_lenient(path, role)?;

    let root = std::fs::canonicalize(expected_root).map_err(|e| {
        tracing::error!(root = %expected_root.display(), error = %e, "expected root cannot be canonicalized");
        Error::InvalidPath {
            path: expected_root.display().to_string(),
        }
    })?;

    let contained = match role {
        PathRole::Input | PathRole::OutputDir => canonical.starts_with(&root),
        PathRole::Output => canonical
            .parent()
            .map(|parent| parent.starts_with(&root))
            .unwrap_or(false),
    };
    if !contained {
        tracing::warn!(
            path = %canonical.display(),
            root = %root.display(),
            session = ?session_id,
            "path outside of designated directory"
        );
        return Err(Error::AccessDenied {
            path: path.display().to_string(),
        });
    }

    if canonical
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        tracing::warn!(path = %canonical.display(), session = ?session_id, "traversal segment after canonicalization");
        return Err(Error::AccessDenied {
            path: path.display().to_string(),
        });
    }

    if role == PathRole::Input {
        validate_input_file(&canonical, accepted_types)?;
    }

    tracing::info!(path = %canonical.display(), ?role, session = ?session_id, "path validated");
    Ok(canonical)
}

fn validate_input_file(path: &Path, accepted_types: &[ContentType]) -> Result<()> {
    let name = display_name(path);

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "input file not found");
            return Err(Error::NotFound { name });
        }
        Err(e) => return Err(Error::Io(e)),
    };
    if !metadata.is_file() {
        return Err(Error::InvalidPath { path: name });
    }

    if metadata.len() > MAX_INPUT_BYTES {
        tracing::warn!(path = %path.display(), size = metadata.len(), "input exceeds size limit");
        return Err(Error::TooLarge {
            name,
            size: metadata.len(),
            limit: MAX_INPUT_BYTES,
        });
    }

    let sniffed = sniff_content_type(path)?;
    if !sniffed.is_some_and(|t| accepted_types.contains(&t)) {
        tracing::warn!(path = %path.display(), found = ?sniffed, "content type not accepted");
        return Err(Error::UnsupportedType {
            name,
            found: sniffed.map(|t| t.mime().to_string()),
            accepted: accepted_types.iter().map(|t| t.mime().to_string()).collect(),
        });
    }

    Ok(())
}

/// Canonicalize a path that may not exist yet: a missing final component is
/// re-attached to its canonicalized parent. An input under a missing
/// directory is reported as a missing file.
fn canonicalize_lenient(path: &Path, role: PathRole) -> Result<PathBuf> {
    let invalid = || Error::InvalidPath {
        path: path.display().to_string(),
    };

    match std::fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let name = path.file_name().ok_or_else(invalid)?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let parent = match std::fs::canonicalize(parent) {
                Ok(parent) => parent,
                Err(e) if e.kind() == ErrorKind::NotFound && role == PathRole::Input => {
                    tracing::warn!(path = %path.display(), "input directory not found");
                    return Err(Error::NotFound {
                        name: display_name(path),
                    });
                }
                Err(_) => return Err(invalid()),
            };
            Ok(parent.join(name))
        }
        Err(_) => Err(invalid()),
    }
}

/// File name only, for messages that may reach clients.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
