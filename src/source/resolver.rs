//! Filename argument resolution
//!
//! Turns the caller-supplied names found under well-known argument keys into
//! canonical, validated paths. In session mode names are bare filenames looked
//! up in the session's upload directory and then in the shared allow-list. In
//! CLI mode they are relative paths under the files root.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::session::SessionStore;
use crate::source::validate::{self, ContentType, PathRole, DOWNLOAD_TYPES, IMAGE_TYPES, PDF_TYPES};
use serde_json::Value;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Argument keys that carry filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKey {
    File,
    Files,
    StampPath,
    Output,
    OutputDir,
}

impl ArgKey {
    /// Input keys, in the order they are resolved
    pub const INPUTS: [ArgKey; 3] = [ArgKey::File, ArgKey::Files, ArgKey::StampPath];
    /// Output keys, in the order they are resolved
    pub const OUTPUTS: [ArgKey; 2] = [ArgKey::Output, ArgKey::OutputDir];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArgKey::File => "file",
            ArgKey::Files => "files",
            ArgKey::StampPath => "stamp_path",
            ArgKey::Output => "output",
            ArgKey::OutputDir => "output_dir",
        }
    }

    pub fn role(&self) -> PathRole {
        match self {
            ArgKey::File | ArgKey::Files | ArgKey::StampPath => PathRole::Input,
            ArgKey::Output => PathRole::Output,
            ArgKey::OutputDir => PathRole::OutputDir,
        }
    }

    pub fn is_input(&self) -> bool {
        self.role() == PathRole::Input
    }

    /// Content types an input under this key may have
    pub fn accepted_types(&self) -> &'static [ContentType] {
        match self {
            ArgKey::StampPath => IMAGE_TYPES,
            ArgKey::File | ArgKey::Files => PDF_TYPES,
            ArgKey::Output | ArgKey::OutputDir => &[],
        }
    }
}

impl fmt::Display for ArgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated path and where it was validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub key: ArgKey,
    /// Root the path was checked against
    pub root: PathBuf,
}

impl ResolvedPath {
    pub fn into_value(self) -> Value {
        Value::String(self.path.to_string_lossy().to_string())
    }
}

/// Resolves filename arguments against the configured roots
#[derive(Debug, Clone)]
pub struct PathResolver {
    config: Arc<Config>,
    sessions: SessionStore,
}

impl PathResolver {
    pub fn new(config: Arc<Config>) -> Self {
        let sessions = SessionStore::new(Arc::clone(&config));
        Self { config, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Root that outputs land in when the caller names none: the session
    /// directory, or the files root in CLI mode.
    pub fn output_root(&self, session_id: Option<&str>) -> Result<PathBuf> {
        match session_id {
            Some(id) => self.sessions.session_dir(id),
            None => Ok(self.config.files_root.clone()),
        }
    }

    /// Resolve a single name or a list of names found under `key`.
    ///
    /// Lists keep their order; the first failing element aborts the whole
    /// argument. Outputs take exactly one name.
    pub fn process_path_arg(
        &self,
        value: &Value,
        session_id: Option<&str>,
        key: ArgKey,
    ) -> Result<Value> {
        if !key.is_input() && !value.is_string() {
            return Err(Error::invalid_argument(key.as_str(), "expected a single filename"));
        }

        match value {
            Value::String(name) => Ok(self.resolve_name(name, session_id, key)?.into_value()),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(Error::invalid_argument(key.as_str(), "list must not be empty"));
                }
                let resolved = items
                    .iter()
                    .map(|item| match item {
                        Value::String(name) => {
                            Ok(self.resolve_name(name, session_id, key)?.into_value())
                        }
                        _ => Err(Error::invalid_argument(
                            key.as_str(),
                            "list elements must be filenames",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(resolved))
            }
            _ => Err(Error::invalid_argument(
                key.as_str(),
                "expected a filename or a list of filenames",
            )),
        }
    }

    /// Resolve one name under `key`.
    pub fn resolve_name(
        &self,
        name: &str,
        session_id: Option<&str>,
        key: ArgKey,
    ) -> Result<ResolvedPath> {
        self.resolve_with_types(name, session_id, key, key.accepted_types())
    }

    /// Resolve a file a client asked to read back: same lookup as a `file`
    /// input, but any type an operation can produce is accepted.
    pub fn resolve_download(&self, name: &str, session_id: Option<&str>) -> Result<ResolvedPath> {
        self.resolve_with_types(name, session_id, ArgKey::File, DOWNLOAD_TYPES)
    }

    fn resolve_with_types(
        &self,
        name: &str,
        session_id: Option<&str>,
        key: ArgKey,
        accepted: &[ContentType],
    ) -> Result<ResolvedPath> {
        if name.trim().is_empty() {
            return Err(Error::invalid_argument(key.as_str(), "filename is empty"));
        }

        match session_id {
            Some(id) => self.resolve_in_session(name, id, key, accepted),
            None => self.resolve_in_cli_root(name, key, accepted),
        }
    }

    fn resolve_in_session(
        &self,
        name: &str,
        session_id: &str,
        key: ArgKey,
        accepted: &[ContentType],
    ) -> Result<ResolvedPath> {
        check_session_name(name, key)?;
        let session_dir = self.sessions.session_dir(session_id)?;

        if !key.is_input() {
            return self.resolve_and_validate(name, &session_dir, key, accepted, Some(session_id));
        }

        if session_dir.join(name).exists() {
            return self.resolve_and_validate(name, &session_dir, key, accepted, Some(session_id));
        }

        let files_root = &self.config.files_root;
        if self.config.is_shared(name) && files_root.join(name).exists() {
            tracing::debug!(session = %session_id, name = %name, "resolved from shared files");
            return self.resolve_and_validate(name, files_root, key, accepted, Some(session_id));
        }

        tracing::warn!(session = %session_id, name = %name, key = %key, "file not available in session");
        Err(Error::NotFound {
            name: name.to_string(),
        })
    }

    fn resolve_in_cli_root(
        &self,
        name: &str,
        key: ArgKey,
        accepted: &[ContentType],
    ) -> Result<ResolvedPath> {
        let path = Path::new(name);
        if path.is_absolute() || name.starts_with('~') || name.starts_with('\\') {
            tracing::warn!(name = %name, key = %key, "absolute path rejected");
            return Err(Error::AccessDenied {
                path: name.to_string(),
            });
        }
        if has_parent_segment(name) {
            tracing::warn!(name = %name, key = %key, "traversal segment rejected");
            return Err(Error::AccessDenied {
                path: name.to_string(),
            });
        }

        let root = self.config.files_root.clone();
        self.resolve_and_validate(name, &root, key, accepted, None)
    }

    /// Join `filename` onto `root`, confirm lexical containment, create the
    /// directories an output needs, then run the full validator.
    fn resolve_and_validate(
        &self,
        filename: &str,
        root: &Path,
        key: ArgKey,
        accepted: &[ContentType],
        session_id: Option<&str>,
    ) -> Result<ResolvedPath> {
        let joined = root.join(filename);
        if !lexically_contained(&joined, root) {
            return Err(Error::AccessDenied {
                path: filename.to_string(),
            });
        }

        match key.role() {
            PathRole::OutputDir => std::fs::create_dir_all(&joined)?,
            PathRole::Output => {
                if let Some(parent) = joined.parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            PathRole::Input => {}
        }

        let path = validate::validate(&joined, root, session_id, key.role(), accepted)?;
        Ok(ResolvedPath {
            path,
            key,
            root: root.to_path_buf(),
        })
    }
}

/// Session names are bare filenames and every output lands directly in the
/// session directory, so a returned filename always names the same file.
fn check_session_name(name: &str, key: ArgKey) -> Result<()> {
    let denied = has_parent_segment(name)
        || Path::new(name).is_absolute()
        || name.contains('/')
        || name.contains('\\');

    if denied {
        tracing::warn!(name = %name, key = %key, "session filename rejected");
        return Err(Error::AccessDenied {
            path: name.to_string(),
        });
    }
    if key == ArgKey::OutputDir && name != "." {
        return Err(Error::invalid_argument(
            key.as_str(),
            "session outputs are written to the session directory",
        ));
    }
    Ok(())
}

fn has_parent_segment(name: &str) -> bool {
    name.split(['/', '\\']).any(|segment| segment == "..")
}

fn lexically_contained(path: &Path, root: &Path) -> bool {
    let mut depth = 0usize;
    for component in path.strip_prefix(root).map(Path::components).into_iter().flatten() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    path.starts_with(root)
}
