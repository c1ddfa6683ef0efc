//! Filesystem roots and sharing policy

use std::path::PathBuf;

/// Roots and allow-lists consulted by the resolver and engine.
///
/// Held by value by [`crate::Engine`] and [`crate::source::PathResolver`];
/// nothing in the crate reads process-wide settings after construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared/public files, also the base root in CLI mode
    pub files_root: PathBuf,
    /// Parent of every per-session upload directory
    pub uploads_root: PathBuf,
    /// Filenames under `files_root` readable from any session
    pub shared_files: Vec<String>,
    /// JSON-lines audit log; in-memory trace when unset
    pub audit_log: Option<PathBuf>,
    /// Age after which session directories are swept (default: 7 days)
    pub retention_days: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            files_root: PathBuf::from("files"),
            uploads_root: PathBuf::from("uploads"),
            shared_files: Vec::new(),
            audit_log: None,
            retention_days: 7,
        }
    }
}

impl Config {
    pub fn new(files_root: impl Into<PathBuf>, uploads_root: impl Into<PathBuf>) -> Self {
        Self {
            files_root: files_root.into(),
            uploads_root: uploads_root.into(),
            ..Self::default()
        }
    }

    pub fn with_shared_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = Some(path.into());
        self
    }

    /// Load overrides from `PDFSHELL_*` environment variables on top of defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup("PDFSHELL_FILES_ROOT") {
            config.files_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("PDFSHELL_UPLOADS_ROOT") {
            config.uploads_root = PathBuf::from(root);
        }
        if let Some(list) = lookup("PDFSHELL_SHARED_FILES") {
            config.shared_files = parse_list(&list);
        }
        if let Some(path) = lookup("PDFSHELL_AUDIT_LOG") {
            if !path.trim().is_empty() {
                config.audit_log = Some(PathBuf::from(path));
            }
        }
        if let Some(days) = lookup("PDFSHELL_RETENTION_DAYS") {
            match days.trim().parse() {
                Ok(days) => config.retention_days = days,
                Err(_) => tracing::warn!(value = %days, "ignoring invalid PDFSHELL_RETENTION_DAYS"),
            }
        }
        config
    }

    /// Whether `name` is on the shared allow-list.
    pub fn is_shared(&self, name: &str) -> bool {
        self.shared_files.iter().any(|f| f == name)
    }

    /// Upload directory for a session id (not validated or created here).
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.uploads_root.join(session_id)
    }
}

/// Split a comma separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
