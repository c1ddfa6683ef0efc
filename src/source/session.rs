//! Per-session upload directories

use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::validate::MAX_INPUT_BYTES;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A file visible to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AvailableFile {
    /// Name shown to the user (original upload name, or the shared filename)
    pub user_label: String,
    /// Name to pass as a tool argument
    pub session_filename: String,
    /// Whether the file comes from the shared allow-list
    pub is_public: bool,
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
    pub dry_run: bool,
}

/// Session ids are used as a single directory name under the uploads root.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        tracing::warn!(session = %session_id, "rejected malformed session id");
        Err(Error::invalid_argument(
            "session_id",
            "must be ASCII letters, digits, '-' or '_'",
        ))
    }
}

/// Owns the layout of `uploads_root/<session_id>/`
#[derive(Debug, Clone)]
pub struct SessionStore {
    config: Arc<Config>,
}

impl SessionStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Session directory, created on first use.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        let dir = self.config.session_dir(session_id);
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir)?;
            tracing::info!(session = %session_id, dir = %dir.display(), "created session directory");
        }
        Ok(dir)
    }

    /// Store uploaded bytes under a fresh random name, keeping a sanitized
    /// extension from the original name.
    pub fn store_upload(
        &self,
        session_id: &str,
        original_name: &str,
        data: &[u8],
    ) -> Result<AvailableFile> {
        let label = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::invalid_argument("name", "upload needs a file name"))?;

        if data.len() as u64 > MAX_INPUT_BYTES {
            return Err(Error::TooLarge {
                name: label,
                size: data.len() as u64,
                limit: MAX_INPUT_BYTES,
            });
        }

        let dir = self.session_dir(session_id)?;
        let stored = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            sanitized_extension(&label)
        );
        std::fs::write(dir.join(&stored), data)?;
        tracing::info!(session = %session_id, label = %label, stored = %stored, bytes = data.len(), "stored upload");

        Ok(AvailableFile {
            user_label: label,
            session_filename: stored,
            is_public: false,
        })
    }

    /// Files a session may reference: shared files first, then the session's
    /// own files sorted by name. A session file shadows a shared one of the
    /// same name, matching resolution order.
    pub fn available_files(&self, session_id: &str) -> Result<Vec<AvailableFile>> {
        let dir = self.session_dir(session_id)?;

        let mut own = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                own.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        own.sort();
        let own_names: HashSet<&str> = own.iter().map(String::as_str).collect();

        let mut files: Vec<AvailableFile> = self
            .config
            .shared_files
            .iter()
            .filter(|name| !own_names.contains(name.as_str()))
            .filter(|name| self.config.files_root.join(name).is_file())
            .map(|name| AvailableFile {
                user_label: name.clone(),
                session_filename: name.clone(),
                is_public: true,
            })
            .collect();

        files.extend(own.iter().map(|name| AvailableFile {
            user_label: name.clone(),
            session_filename: name.clone(),
            is_public: false,
        }));

        Ok(files)
    }

    /// Remove session directories whose last modification is older than
    /// `retention`. Individual failures are reported, not fatal.
    pub fn sweep_expired(&self, retention: Duration, dry_run: bool) -> Result<SweepReport> {
        let mut report = SweepReport {
            dry_run,
            ..SweepReport::default()
        };
        let root = &self.config.uploads_root;
        if !root.is_dir() {
            tracing::debug!(root = %root.display(), "uploads root missing, nothing to sweep");
            return Ok(report);
        }

        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(session = %name, error = %e, "cannot read session mtime");
                    report.failed.push(name);
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            if dry_run {
                tracing::info!(session = %name, "would remove expired session");
                report.removed.push(name);
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    tracing::info!(session = %name, "removed expired session");
                    report.removed.push(name);
                }
                Err(e) => {
                    tracing::warn!(session = %name, error = %e, "failed to remove expired session");
                    report.failed.push(name);
                }
            }
        }

        report.removed.sort();
        report.failed.sort();
        Ok(report)
    }
}

fn sanitized_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir, shared: &[&str]) -> SessionStore {
        let config = Config::new(dir.path().join("files"), dir.path().join("uploads"))
            .with_shared_files(shared.iter().copied());
        fs::create_dir_all(&config.files_root).unwrap();
        SessionStore::new(Arc::new(config))
    }

    #[rstest]
    #[case("abc123", true)]
    #[case("a-b_C9", true)]
    #[case("", false)]
    #[case("..", false)]
    #[case("a/b", false)]
    #[case("a b", false)]
    #[case("/etc", false)]
    fn test_validate_session_id(#[case] id: &str, #[case] ok: bool) {
        assert_eq!(validate_session_id(id).is_ok(), ok);
    }

    #[rstest]
    #[case("report.PDF", ".pdf")]
    #[case("photo.jpeg", ".jpeg")]
    #[case("noext", "")]
    #[case("weird.p$f", "")]
    #[case("archive.tar.gz", ".gz")]
    fn test_sanitized_extension(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitized_extension(name), expected);
    }

    #[test]
    fn test_session_dir_created_lazily() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &[]);
        let expected = tmp.path().join("uploads").join("s1");
        assert!(!expected.exists());

        let dir = sessions.session_dir("s1").unwrap();
        assert_eq!(dir, expected);
        assert!(dir.is_dir());
        assert!(sessions.session_dir("../s1").is_err());
    }

    #[test]
    fn test_store_upload_uses_random_name() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &[]);

        let first = sessions
            .store_upload("s1", "../../My Report.PDF", b"%PDF-1.4")
            .unwrap();
        let second = sessions
            .store_upload("s1", "My Report.PDF", b"%PDF-1.4")
            .unwrap();

        assert_eq!(first.user_label, "My Report.PDF");
        assert!(!first.is_public);
        assert!(first.session_filename.ends_with(".pdf"));
        assert_eq!(first.session_filename.len(), 32 + 4);
        assert_ne!(first.session_filename, second.session_filename);
        assert!(tmp
            .path()
            .join("uploads/s1")
            .join(&first.session_filename)
            .is_file());
    }

    #[test]
    fn test_store_upload_rejects_oversized() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &[]);
        let data = vec![0u8; MAX_INPUT_BYTES as usize + 1];
        let result = sessions.store_upload("s1", "big.pdf", &data);
        assert!(matches!(result, Err(Error::TooLarge { .. })));
    }

    #[test]
    fn test_available_files_lists_shared_first() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &["sample.pdf", "gone.pdf", "shadowed.pdf"]);
        fs::write(tmp.path().join("files/sample.pdf"), b"%PDF").unwrap();
        fs::write(tmp.path().join("files/shadowed.pdf"), b"%PDF").unwrap();

        let dir = sessions.session_dir("s1").unwrap();
        fs::write(dir.join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.join("a.pdf"), b"%PDF").unwrap();
        fs::write(dir.join("shadowed.pdf"), b"%PDF").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();

        let names: Vec<(String, bool)> = sessions
            .available_files("s1")
            .unwrap()
            .into_iter()
            .map(|f| (f.session_filename, f.is_public))
            .collect();

        assert_eq!(
            names,
            vec![
                ("sample.pdf".to_string(), true),
                ("a.pdf".to_string(), false),
                ("b.pdf".to_string(), false),
                ("shadowed.pdf".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_sweep_respects_retention_and_dry_run() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &[]);
        sessions.session_dir("old").unwrap();
        sessions.session_dir("fresh").unwrap();
        fs::write(tmp.path().join("uploads/stray.txt"), b"x").unwrap();

        std::thread::sleep(Duration::from_millis(20));

        let report = sessions
            .sweep_expired(Duration::from_secs(3600), false)
            .unwrap();
        assert!(report.removed.is_empty());

        let report = sessions.sweep_expired(Duration::ZERO, true).unwrap();
        assert_eq!(report.removed, vec!["fresh".to_string(), "old".to_string()]);
        assert!(report.dry_run);
        assert!(tmp.path().join("uploads/old").is_dir());

        let report = sessions.sweep_expired(Duration::ZERO, false).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert!(!tmp.path().join("uploads/old").exists());
        assert!(tmp.path().join("uploads/stray.txt").exists());
    }

    #[test]
    fn test_sweep_without_uploads_root() {
        let tmp = TempDir::new().unwrap();
        let sessions = store(&tmp, &[]);
        let report = sessions.sweep_expired(Duration::ZERO, false).unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
