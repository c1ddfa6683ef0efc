//! Audit trace of tool invocations

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

/// One tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tool: String,
    /// Resolved arguments on success, the caller's arguments on failure
    pub args: Value,
    pub in_hash: Option<String>,
    pub out_hash: Option<String>,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn success(
        tool: &str,
        args: Value,
        in_hash: Option<String>,
        out_hash: Option<String>,
    ) -> Self {
        Self {
            tool: tool.to_string(),
            args,
            in_hash,
            out_hash,
            status: AuditStatus::Success,
            error_kind: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn failure(tool: &str, args: Value, in_hash: Option<String>, error: &Error) -> Self {
        Self {
            tool: tool.to_string(),
            args,
            in_hash,
            out_hash: None,
            status: AuditStatus::Error,
            error_kind: Some(error.kind().to_string()),
            error_message: Some(error.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Append-only sink for audit records
pub trait AuditStore: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<()>;

    /// Most recent records, oldest first
    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>>;
}

/// Keeps records in process memory
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditStore for MemoryAuditStore {
    fn record(&self, record: AuditRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(limit);
        Ok(records[skip..].to_vec())
    }
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonlAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for JsonlAuditStore {
    fn record(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = {
            let _guard = self.write_lock.lock();
            std::fs::read_to_string(&self.path)?
        };

        let records: Vec<AuditRecord> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "skipping malformed audit line");
                    None
                }
            })
            .collect();

        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}
