//! Named operations the engine can dispatch to

use crate::error::{Error, Result};
use crate::source::ArgKey;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Arguments after every filename has been resolved to a canonical path
pub type ResolvedArgs = Map<String, Value>;

/// What an operation writes, used to synthesize a default output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSpec {
    /// A single file named `<input stem>_<suffix>.<extension>`
    File {
        suffix: &'static str,
        extension: &'static str,
    },
    /// Files written into a directory
    Directory,
}

impl OutputSpec {
    pub fn key(&self) -> ArgKey {
        match self {
            OutputSpec::File { .. } => ArgKey::Output,
            OutputSpec::Directory => ArgKey::OutputDir,
        }
    }
}

/// A document operation. Receives only resolved paths and returns the path
/// of what it wrote.
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    fn output(&self) -> OutputSpec;

    fn run(&self, args: &ResolvedArgs) -> Result<String>;
}

/// Operations by name
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<&'static str, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding merge, split, add_stamp and redact
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for operation in crate::tools::builtin() {
            registry.register(operation);
        }
        registry
    }

    /// Add an operation, replacing any previous one with the same name
    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        if self
            .operations
            .insert(operation.name(), operation)
            .is_some()
        {
            tracing::warn!("replaced a registered operation");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Operation>> {
        self.operations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTool {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.operations.keys().copied().collect()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
