//! Tool invocation engine
//!
//! `run_tool` is the single entry point both front ends use: it resolves every
//! filename argument, fills in a default output, hashes the primary input,
//! dispatches to the named operation and records exactly one audit record.

pub mod audit;
pub mod registry;

pub use audit::{AuditRecord, AuditStatus, AuditStore, JsonlAuditStore, MemoryAuditStore};
pub use registry::{Operation, OperationRegistry, OutputSpec, ResolvedArgs};

use crate::config::Config;
use crate::error::Result;
use crate::source::{hash_file, ArgKey, PathResolver, SessionStore};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Resolves, dispatches and audits tool invocations
pub struct Engine {
    config: Arc<Config>,
    resolver: PathResolver,
    registry: OperationRegistry,
    audit: Arc<dyn AuditStore>,
}

impl Engine {
    /// Engine with the built-in operations
    pub fn new(config: Config, audit: Arc<dyn AuditStore>) -> Self {
        Self::with_registry(config, OperationRegistry::with_builtin(), audit)
    }

    pub fn with_registry(
        config: Config,
        registry: OperationRegistry,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: PathResolver::new(Arc::clone(&config)),
            config,
            registry,
            audit,
        }
    }

    /// Engine whose audit store follows `config.audit_log`
    pub fn from_config(config: Config) -> Self {
        let audit: Arc<dyn AuditStore> = match &config.audit_log {
            Some(path) => Arc::new(JsonlAuditStore::new(path)),
            None => Arc::new(MemoryAuditStore::new()),
        };
        Self::new(config, audit)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn sessions(&self) -> &SessionStore {
        self.resolver.sessions()
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<dyn AuditStore> {
        &self.audit
    }

    /// Run `tool_name` with `args`. `session_id` selects session mode; `None`
    /// resolves names relative to the files root.
    ///
    /// The caller's map is never modified. In session mode an output inside
    /// the session directory is returned as a bare filename.
    pub fn run_tool(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        session_id: Option<&str>,
    ) -> Result<String> {
        let mut resolved = args.clone();
        let mut in_hash = None;

        match self.invoke(tool_name, &mut resolved, session_id, &mut in_hash) {
            Ok(output) => {
                let out_hash = hash_output(&output);
                tracing::info!(tool = %tool_name, session = ?session_id, output = %output, "tool completed");
                self.trace(AuditRecord::success(
                    tool_name,
                    Value::Object(resolved),
                    in_hash,
                    out_hash,
                ));
                Ok(self.present_output(output, session_id))
            }
            Err(e) => {
                tracing::error!(tool = %tool_name, session = ?session_id, kind = e.kind(), error = %e, "tool failed");
                self.trace(AuditRecord::failure(
                    tool_name,
                    Value::Object(args.clone()),
                    in_hash,
                    &e,
                ));
                Err(e)
            }
        }
    }

    fn invoke(
        &self,
        tool_name: &str,
        args: &mut Map<String, Value>,
        session_id: Option<&str>,
        in_hash: &mut Option<String>,
    ) -> Result<String> {
        let operation = self.registry.get(tool_name)?;

        let mut primary: Option<String> = None;
        for key in ArgKey::INPUTS {
            let Some(value) = args.get(key.as_str()) else {
                continue;
            };
            let value = self.resolver.process_path_arg(value, session_id, key)?;
            if primary.is_none() {
                primary = first_path(&value);
            }
            args.insert(key.as_str().to_string(), value);
        }

        let output_spec = operation.output();
        for key in ArgKey::OUTPUTS {
            let value = match args.get(key.as_str()) {
                Some(value) if !value.is_null() => {
                    self.resolver.process_path_arg(value, session_id, key)?
                }
                _ if output_spec.key() == key => {
                    self.default_output(output_spec, tool_name, primary.as_deref(), session_id)?
                }
                _ => continue,
            };
            args.insert(key.as_str().to_string(), value);
        }

        if let Some(path) = &primary {
            *in_hash = Some(hash_file(Path::new(path))?);
        }

        tracing::debug!(tool = %tool_name, args = %serde_json::Value::Object(args.clone()), "dispatching");
        operation.run(args)
    }

    /// `<stem>_<suffix>.<ext>` for file outputs, the output root for
    /// directory outputs.
    fn default_output(
        &self,
        spec: OutputSpec,
        tool_name: &str,
        primary: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Value> {
        let name = match spec {
            OutputSpec::File { suffix, extension } => {
                let stem = primary
                    .and_then(|p| Path::new(p).file_stem())
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| tool_name.to_string());
                format!("{}_{}.{}", stem, suffix, extension)
            }
            OutputSpec::Directory => ".".to_string(),
        };
        tracing::debug!(tool = %tool_name, default = %name, "synthesized output");
        self.resolver
            .process_path_arg(&Value::String(name), session_id, spec.key())
    }

    fn present_output(&self, output: String, session_id: Option<&str>) -> String {
        let Some(id) = session_id else {
            return output;
        };
        let root = match self
            .resolver
            .output_root(Some(id))
            .and_then(|root| Ok(std::fs::canonicalize(root)?))
        {
            Ok(root) => root,
            Err(_) => return output,
        };

        let is_root = match Path::new(&output).strip_prefix(&root) {
            Ok(rest) => rest.as_os_str().is_empty(),
            Err(_) => return output,
        };
        if is_root {
            return ".".to_string();
        }
        let name = Path::new(&output)
            .file_name()
            .map(|name| name.to_string_lossy().to_string());
        name.unwrap_or(output)
    }

    fn trace(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(record) {
            tracing::error!(error = %e, "failed to persist audit record");
        }
    }
}

fn first_path(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

fn hash_output(output: &str) -> Option<String> {
    let path = Path::new(output);
    if !path.is_file() {
        return None;
    }
    match hash_file(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            tracing::warn!(output = %output, error = %e, "could not hash output");
            None
        }
    }
}
