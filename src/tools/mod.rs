//! Built-in document operations
//!
//! Each operation reads its resolved arguments, checks the non-path ones and
//! writes exactly one output.

mod merge;
mod redact;
mod split;
mod stamp;

pub use merge::Merge;
pub use redact::Redact;
pub use split::Split;
pub use stamp::AddStamp;

use crate::engine::{Operation, ResolvedArgs};
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;

pub(crate) fn builtin() -> Vec<Arc<dyn Operation>> {
    vec![
        Arc::new(Merge),
        Arc::new(Split),
        Arc::new(AddStamp),
        Arc::new(Redact),
    ]
}

fn require_str<'a>(args: &'a ResolvedArgs, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(value) => value
            .as_str()
            .ok_or_else(|| Error::invalid_argument(key, "expected a string")),
        None => Err(Error::invalid_argument(key, "missing required argument")),
    }
}

fn require_str_list<'a>(args: &'a ResolvedArgs, key: &str) -> Result<Vec<&'a str>> {
    let items = args
        .get(key)
        .ok_or_else(|| Error::invalid_argument(key, "missing required argument"))?
        .as_array()
        .ok_or_else(|| Error::invalid_argument(key, "expected a list"))?;
    if items.is_empty() {
        return Err(Error::invalid_argument(key, "list must not be empty"));
    }
    items
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| Error::invalid_argument(key, "list elements must be strings"))
        })
        .collect()
}

fn optional_str<'a>(args: &'a ResolvedArgs, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| Error::invalid_argument(key, "expected a string")),
    }
}

fn require_i64(args: &ResolvedArgs, key: &str) -> Result<i64> {
    args.get(key)
        .ok_or_else(|| Error::invalid_argument(key, "missing required argument"))?
        .as_i64()
        .ok_or_else(|| Error::invalid_argument(key, "expected an integer"))
}

fn optional_f64(args: &ResolvedArgs, key: &str) -> Result<Option<f64>> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::invalid_argument(key, "expected a number")),
    }
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

fn write_output(path: &str, data: &[u8]) -> Result<String> {
    std::fs::write(path, data)?;
    tracing::info!(output = %path, bytes = data.len(), "wrote output");
    Ok(path.to_string())
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}
