//! Shared helpers for integration tests
#![allow(dead_code)]

use pdfshell::Config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A blank, well-formed PDF with `pages` letter-sized pages.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>".to_string(),
        );
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

/// A PNG signature followed by filler; enough for content sniffing.
pub const PNG_STUB: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Temporary files root and uploads root
pub struct Sandbox {
    _tmp: TempDir,
    pub files: PathBuf,
    pub uploads: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let files = tmp.path().join("files");
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(&files).unwrap();
        std::fs::create_dir_all(&uploads).unwrap();
        Self {
            files: std::fs::canonicalize(files).unwrap(),
            uploads: std::fs::canonicalize(uploads).unwrap(),
            _tmp: tmp,
        }
    }

    pub fn config(&self, shared: &[&str]) -> Config {
        Config::new(&self.files, &self.uploads).with_shared_files(shared.iter().copied())
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        let dir = self.uploads.join(session_id);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn put(&self, dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }
}

pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}
