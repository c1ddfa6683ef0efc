//! Integration tests for the tool invocation engine

mod common;

use common::{args, sample_pdf, Sandbox, PNG_STUB};
use parking_lot::Mutex;
use pdfshell::engine::{
    AuditRecord, AuditStatus, AuditStore, Operation, OperationRegistry, OutputSpec, ResolvedArgs,
};
use pdfshell::pdf::QpdfWrapper;
use pdfshell::source::{hash_file, ArgKey};
use pdfshell::{Engine, Error, MemoryAuditStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn engine(sandbox: &Sandbox, shared: &[&str]) -> (Engine, Arc<MemoryAuditStore>) {
    let audit = Arc::new(MemoryAuditStore::new());
    let engine = Engine::new(sandbox.config(shared), audit.clone());
    (engine, audit)
}

fn page_count(path: &Path) -> u32 {
    QpdfWrapper::page_count(&std::fs::read(path).unwrap()).unwrap()
}

// ============================================================================
// Built-in operations
// ============================================================================

#[test]
fn test_merge_in_session_synthesizes_output() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    let a = sandbox.put(&dir, "a.pdf", &sample_pdf(2));
    sandbox.put(&dir, "b.pdf", &sample_pdf(3));
    let (engine, audit) = engine(&sandbox, &[]);

    let output = engine
        .run_tool("merge", &args(json!({"files": ["a.pdf", "b.pdf"]})), Some("s1"))
        .unwrap();

    assert_eq!(output, "a_merged.pdf");
    let merged = dir.join("a_merged.pdf");
    assert_eq!(page_count(&merged), 5);

    let records = audit.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, AuditStatus::Success);
    assert_eq!(record.tool, "merge");
    assert_eq!(record.in_hash.as_deref(), Some(hash_file(&a).unwrap().as_str()));
    assert_eq!(record.out_hash.as_deref(), Some(hash_file(&merged).unwrap().as_str()));
    assert_eq!(record.args["output"], json!(merged.to_string_lossy()));
    assert_eq!(
        record.args["files"],
        json!([a.to_string_lossy(), dir.join("b.pdf").to_string_lossy()])
    );
}

#[test]
fn test_merge_cli_mode_returns_full_path() {
    let sandbox = Sandbox::new();
    sandbox.put(&sandbox.files, "a.pdf", &sample_pdf(1));
    let (engine, _) = engine(&sandbox, &[]);

    let output = engine
        .run_tool(
            "merge",
            &args(json!({"files": ["a.pdf", "a.pdf"], "output": "out/combined.pdf"})),
            None,
        )
        .unwrap();

    let expected = sandbox.files.join("out/combined.pdf");
    assert_eq!(output, expected.to_string_lossy());
    assert_eq!(page_count(&expected), 2);
}

#[test]
fn test_shared_input_output_stays_in_session() {
    let sandbox = Sandbox::new();
    sandbox.put(&sandbox.files, "sample.pdf", &sample_pdf(2));
    let (engine, _) = engine(&sandbox, &["sample.pdf"]);

    let output = engine
        .run_tool("merge", &args(json!({"files": ["sample.pdf"]})), Some("s2"))
        .unwrap();

    assert_eq!(output, "sample_merged.pdf");
    assert!(sandbox.uploads.join("s2/sample_merged.pdf").is_file());
    assert!(!sandbox.files.join("sample_merged.pdf").exists());
}

#[test]
fn test_split_selection() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(5));
    let (engine, _) = engine(&sandbox, &[]);

    let output = engine
        .run_tool("split", &args(json!({"file": "doc.pdf", "pages": "1-4,!3"})), Some("s1"))
        .unwrap();
    assert_eq!(output, "doc_split.pdf");
    assert_eq!(page_count(&dir.join("doc_split.pdf")), 3);

    let output = engine
        .run_tool(
            "split",
            &args(json!({"file": "doc.pdf", "pages": "-1", "output_dir": "."})),
            Some("s1"),
        )
        .unwrap();
    assert_eq!(output, "doc_split.pdf");
    assert_eq!(page_count(&dir.join("doc_split.pdf")), 1);
}

#[test]
fn test_session_output_dir_must_be_session_dir() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(5));
    let (engine, audit) = engine(&sandbox, &[]);

    let err = engine
        .run_tool(
            "split",
            &args(json!({"file": "doc.pdf", "pages": "-1", "output_dir": "parts"})),
            Some("s1"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(!dir.join("parts").exists());
    assert_eq!(audit.records()[0].status, AuditStatus::Error);
}

#[test]
fn test_returned_session_handle_names_the_written_file() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(5));
    let (engine, audit) = engine(&sandbox, &[]);

    let first = engine
        .run_tool("split", &args(json!({"file": "doc.pdf", "pages": "2-3"})), Some("s1"))
        .unwrap();
    let second = engine
        .run_tool("split", &args(json!({"file": first, "pages": "-1"})), Some("s1"))
        .unwrap();

    let records = audit.records();
    for (handle, record) in [(&first, &records[0]), (&second, &records[1])] {
        let resolved = engine
            .resolver()
            .resolve_name(handle, Some("s1"), ArgKey::File)
            .unwrap();
        assert_eq!(
            Some(hash_file(&resolved.path).unwrap()),
            record.out_hash,
            "{handle}"
        );
    }
    assert_eq!(records[1].in_hash, records[0].out_hash);
    assert_eq!(page_count(&dir.join(&second)), 1);
}

#[test]
fn test_list_under_output_is_rejected_before_any_write() {
    let sandbox = Sandbox::new();
    sandbox.put(&sandbox.files, "a.pdf", &sample_pdf(1));
    let (engine, _) = engine(&sandbox, &[]);

    let err = engine
        .run_tool(
            "merge",
            &args(json!({"files": ["a.pdf"], "output": ["x/one.pdf", "y/two.pdf"]})),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(!sandbox.files.join("x").exists());
    assert!(!sandbox.files.join("y").exists());
}

#[test]
fn test_split_empty_selection_is_audited_once() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    let doc = sandbox.put(&dir, "doc.pdf", &sample_pdf(5));
    let (engine, audit) = engine(&sandbox, &[]);

    let original = args(json!({"file": "doc.pdf", "pages": "!1-5"}));
    let err = engine.run_tool("split", &original, Some("s1")).unwrap_err();
    assert!(matches!(err, Error::EmptySelection { .. }));

    let records = audit.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, AuditStatus::Error);
    assert_eq!(record.error_kind.as_deref(), Some("empty_selection"));
    assert_eq!(record.args, Value::Object(original));
    assert_eq!(record.in_hash.as_deref(), Some(hash_file(&doc).unwrap().as_str()));
    assert!(record.out_hash.is_none());
    assert!(!dir.join("doc_split.pdf").exists());
}

#[test]
fn test_stamp_bad_scale_rejected_before_processing() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    sandbox.put(&dir, "logo.png", PNG_STUB);
    let (engine, audit) = engine(&sandbox, &[]);

    let err = engine
        .run_tool(
            "add_stamp",
            &args(json!({"file": "doc.pdf", "stamp_path": "logo.png", "page": 1, "scale": 0})),
            Some("s1"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { ref key, .. } if key == "scale"));
    assert_eq!(audit.records()[0].error_kind.as_deref(), Some("invalid_argument"));
    assert!(!dir.join("doc_stamped.pdf").exists());
}

#[test]
fn test_stamp_requires_image() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    let (engine, _) = engine(&sandbox, &[]);

    let err = engine
        .run_tool(
            "add_stamp",
            &args(json!({"file": "doc.pdf", "stamp_path": "doc.pdf", "page": 1})),
            Some("s1"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { .. }));
}

#[test]
fn test_redact_bad_pattern() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    let (engine, audit) = engine(&sandbox, &[]);

    let err = engine
        .run_tool("redact", &args(json!({"file": "doc.pdf", "patterns": ["(open"]})), Some("s1"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPattern(_)));
    assert_eq!(audit.records()[0].error_kind.as_deref(), Some("invalid_pattern"));
}

// ============================================================================
// Resolution failures
// ============================================================================

#[test]
fn test_traversal_is_audited_with_caller_args() {
    let sandbox = Sandbox::new();
    sandbox.session_dir("s1");
    let (engine, audit) = engine(&sandbox, &[]);

    let original = args(json!({"files": ["../s2/x.pdf"], "output": "out.pdf"}));
    let err = engine.run_tool("merge", &original, Some("s1")).unwrap_err();
    assert!(matches!(err, Error::AccessDenied { .. }));

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].args, Value::Object(original));
    assert!(records[0].in_hash.is_none());
}

#[test]
fn test_sessions_are_isolated() {
    let sandbox = Sandbox::new();
    let s1 = sandbox.session_dir("s1");
    sandbox.put(&s1, "mine.pdf", &sample_pdf(1));
    let (engine, _) = engine(&sandbox, &[]);

    let err = engine
        .run_tool("merge", &args(json!({"files": ["mine.pdf"]})), Some("s2"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.client_message(), "File not available: mine.pdf");
}

#[test]
fn test_oversized_input() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    let big = sandbox.put(&dir, "big.pdf", b"%PDF-1.4\n");
    std::fs::File::options()
        .write(true)
        .open(&big)
        .unwrap()
        .set_len(pdfshell::source::MAX_INPUT_BYTES + 1)
        .unwrap();
    let (engine, audit) = engine(&sandbox, &[]);

    let err = engine
        .run_tool("split", &args(json!({"file": "big.pdf", "pages": "1"})), Some("s1"))
        .unwrap_err();
    assert!(matches!(err, Error::TooLarge { .. }));
    assert_eq!(audit.records()[0].error_kind.as_deref(), Some("too_large"));
}

#[test]
fn test_unknown_tool_is_audited() {
    let sandbox = Sandbox::new();
    let (engine, audit) = engine(&sandbox, &[]);

    let err = engine
        .run_tool("rotate", &args(json!({"file": "a.pdf"})), Some("s1"))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool { .. }));
    assert_eq!(audit.records()[0].error_kind.as_deref(), Some("unknown_tool"));
}

// ============================================================================
// Engine contract with custom operations
// ============================================================================

struct Recording {
    name: &'static str,
    spec: OutputSpec,
    seen: Arc<Mutex<Vec<ResolvedArgs>>>,
}

impl Operation for Recording {
    fn name(&self) -> &'static str {
        self.name
    }

    fn output(&self) -> OutputSpec {
        self.spec
    }

    fn run(&self, args: &ResolvedArgs) -> pdfshell::Result<String> {
        self.seen.lock().push(args.clone());
        match self.spec {
            OutputSpec::File { .. } => {
                let output = args["output"].as_str().unwrap_or_default().to_string();
                std::fs::write(&output, b"done")?;
                Ok(output)
            }
            OutputSpec::Directory => Ok(args["output_dir"].as_str().unwrap_or_default().to_string()),
        }
    }
}

fn recording_engine(
    sandbox: &Sandbox,
    spec: OutputSpec,
    audit: Arc<dyn AuditStore>,
) -> (Engine, Arc<Mutex<Vec<ResolvedArgs>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = OperationRegistry::new();
    registry.register(Arc::new(Recording {
        name: "record",
        spec,
        seen: seen.clone(),
    }));
    (
        Engine::with_registry(sandbox.config(&[]), registry, audit),
        seen,
    )
}

#[test]
fn test_operation_sees_only_resolved_paths() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    sandbox.put(&dir, "logo.png", PNG_STUB);
    let (engine, seen) = recording_engine(
        &sandbox,
        OutputSpec::File {
            suffix: "done",
            extension: "txt",
        },
        Arc::new(MemoryAuditStore::new()),
    );

    let original = args(json!({"file": "doc.pdf", "stamp_path": "logo.png", "page": 2}));
    let output = engine.run_tool("record", &original, Some("s1")).unwrap();
    assert_eq!(output, "doc_done.txt");
    assert_eq!(original["file"], json!("doc.pdf"));

    let seen = seen.lock();
    let received = &seen[0];
    for key in ["file", "stamp_path", "output"] {
        let path = Path::new(received[key].as_str().unwrap());
        assert!(path.is_absolute(), "{key} not absolute");
        assert!(path.starts_with(&dir), "{key} outside session");
    }
    assert_eq!(received["page"], json!(2));
}

#[test]
fn test_directory_output_defaults_to_session_dir() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    let (engine, seen) = recording_engine(
        &sandbox,
        OutputSpec::Directory,
        Arc::new(MemoryAuditStore::new()),
    );

    let output = engine
        .run_tool("record", &args(json!({"file": "doc.pdf"})), None)
        .unwrap_err();
    assert!(matches!(output, Error::NotFound { .. }));

    engine
        .run_tool("record", &args(json!({"file": "doc.pdf"})), Some("s1"))
        .unwrap();
    assert_eq!(seen.lock()[0]["output_dir"], json!(dir.to_string_lossy()));
}

struct BrokenAudit;

impl AuditStore for BrokenAudit {
    fn record(&self, _record: AuditRecord) -> pdfshell::Result<()> {
        Err(Error::Io(std::io::Error::other("disk full")))
    }

    fn recent(&self, _limit: usize) -> pdfshell::Result<Vec<AuditRecord>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_audit_failure_does_not_mask_result() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(1));
    let (engine, _) = recording_engine(
        &sandbox,
        OutputSpec::File {
            suffix: "done",
            extension: "txt",
        },
        Arc::new(BrokenAudit),
    );

    let output = engine.run_tool("record", &args(json!({"file": "doc.pdf"})), Some("s1"));
    assert_eq!(output.unwrap(), "doc_done.txt");

    let err = engine
        .run_tool("record", &args(json!({"file": "../doc.pdf"})), Some("s1"))
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied { .. }));
}

#[test]
fn test_jsonl_audit_log_from_config() {
    let sandbox = Sandbox::new();
    let dir = sandbox.session_dir("s1");
    sandbox.put(&dir, "doc.pdf", &sample_pdf(2));
    let log = sandbox.files.join("logs/audit.jsonl");
    let engine = Engine::from_config(sandbox.config(&[]).with_audit_log(&log));

    engine
        .run_tool("split", &args(json!({"file": "doc.pdf", "pages": "2"})), Some("s1"))
        .unwrap();
    engine
        .run_tool("split", &args(json!({"file": "doc.pdf", "pages": "9"})), Some("s1"))
        .unwrap_err();

    let records = engine.audit().recent(10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, AuditStatus::Success);
    assert_eq!(records[1].error_kind.as_deref(), Some("empty_selection"));
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 2);
}
