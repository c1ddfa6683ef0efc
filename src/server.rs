//! MCP front end using rmcp
//!
//! Each server instance serves one session: uploads land in that session's
//! directory and every tool call resolves names in session mode. Calls are
//! serialized per session so default output names cannot race.

use crate::engine::Engine;
use crate::error::Error;
use crate::source::{sniff_content_type, validate_session_id, AvailableFile};
use anyhow::Result;
use base64::Engine as _;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// Tool parameters
// ============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MergePdfsParams {
    /// Filenames to merge, in order
    pub files: Vec<String>,
    /// Output filename (default: `<first file>_merged.pdf`)
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SplitPdfParams {
    /// Filename to split
    pub file: String,
    /// Page selection, e.g. "1-4,!3". `-1` is the last page; `!` excludes.
    pub pages: String,
    /// Output directory; in a session only "." (the session itself) is allowed
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddStampParams {
    /// Filename to stamp
    pub file: String,
    /// PNG or JPEG image to place on the page
    pub stamp_path: String,
    /// 1-indexed page, negative counts from the end, 0 stamps every page
    pub page: i64,
    /// Corner: "tl", "tr", "bl" or "br" (default: "br")
    #[serde(default)]
    pub pos: Option<String>,
    /// Size multiplier for the 150x75 pt stamp (default: 1.0)
    #[serde(default)]
    pub scale: Option<f64>,
    /// Output filename (default: `<file>_stamped.pdf`)
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RedactPdfParams {
    /// Filename to redact
    pub file: String,
    /// Regular expressions, matched case-insensitively
    pub patterns: Vec<String>,
    /// Output markdown filename (default: `<file>_redacted.md`)
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UploadFileParams {
    /// Original filename, shown back as the label
    pub name: String,
    /// Base64 encoded file content
    pub base64: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DownloadFileParams {
    /// session_filename from list_files, upload_file or a tool result
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    /// Glob pattern matched against labels and filenames (e.g. "*.pdf")
    #[serde(default)]
    pub pattern: Option<String>,
}

// ============================================================================
// Tool results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ToolRunResult {
    pub tool: String,
    /// Output filename (bare name when inside the session)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListFilesResult {
    pub files: Vec<AvailableFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// File content handed back to the client
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    /// Base64 encoded content
    pub base64: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DownloadFileResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<DownloadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UploadFileResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<AvailableFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Server
// ============================================================================

#[derive(Clone)]
pub struct PdfShellServer {
    engine: Arc<Engine>,
    session_id: String,
    session_lock: Arc<Mutex<()>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PdfShellServer {
    /// Server bound to `session_id`, or to a fresh random session
    pub fn new(engine: Arc<Engine>, session_id: Option<String>) -> crate::Result<Self> {
        let session_id =
            session_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        validate_session_id(&session_id)?;
        engine.sessions().session_dir(&session_id)?;
        tracing::info!(session = %session_id, "session opened");

        Ok(Self {
            engine,
            session_id,
            session_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        })
    }

    /// Merge PDFs into one
    #[tool(
        description = "Merge PDF files into a single PDF, in the order given. Filenames are the session_filename values from list_files or upload_file. Returns the output filename."
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self.call("merge", &params).await;
        render(&result)
    }

    /// Extract selected pages
    #[tool(
        description = "Extract pages from a PDF into <name>_split.pdf.

Page selection syntax:
- \"3\" : a single page
- \"1-4\" : a range
- \"-1\" : the last page (\"2--1\" is page 2 to the end)
- \"!3\" : exclude page 3; exclusions alone start from all pages
- Combine with commas: \"1-4,!3\" selects 1, 2 and 4"
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SplitPdfParams>) -> String {
        let result = self.call("split", &params).await;
        render(&result)
    }

    /// Stamp an image onto a PDF
    #[tool(
        description = "Place a PNG or JPEG stamp in a page corner (tl, tr, bl, br). page 0 stamps every page, -1 the last page. The stamp is 150x75 pt times scale, 20 pt from the edges."
    )]
    async fn add_stamp(&self, Parameters(params): Parameters<AddStampParams>) -> String {
        let result = self.call("add_stamp", &params).await;
        render(&result)
    }

    /// Redact text into markdown
    #[tool(
        description = "Extract the text of a PDF as markdown (one '## Page N' section per page) with every case-insensitive match of the given regular expressions replaced by [REDACTED]."
    )]
    async fn redact_pdf(&self, Parameters(params): Parameters<RedactPdfParams>) -> String {
        let result = self.call("redact", &params).await;
        render(&result)
    }

    /// Upload a file into the session
    #[tool(
        description = "Upload a file (base64) into this session. Returns the session_filename to use in other tools."
    )]
    async fn upload_file(&self, Parameters(params): Parameters<UploadFileParams>) -> String {
        let result = match self.process_upload(&params) {
            Ok(file) => UploadFileResult {
                file: Some(file),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "upload_file failed");
                UploadFileResult {
                    file: None,
                    error: Some(e.client_message()),
                }
            }
        };
        render(&result)
    }

    /// Read a file back from the session
    #[tool(
        description = "Download a session file or a shared file as base64. Use the session_filename returned by list_files, upload_file or any other tool."
    )]
    async fn download_file(&self, Parameters(params): Parameters<DownloadFileParams>) -> String {
        let result = match self.process_download(&params) {
            Ok(file) => DownloadFileResult {
                file: Some(file),
                error: None,
            },
            Err(e) => {
                tracing::warn!(name = %params.name, error = %e, "download_file failed");
                DownloadFileResult {
                    file: None,
                    error: Some(e.client_message()),
                }
            }
        };
        render(&result)
    }

    /// List files visible to the session
    #[tool(
        description = "List files this session can use: shared files first, then the session's own uploads and outputs."
    )]
    async fn list_files(&self, Parameters(params): Parameters<ListFilesParams>) -> String {
        let result = match self.process_list_files(&params) {
            Ok(files) => ListFilesResult { files, error: None },
            Err(e) => {
                tracing::warn!(error = %e, "list_files failed");
                ListFilesResult {
                    files: Vec::new(),
                    error: Some(e.client_message()),
                }
            }
        };
        render(&result)
    }
}

impl PdfShellServer {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run an engine tool in this session. Errors reach the client only as
    /// their sanitized message.
    pub async fn call<P: Serialize>(&self, tool_name: &str, params: &P) -> ToolRunResult {
        let outcome = match to_args(params) {
            Ok(args) => self.run_tool(tool_name, args).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(output) => ToolRunResult {
                tool: tool_name.to_string(),
                output: Some(output),
                error: None,
            },
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool call failed");
                ToolRunResult {
                    tool: tool_name.to_string(),
                    output: None,
                    error: Some(e.client_message()),
                }
            }
        }
    }

    async fn run_tool(&self, tool_name: &str, args: Map<String, Value>) -> crate::Result<String> {
        let _guard = self.session_lock.lock().await;

        let engine = Arc::clone(&self.engine);
        let session_id = self.session_id.clone();
        let tool_name = tool_name.to_string();

        tokio::task::spawn_blocking(move || engine.run_tool(&tool_name, &args, Some(&session_id)))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("Task join error: {}", e))))?
    }

    pub fn process_upload(&self, params: &UploadFileParams) -> crate::Result<AvailableFile> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(params.base64.trim())
            .map_err(|e| Error::invalid_argument("base64", e.to_string()))?;
        self.engine
            .sessions()
            .store_upload(&self.session_id, &params.name, &data)
    }

    /// Read a file through the same resolver the tools use, so only this
    /// session's files and the shared allow-list are reachable.
    pub fn process_download(&self, params: &DownloadFileParams) -> crate::Result<DownloadedFile> {
        let resolved = self
            .engine
            .resolver()
            .resolve_download(&params.name, Some(&self.session_id))?;
        let data = std::fs::read(&resolved.path)?;
        let mime_type = sniff_content_type(&resolved.path)?
            .map(|t| t.mime())
            .unwrap_or("application/octet-stream");

        tracing::info!(session = %self.session_id, name = %params.name, bytes = data.len(), "file downloaded");
        Ok(DownloadedFile {
            name: params.name.clone(),
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
            base64: base64::engine::general_purpose::STANDARD.encode(&data),
        })
    }

    pub fn process_list_files(&self, params: &ListFilesParams) -> crate::Result<Vec<AvailableFile>> {
        let files = self.engine.sessions().available_files(&self.session_id)?;

        let Some(pattern) = params.pattern.as_deref() else {
            return Ok(files);
        };
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| Error::invalid_argument("pattern", e.to_string()))?;

        Ok(files
            .into_iter()
            .filter(|f| pattern.matches(&f.user_label) || pattern.matches(&f.session_filename))
            .collect())
    }
}

/// Serialize tool parameters into engine arguments, dropping unset options.
fn to_args<P: Serialize>(params: &P) -> crate::Result<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        _ => Err(Error::invalid_argument("params", "expected an object")),
    }
}

fn render<T: Serialize>(result: &T) -> String {
    let response = serde_json::json!({ "results": [result] });
    serde_json::to_string_pretty(&response).unwrap_or_default()
}

#[tool_handler]
impl ServerHandler for PdfShellServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "pdfshell merges, splits, stamps and redacts PDFs. Upload files with upload_file \
                 or pick shared ones from list_files, then pass their session_filename to the \
                 other tools. Fetch results with download_file."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server over stdio for one session
pub async fn run_server(engine: Arc<Engine>, session_id: Option<String>) -> Result<()> {
    let server = PdfShellServer::new(engine, session_id)?;

    tracing::info!(session = %server.session_id(), "pdfshell MCP server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
