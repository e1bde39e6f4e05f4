//! Input Adapter
//!
//! Normalizes the three inbound payload shapes (JSON body, raw text,
//! multipart file upload) into a single immutable `ToolRequest`. The
//! adapter only guarantees the envelope is well-formed; tool-specific
//! field validation belongs to the tools themselves (several of them
//! treat an absent `mode` as "invalid mode selected" and report it as
//! part of their own result).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PipelineError;

/// Opaque reference to the authenticated caller. Its only uses are the
/// persist-or-not decision and tagging the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Text payload extracted from a JSON body: `input` and `mode` both
/// default to the empty string when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub input: String,
    pub mode: String,
}

/// A saved upload that owns its backing file. The file is deleted when
/// the value is dropped, which covers every pipeline exit path; deletion
/// failure is logged and never surfaced.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    filename: String,
}

impl TempUpload {
    /// Wrap an already-written file. `filename` is the sanitized original
    /// name, kept for audit summaries.
    pub fn new(path: PathBuf, filename: String) -> Self {
        Self { path, filename }
    }

    /// Absolute path handed to external handlers as the payload argument.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Deleted temporary upload {:?}", self.path),
            Err(e) => warn!("Failed to delete temporary upload {:?}: {}", self.path, e),
        }
    }
}

/// Exactly one variant is populated per request.
#[derive(Debug)]
pub enum Payload {
    Text(TextInput),
    File(TempUpload),
}

/// The normalized input to a single tool invocation. Constructed once by
/// the adapter, never mutated, dropped when the pipeline returns.
#[derive(Debug)]
pub struct ToolRequest {
    pub tool_id: String,
    pub payload: Payload,
    pub identity: Option<Identity>,
}

impl ToolRequest {
    /// Build a request from a JSON body. An empty body is valid; a body
    /// that is present but not a JSON object is an input error.
    pub fn from_json_body(
        tool_id: impl Into<String>,
        body: &[u8],
        identity: Option<Identity>,
    ) -> Result<Self, PipelineError> {
        let text = if body.is_empty() {
            TextInput::default()
        } else {
            let value: Value = serde_json::from_slice(body).map_err(|_| {
                PipelineError::Input("Request body must be a JSON object.".to_string())
            })?;
            let obj = value.as_object().ok_or_else(|| {
                PipelineError::Input("Request body must be a JSON object.".to_string())
            })?;
            TextInput {
                input: string_field(obj.get("input")),
                mode: string_field(obj.get("mode")),
            }
        };

        Ok(Self {
            tool_id: tool_id.into(),
            payload: Payload::Text(text),
            identity,
        })
    }

    /// Build a request from raw text (CLI one-shot invocations).
    pub fn from_text(
        tool_id: impl Into<String>,
        input: impl Into<String>,
        mode: impl Into<String>,
        identity: Option<Identity>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            payload: Payload::Text(TextInput {
                input: input.into(),
                mode: mode.into(),
            }),
            identity,
        }
    }

    /// Build a request around a saved upload.
    pub fn from_upload(
        tool_id: impl Into<String>,
        upload: TempUpload,
        identity: Option<Identity>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            payload: Payload::File(upload),
            identity,
        }
    }

    /// Truncated representation of the payload for the audit record.
    /// Text payloads are capped at 100 characters; file payloads use the
    /// sanitized filename rather than content.
    pub fn input_summary(&self) -> String {
        match &self.payload {
            Payload::Text(text) if text.input.is_empty() => "N/A".to_string(),
            Payload::Text(text) => text.input.chars().take(100).collect(),
            Payload::File(upload) => format!("File: {}", upload.filename()),
        }
    }
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Reduce an untrusted filename to a safe basename: anything up to the
/// last path separator is discarded, traversal dots are collapsed, and
/// only a conservative character set survives.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let mut cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    cleaned.trim_matches('.').to_string()
}

/// Check the extension against the allow-list, case-insensitively.
pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            allowed_extensions.iter().any(|a| *a == ext)
        }
        _ => false,
    }
}

/// Persist an uploaded file under a unique name in the staging directory.
///
/// Returns the owning `TempUpload`; the caller gets cleanup for free when
/// the request is dropped. Rejects empty or non-allow-listed filenames
/// and treats any filesystem failure as an `InputError`.
pub fn save_upload(
    upload_dir: &Path,
    original_filename: &str,
    data: &[u8],
    allowed_extensions: &[String],
) -> Result<TempUpload, PipelineError> {
    if original_filename.is_empty() {
        return Err(PipelineError::Input(
            "No file selected for uploading.".to_string(),
        ));
    }

    let filename = sanitize_filename(original_filename);
    if filename.is_empty() {
        return Err(PipelineError::Input(
            "Uploaded filename is not usable.".to_string(),
        ));
    }

    if !allowed_file(&filename, allowed_extensions) {
        return Err(PipelineError::Input("File type not allowed.".to_string()));
    }

    std::fs::create_dir_all(upload_dir)
        .map_err(|e| PipelineError::Input(format!("Failed to save file: {e}")))?;

    // Unique on-disk name so concurrent requests never observe each
    // other's uploads.
    let disk_name = format!("{}_{}", Uuid::new_v4(), filename);
    let path = upload_dir.join(disk_name);

    std::fs::write(&path, data)
        .map_err(|e| PipelineError::Input(format!("Failed to save file: {e}")))?;

    Ok(TempUpload::new(path, filename))
}
