//! Bounded handler execution.
//!
//! One dispatch point over the two handler kinds. External handlers run
//! as supervised child processes: spawned in the descriptor's working
//! directory with the payload as the final argv entry, stdout/stderr
//! captured in full (truncated at a size ceiling, never streamed), a hard
//! wall-clock timeout, and a guaranteed kill on expiry via
//! `kill_on_drop`: dropping the wait future reaps the child, so no
//! process outlives a timed-out invocation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::registry::{ExternalHandler, HandlerDescriptor, InternalHandler};
use crate::request::{Payload, ToolRequest};
use crate::supervisor::validator::CommandValidator;

/// Default ceiling on captured output (1MB)
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// What a handler produced before normalization: a parsed mapping from an
/// in-process handler, or the raw standard output of a child process.
#[derive(Debug)]
pub enum RawResult {
    Parsed(serde_json::Value),
    Text(String),
}

/// Supervises handler execution under one contract for both kinds.
#[derive(Debug, Clone)]
pub struct ExecutionSupervisor {
    validator: CommandValidator,
    max_output_bytes: usize,
}

impl Default for ExecutionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSupervisor {
    pub fn new() -> Self {
        Self {
            validator: CommandValidator::default(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_validator(validator: CommandValidator) -> Self {
        Self {
            validator,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Run one handler to a terminal state. The registry has already
    /// resolved the descriptor; unknown tools never get here.
    pub async fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        request: &ToolRequest,
    ) -> Result<RawResult, PipelineError> {
        match descriptor {
            HandlerDescriptor::Internal(handler) => self.invoke_internal(*handler, request),
            HandlerDescriptor::External(handler) => self.invoke_external(handler, request).await,
        }
    }

    /// In-process handlers: same contract, no process boundary. A panic
    /// inside the handler becomes a `HandlerError`, never a crash of the
    /// serving process.
    fn invoke_internal(
        &self,
        handler: InternalHandler,
        request: &ToolRequest,
    ) -> Result<RawResult, PipelineError> {
        let text = match &request.payload {
            Payload::Text(text) => text,
            Payload::File(_) => {
                return Err(PipelineError::Input(
                    "This tool does not accept file uploads.".to_string(),
                ))
            }
        };

        match catch_unwind(AssertUnwindSafe(|| handler(text))) {
            Ok(value) => Ok(RawResult::Parsed(value)),
            Err(_) => {
                warn!(tool = %request.tool_id, "internal handler panicked");
                Err(PipelineError::Handler {
                    detail: "Internal handler failed unexpectedly.".to_string(),
                    raw_stderr: None,
                })
            }
        }
    }

    /// External handlers: spawn, bound, capture, classify.
    async fn invoke_external(
        &self,
        handler: &ExternalHandler,
        request: &ToolRequest,
    ) -> Result<RawResult, PipelineError> {
        self.validator
            .validate(handler)
            .map_err(|e| PipelineError::Handler {
                detail: format!("Refusing to execute tool command: {e}"),
                raw_stderr: None,
            })?;

        // File payloads travel as an absolute path, text payloads as the
        // raw string. Either way it is a single argv entry handed straight
        // to the OS; no shell ever sees it.
        let payload_arg = match &request.payload {
            Payload::Text(text) => text.input.clone(),
            Payload::File(upload) => upload
                .path()
                .canonicalize()
                .unwrap_or_else(|_| upload.path().to_path_buf())
                .display()
                .to_string(),
        };

        info!(
            tool = %request.tool_id,
            program = %handler.program,
            cwd = %handler.working_dir.display(),
            "Executing external handler"
        );

        let mut command = Command::new(&handler.program);
        command
            .args(&handler.args)
            .arg(&payload_arg)
            .current_dir(&handler.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!(program = %handler.program, "interpreter or script not deployed");
                PipelineError::ExecutableMissing
            } else {
                PipelineError::Handler {
                    detail: format!("Failed to spawn {}: {e}", handler.program),
                    raw_stderr: None,
                }
            }
        })?;

        let output = match tokio::time::timeout(handler.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PipelineError::Handler {
                    detail: format!("I/O failure while supervising child: {e}"),
                    raw_stderr: None,
                })
            }
            Err(_) => {
                // The wait future owned the child; dropping it triggers
                // kill_on_drop, so the process does not linger or zombify.
                warn!(
                    tool = %request.tool_id,
                    timeout_secs = handler.timeout.as_secs(),
                    "external handler timed out and was killed"
                );
                return Err(PipelineError::Timeout(handler.timeout.as_secs()));
            }
        };

        let duration = start.elapsed();
        let stdout = truncate_output(
            String::from_utf8_lossy(&output.stdout).into_owned(),
            self.max_output_bytes,
        );
        let stderr = truncate_output(
            String::from_utf8_lossy(&output.stderr).into_owned(),
            self.max_output_bytes,
        );

        if output.status.success() {
            debug!(
                tool = %request.tool_id,
                duration_ms = duration.as_millis() as u64,
                bytes = stdout.len(),
                "external handler completed"
            );
            return Ok(RawResult::Text(stdout.trim().to_string()));
        }

        // Non-zero exit is always a handler failure, even when stdout
        // holds plausible JSON. Prefer stderr for the detail.
        warn!(
            tool = %request.tool_id,
            exit_code = ?output.status.code(),
            "external handler exited non-zero"
        );
        let stderr_trim = stderr.trim();
        let stdout_trim = stdout.trim();
        let detail = if !stderr_trim.is_empty() {
            stderr_trim.to_string()
        } else if !stdout_trim.is_empty() {
            stdout_trim.to_string()
        } else {
            "Unknown backend error.".to_string()
        };

        Err(PipelineError::Handler {
            detail,
            raw_stderr: Some(stderr_trim.to_string()),
        })
    }
}

/// Truncate captured output to a maximum byte length on a char boundary,
/// adding an ellipsis if truncated. The result never exceeds `max_len`
/// bytes; ceilings too small to fit the ellipsis get a plain cut.
fn truncate_output(mut s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let ellipsis = max_len >= 3;
    let mut cut = if ellipsis { max_len - 3 } else { max_len };
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    if ellipsis {
        s.push_str("...");
    }
    s
}
