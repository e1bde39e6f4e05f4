//! Pipeline Error Taxonomy
//!
//! Every failure mode in the pipeline maps into one of the variants below,
//! and every variant maps to exactly one client-visible JSON error shape.
//! There is no exception-driven control flow: each stage boundary returns
//! `Result<_, PipelineError>` and failures short-circuit by early return.
//!
//! Persistence failures are deliberately absent from this taxonomy: they
//! are logged and swallowed (see `persist`), never surfaced to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure kinds for a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The requested tool id is not in the registry.
    #[error("Unknown tool: {0}")]
    NotFound(String),

    /// The request envelope was malformed or the payload unusable.
    #[error("{0}")]
    Input(String),

    /// The interpreter or script backing an external tool is not deployed.
    #[error("Backend script or interpreter not found.")]
    ExecutableMissing,

    /// The child process exceeded its wall-clock budget and was killed.
    #[error("Tool timed out after {0}s. Try a smaller file.")]
    Timeout(u64),

    /// Non-zero exit from an external handler, or a fault inside an
    /// in-process handler.
    #[error("Tool failed: {detail}")]
    Handler {
        detail: String,
        raw_stderr: Option<String>,
    },

    /// The handler terminated cleanly but its output was not a well-formed
    /// report object.
    #[error("Backend script returned invalid JSON.")]
    Normalization { raw_output: String },
}

impl PipelineError {
    /// HTTP status for this failure class: unknown tool and bad input are
    /// the caller's fault, everything else is a server-side failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::ExecutableMissing
            | Self::Timeout(_)
            | Self::Handler { .. }
            | Self::Normalization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Raw diagnostic text attached to the error body, when any exists.
    pub fn raw_detail(&self) -> Option<&str> {
        match self {
            Self::Handler { raw_stderr, .. } => raw_stderr.as_deref(),
            Self::Normalization { raw_output } => Some(raw_output),
            _ => None,
        }
    }

    /// Short label for metrics and log fields.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Input(_) => "bad_input",
            Self::ExecutableMissing => "executable_missing",
            Self::Timeout(_) => "timed_out",
            Self::Handler { .. } => "crashed",
            Self::Normalization { .. } => "invalid_output",
        }
    }
}

/// The one client-visible error shape.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_detail: Option<String>,
}

impl ErrorBody {
    pub fn from_error(err: &PipelineError) -> Self {
        Self {
            ok: false,
            error: err.to_string(),
            raw_detail: err.raw_detail().map(str::to_string),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from_error(&self))).into_response()
    }
}
