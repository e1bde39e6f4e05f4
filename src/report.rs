//! Report Normalizer
//!
//! Folds heterogeneous handler outputs into the one canonical report
//! shape allowed to cross the pipeline's outward boundary. Raw text is
//! parsed as JSON exactly once; anything that is not a well-formed report
//! object becomes a `NormalizationError` carrying the raw text for
//! diagnostics, never a silent coercion.
//!
//! The serialization contract is closed over JSON: every number in a
//! report is a plain finite JSON number. Non-finite floats (which
//! serde_json cannot emit) are replaced with null recursively before the
//! report reaches any serialization boundary. Tool semantics are never
//! reinterpreted; risk labels and findings pass through as produced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::supervisor::RawResult;

/// Sentinel finding for successful reports that did not state one.
pub const DEFAULT_FINDING: &str = "Analysis saved.";

/// The canonical tool output shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedReport {
    pub ok: bool,

    /// Human-readable tool name; falls back to the tool id.
    pub tool: String,

    /// Free-form severity label; absence is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,

    /// Free-form summary; defaulted for successful reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_finding: Option<String>,

    /// Tool-specific structured payload, opaque to the pipeline.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl NormalizedReport {
    /// Severity label as stored in the audit record.
    pub fn risk_level_or_na(&self) -> &str {
        self.risk_level.as_deref().unwrap_or("N/A")
    }

    /// Finding as stored in the audit record.
    pub fn main_finding_or_default(&self) -> &str {
        self.main_finding.as_deref().unwrap_or(DEFAULT_FINDING)
    }
}

/// Normalize a handler's raw output into the canonical report.
pub fn normalize(raw: RawResult, tool_id: &str) -> Result<NormalizedReport, PipelineError> {
    let value = match raw {
        RawResult::Parsed(value) => value,
        RawResult::Text(text) => serde_json::from_str(&text).map_err(|_| {
            PipelineError::Normalization { raw_output: text }
        })?,
    };

    let Value::Object(mut map) = value else {
        return Err(PipelineError::Normalization {
            raw_output: value.to_string(),
        });
    };

    // `ok` is the only required field; a report without it (or with a
    // non-boolean) violates the handler contract.
    let ok = match map.remove("ok") {
        Some(Value::Bool(ok)) => ok,
        other => {
            if let Some(v) = other {
                map.insert("ok".to_string(), v);
            }
            return Err(PipelineError::Normalization {
                raw_output: Value::Object(map).to_string(),
            });
        }
    };

    let tool = match map.remove("tool") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => tool_id.to_string(),
    };

    let risk_level = match map.remove("risk_level") {
        Some(Value::String(level)) => Some(level),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    let main_finding = match map.remove("main_finding") {
        Some(Value::String(finding)) => Some(finding),
        _ if ok => Some(DEFAULT_FINDING.to_string()),
        _ => None,
    };

    let mut details = map;
    for value in details.values_mut() {
        coerce_numbers(value);
    }

    Ok(NormalizedReport {
        ok,
        tool,
        risk_level,
        main_finding,
        details,
    })
}

/// Recursively replace any numeric value that is not a plain finite JSON
/// number with null. serde_json rejects non-finite literals at parse time
/// and cannot construct them from text, so for external handlers this is
/// a no-op; it guards values built programmatically by in-process
/// handlers so a successful analysis can never abort at serialization.
pub fn coerce_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            let finite = n.as_i64().is_some()
                || n.as_u64().is_some()
                || n.as_f64().is_some_and(f64::is_finite);
            if !finite {
                *value = Value::Null;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_numbers),
        Value::Object(map) => map.values_mut().for_each(coerce_numbers),
        _ => {}
    }
}
