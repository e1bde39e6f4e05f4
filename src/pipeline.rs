//! Tool Execution & Reporting Pipeline
//!
//! Wires the stages together: registry lookup, supervised execution,
//! normalization, best-effort persistence. Stages run strictly
//! sequentially; each either produces a value for the next or
//! short-circuits into the error path, and control never flows backward.
//!
//! The pipeline holds no mutable state. Concurrent requests share only
//! the read-only registry and the gateway handle; the operating system's
//! process-creation capacity is the sole admission control.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::error::PipelineError;
use crate::metrics;
use crate::persist::PersistenceGateway;
use crate::registry::ToolRegistry;
use crate::report::{self, NormalizedReport};
use crate::request::ToolRequest;
use crate::supervisor::ExecutionSupervisor;

pub struct Pipeline {
    registry: ToolRegistry,
    supervisor: ExecutionSupervisor,
    gateway: Arc<dyn PersistenceGateway>,
}

impl Pipeline {
    pub fn new(
        registry: ToolRegistry,
        supervisor: ExecutionSupervisor,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            gateway,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one request to completion and record its outcome. The request
    /// is consumed: dropping it here releases the temporary upload on
    /// every exit path, success or failure.
    pub async fn run(&self, request: ToolRequest) -> Result<NormalizedReport, PipelineError> {
        let start = Instant::now();
        let result = self.execute(&request).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) => e.outcome_label(),
        };
        // Caller-supplied ids that failed to resolve must not become label
        // values: one bucket absorbs all of them, keeping the series set
        // bounded by the registry.
        let tool_label = match &result {
            Err(PipelineError::NotFound(_)) => "unknown",
            _ => request.tool_id.as_str(),
        };
        metrics::TOOL_INVOCATIONS_TOTAL
            .with_label_values(&[tool_label, outcome])
            .inc();
        metrics::TOOL_DURATION_SECONDS
            .with_label_values(&[tool_label])
            .observe(start.elapsed().as_secs_f64());

        info!(
            tool = %request.tool_id,
            outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        result
    }

    async fn execute(&self, request: &ToolRequest) -> Result<NormalizedReport, PipelineError> {
        let descriptor = self
            .registry
            .resolve(&request.tool_id)
            .ok_or_else(|| PipelineError::NotFound(request.tool_id.clone()))?;

        let raw = self.supervisor.invoke(descriptor, request).await?;
        let normalized = report::normalize(raw, &request.tool_id)?;

        // Best-effort audit write: identity-bearing, successful reports
        // only. A failed write is swallowed by design.
        if normalized.ok {
            if let Some(identity) = &request.identity {
                match self
                    .gateway
                    .persist(identity, &normalized, &request.input_summary())
                    .await
                {
                    Ok(()) => metrics::REPORTS_PERSISTED_TOTAL.inc(),
                    Err(e) => {
                        metrics::PERSIST_FAILURES_TOTAL.inc();
                        error!(tool = %request.tool_id, "failed to persist scan report: {e}");
                    }
                }
            }
        }

        Ok(normalized)
    }
}
