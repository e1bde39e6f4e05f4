// Prometheus metrics for ScanHub monitoring
//
// Exposed on the /metrics HTTP endpoint:
// - Tool invocation counts by tool and outcome (counter)
// - Invocation latencies by tool (histogram)
// - Persisted report counts and persistence failures (counters)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Invocation metrics
    pub static ref TOOL_INVOCATIONS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("tool_invocations_total", "Total number of tool invocations"),
        &["tool", "outcome"]
    ).expect("Failed to create tool invocations metric");

    pub static ref TOOL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("tool_duration_seconds", "Tool invocation duration in seconds"),
        &["tool"]
    ).expect("Failed to create tool duration metric");

    // Persistence metrics
    pub static ref REPORTS_PERSISTED_TOTAL: IntCounter = IntCounter::new(
        "reports_persisted_total",
        "Total number of scan reports written to the audit store"
    ).expect("Failed to create reports persisted metric");

    pub static ref PERSIST_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "persist_failures_total",
        "Total number of swallowed audit-store write failures"
    ).expect("Failed to create persist failures metric");
}

/// Initialize metrics registry - must be called once at service startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(TOOL_INVOCATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOOL_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(REPORTS_PERSISTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PERSIST_FAILURES_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
