//! Persistence Gateway
//!
//! External collaborator contract for the audit store. The pipeline calls
//! `persist` only for successful reports from identity-bearing requests;
//! a failure here is logged and discarded, because an audit-write failure
//! must never downgrade an otherwise-successful analysis response.
//!
//! The store is append-only from the pipeline's perspective: one record
//! per persisted report, never updated. `MemoryStore` is the in-tree
//! implementation; a durable engine lives behind the same trait.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::report::NormalizedReport;
use crate::request::Identity;

/// Failure inside the gateway. Never surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("storage rejected record: {0}")]
    Rejected(String),

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One durable audit record. Created exactly once per successful,
/// persistable report; never updated.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReportRecord {
    pub id: Uuid,
    pub identity: String,
    pub tool_name: String,
    pub input_summary: String,
    pub risk_level: String,
    pub main_finding: String,
    pub serialized_report: String,
    pub scanned_at: DateTime<Utc>,
}

impl StoredReportRecord {
    pub fn from_report(
        identity: &Identity,
        report: &NormalizedReport,
        input_summary: &str,
    ) -> Result<Self, PersistError> {
        Ok(Self {
            id: Uuid::new_v4(),
            identity: identity.as_str().to_string(),
            tool_name: report.tool.clone(),
            input_summary: input_summary.to_string(),
            risk_level: report.risk_level_or_na().to_string(),
            main_finding: report.main_finding_or_default().to_string(),
            serialized_report: serde_json::to_string(report)?,
            scanned_at: Utc::now(),
        })
    }
}

/// The outbound storage contract consumed by the pipeline.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn persist(
        &self,
        identity: &Identity,
        report: &NormalizedReport,
        input_summary: &str,
    ) -> Result<(), PersistError>;
}

/// Append-only in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredReportRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of all stored records.
    pub fn records(&self) -> Vec<StoredReportRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredReportRecord>> {
        // A poisoned audit store is still readable and appendable.
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn persist(
        &self,
        identity: &Identity,
        report: &NormalizedReport,
        input_summary: &str,
    ) -> Result<(), PersistError> {
        let record = StoredReportRecord::from_report(identity, report, input_summary)?;
        tracing::debug!(
            tool = %record.tool_name,
            record_id = %record.id,
            "persisted scan report"
        );
        self.lock().push(record);
        Ok(())
    }
}

/// Gateway that rejects every write; used to exercise the best-effort
/// policy in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingStore;

#[cfg(test)]
#[async_trait]
impl PersistenceGateway for FailingStore {
    async fn persist(
        &self,
        _identity: &Identity,
        _report: &NormalizedReport,
        _input_summary: &str,
    ) -> Result<(), PersistError> {
        Err(PersistError::Rejected("store offline".to_string()))
    }
}
