pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common_types::StormReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection-level errors (network, TLS, authentication)
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution errors (SQL errors, constraint violations)
    #[error("Database query error: {0}")]
    Query(String),

    /// Connection pool exhausted or closed
    #[error("Database pool exhausted")]
    PoolExhausted,

    #[error("Database migration error: {0}")]
    Migration(String),
}

/// Where a stored report was read from. Recorded alongside the report but never part of
/// its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub kafka_partition: i32,
    pub kafka_offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// True only when no report with the same natural key existed before.
    pub created: bool,
}

/// A processed topic message that could not be decoded into a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub provenance: Provenance,
    pub error: String,
    /// Raw payload as (lossy) UTF-8 text.
    pub payload: String,
}

/// Durable storage for storm reports, deduplicated by natural key.
#[async_trait]
pub trait StormStore: Send + Sync + 'static {
    /// Insert the report, or overwrite every non-key field of the report already stored
    /// under its natural key.
    async fn upsert(
        &self,
        report: &StormReport,
        provenance: Provenance,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Record a message that will never become a report. Recording the same position twice
    /// keeps the latest error.
    async fn quarantine(&self, rejection: &Rejection) -> Result<(), StoreError>;

    /// Reports whose date falls within `[start, end]`, both inclusive unix seconds.
    async fn get_storm_reports(&self, start: i64, end: i64)
        -> Result<Vec<StormReport>, StoreError>;
}
