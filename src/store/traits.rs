//! `JobStore` trait — the async interface over the durable job ledger.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::{JobPatch, JobRecord};

/// Backend-agnostic job ledger.
///
/// The ledger is the single source of truth for what is pending. All
/// mutation flows through the submission path (`insert`) and the poller's
/// sequential tick loop (`merge`); there are no concurrent writers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly submitted job.
    async fn insert(&self, job: &JobRecord) -> Result<(), DatabaseError>;

    /// Merge a partial update into an existing record. The whole merge is
    /// applied in one statement, so readers never observe it half-done.
    async fn merge(&self, id: Uuid, patch: &JobPatch) -> Result<(), DatabaseError>;

    /// Fetch one record by id.
    async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, DatabaseError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<JobRecord>, DatabaseError>;

    /// Records that still need polling: every non-terminal record, plus
    /// completed records whose artifact reference has expired.
    async fn pending(&self) -> Result<Vec<JobRecord>, DatabaseError>;

    /// Delete a record. Only ever called for explicit user removal;
    /// history is never garbage-collected.
    async fn remove(&self, id: Uuid) -> Result<(), DatabaseError>;
}
