//! libSQL backend — async `JobStore` implementation.
//!
//! Supports local file and in-memory databases. One connection is reused
//! for all operations; `libsql::Connection` is safe for concurrent async
//! use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::{JobPatch, JobRecord, JobStatus, ProviderKind};
use crate::store::migrations;
use crate::store::traits::JobStore;

/// Column order shared by every SELECT in this module.
const JOB_COLUMNS: &str = "id, provider, provider_ref, model, prompt, status, progress, \
     artifact_url, artifact_expires_at, error, content_filtered, created_at, updated_at";

/// libSQL job ledger backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Job ledger opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Convert `Option<String>` to libsql Value.
fn opt_text(s: Option<String>) -> Value {
    match s {
        Some(s) => Value::Text(s),
        None => Value::Null,
    }
}

/// Convert `Option<i64>` to libsql Value.
fn opt_int(n: Option<i64>) -> Value {
    match n {
        Some(n) => Value::Integer(n),
        None => Value::Null,
    }
}

/// Parse an RFC 3339 datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Map a libsql row to a JobRecord. Column order matches JOB_COLUMNS.
fn row_to_job(row: &libsql::Row) -> Result<JobRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let provider_str: String = row.get(1)?;
    let provider_ref: String = row.get(2)?;
    let model: String = row.get(3)?;
    let prompt: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let progress: Option<i64> = row.get(6).ok();
    let artifact_url: Option<String> = row.get(7).ok();
    let expires_str: Option<String> = row.get(8).ok();
    let error: Option<String> = row.get(9).ok();
    let content_filtered: i64 = row.get(10).unwrap_or(0);
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;

    Ok(JobRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        provider: provider_str.parse().unwrap_or(ProviderKind::Sora),
        provider_ref,
        model,
        prompt,
        status: status_str.parse().unwrap_or(JobStatus::Queued),
        progress,
        artifact_url,
        artifact_expires_at: expires_str.as_deref().map(parse_datetime),
        error,
        content_filtered: content_filtered != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

#[async_trait]
impl JobStore for LibSqlBackend {
    async fn insert(&self, job: &JobRecord) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO jobs (id, provider, provider_ref, model, prompt, status, progress, \
                 artifact_url, artifact_expires_at, error, content_filtered, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    job.id.to_string(),
                    job.provider.to_string(),
                    job.provider_ref.clone(),
                    job.model.clone(),
                    job.prompt.clone(),
                    job.status.to_string(),
                    opt_int(job.progress),
                    opt_text(job.artifact_url.clone()),
                    opt_text(job.artifact_expires_at.map(|t| t.to_rfc3339())),
                    opt_text(job.error.clone()),
                    job.content_filtered as i64,
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert job: {e}")))?;
        Ok(())
    }

    async fn merge(&self, id: Uuid, patch: &JobPatch) -> Result<(), DatabaseError> {
        // One UPDATE covers the whole patch, so readers never see a
        // half-applied merge. Unset fields keep their stored value; the
        // clear flags null their columns out.
        let affected = self
            .conn
            .execute(
                "UPDATE jobs SET \
                     status = COALESCE(?1, status), \
                     progress = COALESCE(?3, CASE WHEN ?2 THEN NULL ELSE progress END), \
                     artifact_url = COALESCE(?5, CASE WHEN ?4 THEN NULL ELSE artifact_url END), \
                     artifact_expires_at = COALESCE(?6, \
                         CASE WHEN ?4 THEN NULL ELSE artifact_expires_at END), \
                     error = COALESCE(?8, CASE WHEN ?7 THEN NULL ELSE error END), \
                     content_filtered = COALESCE(?9, content_filtered), \
                     updated_at = ?10 \
                 WHERE id = ?11",
                params![
                    opt_text(patch.status.map(|s| s.to_string())),
                    patch.clear_progress as i64,
                    opt_int(patch.progress),
                    patch.clear_artifact as i64,
                    opt_text(patch.artifact_url.clone()),
                    opt_text(patch.artifact_expires_at.map(|t| t.to_rfc3339())),
                    patch.clear_error as i64,
                    opt_text(patch.error.clone()),
                    opt_int(patch.content_filtered.map(|f| f as i64)),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to merge job: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "job".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query job: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read job row: {e}")))?;

        match row {
            Some(row) => {
                let job = row_to_job(&row)
                    .map_err(|e| DatabaseError::Serialization(format!("Bad job row: {e}")))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<JobRecord>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to list jobs: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read job row: {e}")))?
        {
            jobs.push(
                row_to_job(&row)
                    .map_err(|e| DatabaseError::Serialization(format!("Bad job row: {e}")))?,
            );
        }
        Ok(jobs)
    }

    async fn pending(&self) -> Result<Vec<JobRecord>, DatabaseError> {
        // RFC 3339 UTC strings compare lexicographically, so the expiry
        // check can stay inside the query.
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs \
                     WHERE status IN ('queued', 'in_progress') \
                        OR (status = 'completed' \
                            AND artifact_expires_at IS NOT NULL \
                            AND artifact_expires_at < ?1) \
                     ORDER BY created_at ASC"
                ),
                params![now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to query pending jobs: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read job row: {e}")))?
        {
            jobs.push(
                row_to_job(&row)
                    .map_err(|e| DatabaseError::Serialization(format!("Bad job row: {e}")))?,
            );
        }
        Ok(jobs)
    }

    async fn remove(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM jobs WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to remove job: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = backend().await;
        let job = JobRecord::new("video_abc", "sora-2", "a dog surfing");
        store.insert(&job).await.unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.provider, ProviderKind::Sora);
        assert_eq!(loaded.provider_ref, "video_abc");
        assert_eq!(loaded.status, JobStatus::Queued);
        assert_eq!(loaded.progress, Some(0));
        assert!(loaded.artifact_url.is_none());
    }

    #[tokio::test]
    async fn pending_excludes_terminal_records() {
        let store = backend().await;

        let queued = JobRecord::new("q", "sora-2", "p");
        store.insert(&queued).await.unwrap();

        let mut done = JobRecord::new("d", "sora-2", "p");
        done.status = JobStatus::Completed;
        done.artifact_url = Some("/api/retrieve-video?videoId=d".into());
        store.insert(&done).await.unwrap();

        let mut failed = JobRecord::new("f", "sora-2", "p");
        failed.status = JobStatus::Failed;
        failed.error = Some("boom".into());
        store.insert(&failed).await.unwrap();

        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, queued.id);
    }

    #[tokio::test]
    async fn pending_includes_expired_completed_record() {
        let store = backend().await;

        let mut fresh = JobRecord::new("fresh", "sora-2", "p");
        fresh.status = JobStatus::Completed;
        fresh.artifact_expires_at = Some(Utc::now() + Duration::hours(1));
        store.insert(&fresh).await.unwrap();

        let mut stale = JobRecord::new("stale", "sora-2", "p");
        stale.status = JobStatus::Completed;
        stale.artifact_expires_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&stale).await.unwrap();

        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, stale.id);
    }

    #[tokio::test]
    async fn completion_merge_clears_stale_error() {
        let store = backend().await;
        let mut job = JobRecord::new("v1", "sora-2", "p");
        job.error = Some("transient".into());
        store.insert(&job).await.unwrap();

        let expires = Utc::now() + Duration::hours(1);
        store
            .merge(
                job.id,
                &JobPatch::completed("/api/retrieve-video?videoId=v1".into(), Some(expires)),
            )
            .await
            .unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(
            loaded.artifact_url.as_deref(),
            Some("/api/retrieve-video?videoId=v1")
        );
        assert!(loaded.error.is_none());
        assert!(loaded.progress.is_none());
        assert_eq!(
            loaded.artifact_expires_at.unwrap().timestamp(),
            expires.timestamp()
        );
    }

    #[tokio::test]
    async fn refreshed_completion_without_expiry_clears_stale_expiry() {
        let store = backend().await;
        let mut job = JobRecord::new("v1", "sora-2", "p");
        job.status = JobStatus::Completed;
        job.artifact_url = Some("/api/retrieve-video?videoId=v1".into());
        job.artifact_expires_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&job).await.unwrap();
        assert_eq!(store.pending().await.unwrap().len(), 1);

        store
            .merge(
                job.id,
                &JobPatch::completed("/api/retrieve-video?videoId=v1".into(), None),
            )
            .await
            .unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert!(loaded.artifact_expires_at.is_none());
        assert!(store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_merge_clears_stale_artifact() {
        let store = backend().await;
        let mut job = JobRecord::new("v1", "sora-2", "p");
        job.status = JobStatus::Completed;
        job.artifact_url = Some("/api/retrieve-video?videoId=v1".into());
        job.artifact_expires_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&job).await.unwrap();

        store
            .merge(job.id, &JobPatch::failed("expired upstream".into(), false))
            .await
            .unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("expired upstream"));
        assert!(loaded.artifact_url.is_none());
        assert!(loaded.artifact_expires_at.is_none());

        // Failed is absorbing — not pending even though it once expired.
        assert!(store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_merge_updates_only_progress_fields() {
        let store = backend().await;
        let job = JobRecord::new("v1", "sora-2", "a cat");
        store.insert(&job).await.unwrap();

        store
            .merge(job.id, &JobPatch::running(JobStatus::InProgress, 40))
            .await
            .unwrap();

        let loaded = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::InProgress);
        assert_eq!(loaded.progress, Some(40));
        assert_eq!(loaded.prompt, "a cat");
        assert_eq!(loaded.provider_ref, "v1");
    }

    #[tokio::test]
    async fn merge_unknown_id_is_not_found() {
        let store = backend().await;
        let err = store
            .merge(Uuid::new_v4(), &JobPatch::running(JobStatus::InProgress, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn remove_deletes_permanently() {
        let store = backend().await;
        let job = JobRecord::new("v1", "sora-2", "p");
        store.insert(&job).await.unwrap();

        store.remove(job.id).await.unwrap();
        assert!(store.get(job.id).await.unwrap().is_none());
        assert!(store.pending().await.unwrap().is_empty());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = backend().await;
        let older = JobRecord::new("old", "sora-2", "p");
        store.insert(&older).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = JobRecord::new("new", "veo-3", "p");
        store.insert(&newer).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);
    }
}
