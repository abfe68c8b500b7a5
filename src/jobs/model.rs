//! Job records and their lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the provider, not yet started.
    Queued,
    /// Actively generating.
    InProgress,
    /// Artifact produced. Terminal unless the artifact reference expires.
    Completed,
    /// Provider reported failure. Absorbing — never polled again.
    Failed,
}

impl JobStatus {
    /// Terminal statuses are excluded from polling (completed jobs only
    /// while their artifact reference is still valid).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {s}")),
        }
    }
}

/// Which provider family a job belongs to.
///
/// Fixed at submission time from the requested model, so status responses
/// are decoded by tag rather than by sniffing their shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Flat status objects: `{id, status, progress, error, expires_at}`.
    Sora,
    /// Long-running operation wrappers: `{done, response: {...}}`.
    Veo,
}

impl ProviderKind {
    /// Derive the provider family from a model name.
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("veo") {
            Self::Veo
        } else {
            Self::Sora
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sora => write!(f, "sora"),
            Self::Veo => write!(f, "veo"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sora" => Ok(Self::Sora),
            "veo" => Ok(Self::Veo),
            _ => Err(format!("Unknown provider kind: {s}")),
        }
    }
}

/// One tracked generation job, as persisted in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Local identifier, assigned at submission. Never reused.
    pub id: Uuid,
    /// Provider family tag, fixed at creation.
    pub provider: ProviderKind,
    /// Provider-side job identifier returned at submission.
    pub provider_ref: String,
    /// Generation variant that was requested.
    pub model: String,
    /// Prompt text, kept for history display.
    pub prompt: String,
    pub status: JobStatus,
    /// 0-100, meaningful only while in progress.
    pub progress: Option<i64>,
    /// Locally resolvable download locator, set only when completed.
    pub artifact_url: Option<String>,
    /// Absent means the artifact reference never expires.
    pub artifact_expires_at: Option<DateTime<Utc>>,
    /// Failure reason, set only when failed.
    pub error: Option<String>,
    /// Whether the failure was a content-safety rejection.
    pub content_filtered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh queued record for a just-submitted job.
    pub fn new(provider_ref: &str, model: &str, prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider: ProviderKind::from_model(model),
            provider_ref: provider_ref.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            status: JobStatus::Queued,
            progress: Some(0),
            artifact_url: None,
            artifact_expires_at: None,
            error: None,
            content_filtered: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this job still needs polling at `now`.
    ///
    /// Completed jobs re-pend once their artifact reference has expired;
    /// failed jobs never do.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Queued | JobStatus::InProgress => true,
            JobStatus::Completed => self
                .artifact_expires_at
                .map(|expires| expires < now)
                .unwrap_or(false),
            JobStatus::Failed => false,
        }
    }
}

/// Partial update merged into a job record. `Some` fields overwrite,
/// unset fields are left alone; the `clear_*` flags null a column out.
/// An explicit value wins over its clear flag, so a patch can reset a
/// column group and fill part of it in one merge.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<i64>,
    pub clear_progress: bool,
    pub artifact_url: Option<String>,
    pub artifact_expires_at: Option<DateTime<Utc>>,
    pub clear_artifact: bool,
    pub error: Option<String>,
    pub clear_error: bool,
    pub content_filtered: Option<bool>,
}

impl JobPatch {
    /// Completion: overwrite the artifact reference and expiry (an absent
    /// expiry means "never expires" and must replace a stale one), drop
    /// any stale error and progress.
    pub fn completed(artifact_url: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            clear_artifact: true,
            artifact_url: Some(artifact_url),
            artifact_expires_at: expires_at,
            clear_progress: true,
            clear_error: true,
            content_filtered: Some(false),
            ..Default::default()
        }
    }

    /// Still running: update the status and progress counter.
    pub fn running(status: JobStatus, progress: i64) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Terminal failure: store the reason, drop any stale artifact
    /// and progress.
    pub fn failed(error: String, content_filtered: bool) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            content_filtered: Some(content_filtered),
            clear_progress: true,
            clear_artifact: true,
            ..Default::default()
        }
    }
}

/// Update event fanned out to subscribers (WebSocket clients).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Full state snapshot, sent when a client connects or falls behind.
    Sync { jobs: Vec<JobRecord> },
    /// Artifact is ready.
    Completed {
        id: Uuid,
        video_url: String,
        progress: i64,
    },
    /// Queued or generating.
    Progress {
        id: Uuid,
        status: JobStatus,
        progress: i64,
    },
    /// Provider reported a terminal failure.
    Failed {
        id: Uuid,
        error: String,
        content_filtered: bool,
    },
    /// Record deleted by the user.
    Removed { id: Uuid },
}
