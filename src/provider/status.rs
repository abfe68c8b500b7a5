//! Provider status shapes → the canonical job status model.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::jobs::{JobStatus, ProviderKind};

/// Fallback failure message when the provider gives no reason.
pub const DEFAULT_FAILURE: &str = "Video generation failed";

/// A provider status response reduced to what the ledger cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedStatus {
    /// Queued or generating.
    Running { status: JobStatus, progress: i64 },
    /// Artifact ready.
    Completed {
        artifact_url: String,
        expires_at: Option<DateTime<Utc>>,
    },
    /// Terminal failure.
    Failed {
        error: String,
        content_filtered: bool,
    },
}

/// Reduce a raw status body to the canonical model. Pure — never touches
/// the store or the network. The shape is picked by the job's provider
/// tag, not sniffed from the body.
pub fn normalize(kind: ProviderKind, provider_ref: &str, body: &Value) -> NormalizedStatus {
    match kind {
        ProviderKind::Sora => normalize_flat(provider_ref, body),
        ProviderKind::Veo => normalize_wrapped(body),
    }
}

/// Flat shape: `{id, status, progress, error: {message}, expires_at}`.
fn normalize_flat(provider_ref: &str, body: &Value) -> NormalizedStatus {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("");

    if status == "completed" {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(provider_ref);
        let expires_at = body
            .get("expires_at")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        return NormalizedStatus::Completed {
            artifact_url: format!("/api/retrieve-video?videoId={id}"),
            expires_at,
        };
    }

    let has_error = body.get("error").map(|e| !e.is_null()).unwrap_or(false);
    if status == "failed" || has_error {
        let error = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FAILURE)
            .to_string();
        return NormalizedStatus::Failed {
            error,
            content_filtered: false,
        };
    }

    let progress = body.get("progress").and_then(Value::as_i64).unwrap_or(0);
    let status = if status == "queued" {
        JobStatus::Queued
    } else {
        JobStatus::InProgress
    };
    NormalizedStatus::Running { status, progress }
}

/// Wrapper shape: `{done, response: {generatedVideos, expireTime,
/// raiMediaFilteredCount, raiMediaFilteredReasons}, error}`.
fn normalize_wrapped(body: &Value) -> NormalizedStatus {
    let done = body.get("done").and_then(Value::as_bool).unwrap_or(false);
    if !done {
        // The wrapper carries no progress detail while running.
        return NormalizedStatus::Running {
            status: JobStatus::InProgress,
            progress: 0,
        };
    }

    if let Some(video) = body.pointer("/response/generatedVideos/0/video") {
        let artifact_url = video
            .get("bytesBase64Encoded")
            .and_then(Value::as_str)
            .map(|bytes| format!("data:video/mp4;base64,{bytes}"))
            .or_else(|| {
                video
                    .get("uri")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        if let Some(artifact_url) = artifact_url {
            let expires_at = body
                .pointer("/response/expireTime")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc));
            return NormalizedStatus::Completed {
                artifact_url,
                expires_at,
            };
        }
    }

    // Done with no usable media: prefer the safety-filter reason over the
    // generic error field over the default message.
    if let Some(reason) = body
        .pointer("/response/raiMediaFilteredReasons/0")
        .and_then(Value::as_str)
    {
        return NormalizedStatus::Failed {
            error: reason.to_string(),
            content_filtered: true,
        };
    }

    let error = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FAILURE)
        .to_string();
    NormalizedStatus::Failed {
        error,
        content_filtered: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_completed_builds_download_locator_from_body_id() {
        let body = json!({"status": "completed", "id": "v1"});
        let got = normalize(ProviderKind::Sora, "fallback", &body);
        assert_eq!(
            got,
            NormalizedStatus::Completed {
                artifact_url: "/api/retrieve-video?videoId=v1".into(),
                expires_at: None,
            }
        );
    }

    #[test]
    fn flat_completed_falls_back_to_stored_ref() {
        let body = json!({"status": "completed"});
        let got = normalize(ProviderKind::Sora, "video_9", &body);
        assert!(matches!(
            got,
            NormalizedStatus::Completed { artifact_url, .. }
                if artifact_url == "/api/retrieve-video?videoId=video_9"
        ));
    }

    #[test]
    fn flat_completed_reads_epoch_expiry() {
        let body = json!({"status": "completed", "id": "v1", "expires_at": 1_700_000_000});
        let got = normalize(ProviderKind::Sora, "v1", &body);
        let NormalizedStatus::Completed { expires_at, .. } = got else {
            panic!("expected completed");
        };
        assert_eq!(expires_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn flat_failed_carries_the_provider_message() {
        let body = json!({"status": "failed", "error": {"message": "m"}});
        assert_eq!(
            normalize(ProviderKind::Sora, "v1", &body),
            NormalizedStatus::Failed {
                error: "m".into(),
                content_filtered: false,
            }
        );
    }

    #[test]
    fn flat_error_object_fails_even_without_failed_status() {
        let body = json!({"status": "in_progress", "error": {"message": "stalled"}});
        assert!(matches!(
            normalize(ProviderKind::Sora, "v1", &body),
            NormalizedStatus::Failed { error, .. } if error == "stalled"
        ));
    }

    #[test]
    fn flat_failure_message_defaults() {
        let body = json!({"status": "failed"});
        assert!(matches!(
            normalize(ProviderKind::Sora, "v1", &body),
            NormalizedStatus::Failed { error, .. } if error == DEFAULT_FAILURE
        ));
    }

    #[test]
    fn flat_running_states_copy_progress() {
        let body = json!({"status": "in_progress", "progress": 55});
        assert_eq!(
            normalize(ProviderKind::Sora, "v1", &body),
            NormalizedStatus::Running {
                status: JobStatus::InProgress,
                progress: 55,
            }
        );

        let body = json!({"status": "queued"});
        assert_eq!(
            normalize(ProviderKind::Sora, "v1", &body),
            NormalizedStatus::Running {
                status: JobStatus::Queued,
                progress: 0,
            }
        );
    }

    #[test]
    fn wrapped_not_done_is_running() {
        let body = json!({"done": false});
        assert_eq!(
            normalize(ProviderKind::Veo, "op", &body),
            NormalizedStatus::Running {
                status: JobStatus::InProgress,
                progress: 0,
            }
        );
    }

    #[test]
    fn wrapped_done_with_uri_completes() {
        let body = json!({"done": true, "response": {"generatedVideos": [{"video": {"uri": "x"}}]}});
        assert_eq!(
            normalize(ProviderKind::Veo, "op", &body),
            NormalizedStatus::Completed {
                artifact_url: "x".into(),
                expires_at: None,
            }
        );
    }

    #[test]
    fn wrapped_inline_bytes_win_over_uri() {
        let body = json!({
            "done": true,
            "response": {
                "generatedVideos": [{"video": {"bytesBase64Encoded": "QUJD", "uri": "x"}}],
                "expireTime": "2026-01-01T00:00:00Z"
            }
        });
        let NormalizedStatus::Completed {
            artifact_url,
            expires_at,
        } = normalize(ProviderKind::Veo, "op", &body)
        else {
            panic!("expected completed");
        };
        assert_eq!(artifact_url, "data:video/mp4;base64,QUJD");
        assert!(expires_at.is_some());
    }

    #[test]
    fn wrapped_safety_rejection_beats_generic_error() {
        let body = json!({
            "done": true,
            "response": {"raiMediaFilteredCount": 1, "raiMediaFilteredReasons": ["violence"]},
            "error": {"message": "generic"}
        });
        assert_eq!(
            normalize(ProviderKind::Veo, "op", &body),
            NormalizedStatus::Failed {
                error: "violence".into(),
                content_filtered: true,
            }
        );
    }

    #[test]
    fn wrapped_done_with_nothing_usable_fails_with_default() {
        let body = json!({"done": true, "response": {}});
        assert_eq!(
            normalize(ProviderKind::Veo, "op", &body),
            NormalizedStatus::Failed {
                error: DEFAULT_FAILURE.into(),
                content_filtered: false,
            }
        );
    }
}
