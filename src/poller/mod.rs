//! Status poller — reconciles pending jobs against provider state.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::jobs::{JobEvent, JobPatch, JobRecord};
use crate::provider::status::{NormalizedStatus, normalize};
use crate::provider::Dispatcher;
use crate::store::JobStore;

/// Drives the polling loop: on a fixed cadence, snapshot the pending set,
/// issue one status request per job concurrently, and fold the results
/// back into the ledger.
///
/// Ticks never overlap, so writes to a given job happen in tick order. A
/// job whose status fetch fails is left untouched and retried on the next
/// tick; only the provider itself can fail a job.
pub struct StatusPoller {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    events: broadcast::Sender<JobEvent>,
    config: PollerConfig,
    shutdown: Notify,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Arc<Dispatcher>,
        events: broadcast::Sender<JobEvent>,
        config: PollerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            dispatcher,
            events,
            config,
            shutdown: Notify::new(),
        })
    }

    /// Spawn the tick loop. Runs until `shutdown()`; an in-flight tick
    /// settles before the loop exits, so its results are still applied.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.config.interval);
            // The first tick fires immediately, which doubles as startup
            // recovery for jobs persisted by a previous session.
            loop {
                tokio::select! {
                    _ = interval.tick() => poller.tick().await,
                    _ = poller.shutdown.notified() => {
                        info!("Status poller stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Stop scheduling further ticks.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// One polling round over the current pending set. Every request is
    /// dispatched concurrently and the round waits for all of them to
    /// settle; one job's failure never cancels or delays another's.
    pub async fn tick(&self) {
        let pending = match self.store.pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Failed to read pending jobs");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }

        debug!(count = pending.len(), "Polling pending jobs");
        join_all(pending.iter().map(|job| self.poll_job(job))).await;
    }

    async fn poll_job(&self, job: &JobRecord) {
        let body = match self
            .dispatcher
            .check_status(&job.provider_ref, &job.model)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                // Transient: keep the record as-is and retry next tick.
                debug!(job_id = %job.id, error = %e, "Status check failed; retrying next tick");
                return;
            }
        };

        match normalize(job.provider, &job.provider_ref, &body) {
            NormalizedStatus::Completed {
                artifact_url,
                expires_at,
            } => {
                let patch = JobPatch::completed(artifact_url.clone(), expires_at);
                if let Err(e) = self.store.merge(job.id, &patch).await {
                    warn!(job_id = %job.id, error = %e, "Failed to record completion");
                    return;
                }
                info!(job_id = %job.id, "Job completed");
                let _ = self.events.send(JobEvent::Completed {
                    id: job.id,
                    video_url: artifact_url,
                    progress: 100,
                });
            }
            NormalizedStatus::Running { status, progress } => {
                let patch = JobPatch::running(status, progress);
                if let Err(e) = self.store.merge(job.id, &patch).await {
                    warn!(job_id = %job.id, error = %e, "Failed to record progress");
                    return;
                }
                let _ = self.events.send(JobEvent::Progress {
                    id: job.id,
                    status,
                    progress,
                });
            }
            NormalizedStatus::Failed {
                error,
                content_filtered,
            } => {
                let patch = JobPatch::failed(error.clone(), content_filtered);
                if let Err(e) = self.store.merge(job.id, &patch).await {
                    warn!(job_id = %job.id, error = %e, "Failed to record failure");
                    return;
                }
                info!(job_id = %job.id, error = %error, "Job failed");
                let _ = self.events.send(JobEvent::Failed {
                    id: job.id,
                    error,
                    content_filtered,
                });
            }
        }
    }
}
