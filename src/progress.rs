//! Progress delivery to an abstracted push sink.
//!
//! The core never blocks on progress delivery: pushes are spawned
//! fire-and-forget, failures are logged and swallowed. Routine updates
//! are throttled per job to a minimum interval; terminal updates
//! (Completed/Failed) always go out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::ProgressConfig;
use crate::error::Result;
use crate::job::Job;
use crate::types::{JobId, OwnerRef, Status};

/// One progress push
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// The job the update belongs to
    pub job_id: JobId,
    /// Routing target for delivery
    pub owner: OwnerRef,
    /// Human-readable status line
    pub status_text: String,
    /// Progress percentage in [0, 100]
    pub percent: f32,
}

/// Destination for progress pushes (e.g. a chat notification channel).
///
/// Best-effort from the core's perspective: a returned error is logged
/// and never propagated into the pipeline.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver one update
    async fn push(&self, update: ProgressUpdate) -> Result<()>;
}

/// Sink that drops every update (for jobs without a push target wiring,
/// or tests that don't care about progress)
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn push(&self, _update: ProgressUpdate) -> Result<()> {
        Ok(())
    }
}

/// Throttled, fire-and-forget progress publisher
pub(crate) struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    detailed: bool,
    min_push_interval: Duration,
    last_push: Mutex<HashMap<JobId, Instant>>,
}

impl ProgressReporter {
    pub(crate) fn new(sink: Arc<dyn ProgressSink>, config: &ProgressConfig) -> Self {
        Self {
            sink,
            detailed: config.detailed,
            min_push_interval: config.min_push_interval,
            last_push: Mutex::new(HashMap::new()),
        }
    }

    /// Per-item progress update; suppressed entirely when detailed
    /// progress is disabled, throttled otherwise.
    pub(crate) fn report_detail(&self, job: &Job) {
        if self.detailed {
            self.send(job, false);
        }
    }

    /// Status-transition update (e.g. Pending -> Processing); throttled.
    pub(crate) fn report_status(&self, job: &Job) {
        self.send(job, false);
    }

    /// Terminal update; always delivered, and the job's throttle slot is
    /// released since nothing further will be pushed for it.
    pub(crate) fn report_terminal(&self, job: &Job) {
        if let Ok(mut last) = self.last_push.lock() {
            last.remove(&job.id);
        }
        self.send(job, true);
    }

    fn send(&self, job: &Job, force: bool) {
        let Some(owner) = job.owner else {
            return;
        };

        if !force && !self.may_push(job.id) {
            return;
        }

        let update = ProgressUpdate {
            job_id: job.id,
            owner,
            status_text: status_text(job),
            percent: job.progress(),
        };

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.push(update).await {
                tracing::warn!(error = %e, "Progress push failed");
            }
        });
    }

    /// Record-and-check the per-job throttle window
    fn may_push(&self, id: JobId) -> bool {
        let Ok(mut last) = self.last_push.lock() else {
            return true;
        };
        let now = Instant::now();
        match last.get(&id) {
            Some(previous) if now.duration_since(*previous) < self.min_push_interval => false,
            _ => {
                last.insert(id, now);
                true
            }
        }
    }
}

/// Human-readable status line for a push
fn status_text(job: &Job) -> String {
    match job.status() {
        Status::Pending => "Queued".to_string(),
        Status::Processing => match &job.current_item {
            Some(label) => format!(
                "Downloading {} ({}/{})",
                label,
                job.completed_count + 1,
                job.total_count()
            ),
            None => "Processing".to_string(),
        },
        Status::Completed => "Completed".to_string(),
        Status::Failed => match &job.error_message {
            Some(reason) => format!("Failed: {reason}"),
            None => "Failed".to_string(),
        },
    }
}
