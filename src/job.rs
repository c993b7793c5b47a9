//! The job entity and its state machine.
//!
//! A [`Job`] represents one user request spanning one or more tracks.
//! Status moves `Pending -> Processing -> {Completed, Failed}`; the two
//! terminal states admit no further transitions. The canonical record is
//! owned by the [`JobStore`](crate::store::JobStore); everything else holds
//! jobs by id and writes back through explicit update calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ItemKind, JobId, JobStatus, OwnerRef, Status, TrackMetadata};

/// One user-submitted download request and its aggregated progress
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, immutable after creation
    pub id: JobId,
    /// Request kind the job was created from
    pub item_kind: ItemKind,
    /// Ordered tracks to fetch; non-empty, immutable after creation
    items: Vec<TrackMetadata>,
    /// Push target for progress delivery; `None` means no push target
    pub owner: Option<OwnerRef>,
    /// Lifecycle status
    status: Status,
    /// Progress percentage in [0, 100]
    progress: f32,
    /// Display label of the in-flight item, cleared on completion
    pub current_item: Option<String>,
    /// Items that have finished (success or accounted failure)
    pub completed_count: usize,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Terminal-transition timestamp, set exactly once
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason, set only on Failed
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new job in the Pending state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `items` is empty; no job record
    /// comes into existence in that case.
    pub fn new(
        id: JobId,
        item_kind: ItemKind,
        items: Vec<TrackMetadata>,
        owner: Option<OwnerRef>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::Validation(
                "a job must contain at least one item".to_string(),
            ));
        }

        Ok(Self {
            id,
            item_kind,
            items,
            owner,
            status: Status::Pending,
            progress: 0.0,
            current_item: None,
            completed_count: 0,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
        })
    }

    /// The tracks this job spans, in submission order
    pub fn items(&self) -> &[TrackMetadata] {
        &self.items
    }

    /// Total item count (always >= 1)
    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the job consists of a single item (raw-stream packaging)
    pub fn is_single(&self) -> bool {
        self.items.len() == 1
    }

    /// Current lifecycle status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Current progress percentage in [0, 100]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Set progress, clamped to [0, 100].
    ///
    /// Progress is advisory telemetry; concurrent item tasks may overwrite
    /// each other (last-writer-wins) and a stale write is tolerated.
    pub fn set_progress(&mut self, percent: f32) {
        self.progress = percent.clamp(0.0, 100.0);
    }

    /// Transition Pending -> Processing.
    ///
    /// A no-op when the job is not Pending, so re-delivery of the same id
    /// cannot double-start a job.
    pub fn start_processing(&mut self) {
        if self.status == Status::Pending {
            self.status = Status::Processing;
        }
    }

    /// Transition to the Completed terminal state.
    ///
    /// Sets progress to 100, clears the in-flight label, and stamps
    /// `completed_at`. No-op if already terminal.
    pub fn complete(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = Status::Completed;
        self.progress = 100.0;
        self.current_item = None;
        self.completed_at = Some(Utc::now());
    }

    /// Transition to the Failed terminal state with a reason.
    ///
    /// No-op if already terminal, so a late failure cannot overwrite an
    /// earlier terminal transition.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = Status::Failed;
        self.current_item = None;
        self.error_message = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }

    /// Point-in-time snapshot for status queries
    pub fn snapshot(&self) -> JobStatus {
        JobStatus {
            id: self.id,
            item_kind: self.item_kind,
            status: self.status,
            progress: self.progress,
            current_item: self.current_item.clone(),
            completed_count: self.completed_count,
            total_count: self.items.len(),
            error_message: self.error_message.clone(),
        }
    }
}
