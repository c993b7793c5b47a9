//! FIFO hand-off channel between submission and the dispatch loop.
//!
//! `enqueue` never blocks (the backlog is unbounded by design; admission
//! control happens in the dispatcher, not here) and each enqueued id is
//! delivered to exactly one `dequeue` call.

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::types::JobId;

/// Unbounded FIFO queue of job ids awaiting dispatch
pub struct JobQueue {
    tx: UnboundedSender<JobId>,
    rx: Mutex<UnboundedReceiver<JobId>>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Add a job id to the back of the queue. Never blocks.
    ///
    /// Returns false if the consuming side has been dropped (only happens
    /// after shutdown tore the dispatcher down).
    pub fn enqueue(&self, id: JobId) -> bool {
        match self.tx.send(id) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(job_id = id.0, "Enqueue after queue closed, id dropped");
                false
            }
        }
    }

    /// Wait for the next job id, FIFO order.
    ///
    /// Suspends until an id is available. Returns `None` if the queue has
    /// been closed and drained. Callers wanting cancellation race this
    /// against their own signal via `tokio::select!`.
    pub async fn dequeue(&self) -> Option<JobId> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Number of ids currently waiting (diagnostics)
    pub async fn backlog(&self) -> usize {
        self.rx.lock().await.len()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
