//! In-memory job and artifact store.
//!
//! The store owns the canonical [`Job`] records and the completed result
//! artifacts, keyed by job id with independent lifetimes. All operations
//! are safe for arbitrarily many concurrent callers. There is no eviction
//! or TTL; state lives for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use crate::job::Job;
use crate::types::JobId;

/// Concurrent key-value lifecycle store for jobs and their artifacts
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    artifacts: RwLock<HashMap<JobId, Arc<Vec<u8>>>>,
    next_id: AtomicI64,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            artifacts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Allocate the next job id
    pub fn next_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert a job record
    pub async fn put(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
    }

    /// Fetch a copy of a job record, if present
    pub async fn get(&self, id: JobId) -> Option<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).cloned()
    }

    /// Replace a job record by id (last-writer-wins, no optimistic
    /// concurrency). A write for an id the store has never seen is
    /// inserted as-is; callers are expected to `put` first.
    pub async fn update(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job);
    }

    /// Store the completed artifact for a job
    pub async fn put_artifact(&self, id: JobId, bytes: Vec<u8>) {
        let mut artifacts = self.artifacts.write().await;
        artifacts.insert(id, Arc::new(bytes));
    }

    /// Fetch the artifact for a job, if one has been stored.
    ///
    /// The store is oblivious to job status; callers distinguish "not
    /// finished yet" from "never existed" by checking the job record first.
    pub async fn get_artifact(&self, id: JobId) -> Option<Arc<Vec<u8>>> {
        let artifacts = self.artifacts.read().await;
        artifacts.get(&id).cloned()
    }

    /// Number of job records currently held (diagnostics)
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the store holds no job records
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
