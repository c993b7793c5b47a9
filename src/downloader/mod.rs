//! Core downloader implementation split into focused submodules.
//!
//! The `TrackDownloader` struct and its methods are organized by domain:
//! - [`dispatcher`] - Queue consumption and job task spawning
//! - [`job_task`] - Per-job batch execution
//! - [`lifecycle`] - Startup and shutdown coordination

mod dispatcher;
mod job_task;
mod lifecycle;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogProvider;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::TrackFetcher;
use crate::job::Job;
use crate::progress::{ProgressReporter, ProgressSink};
use crate::queue::JobQueue;
use crate::store::JobStore;
use crate::types::{ItemKind, JobId, JobStatus, OwnerRef, TrackMetadata};

/// Pipeline execution state shared between the facade, the dispatcher and
/// spawned job tasks
#[derive(Clone)]
pub(crate) struct PipelineState {
    /// Semaphore bounding the number of jobs processed in parallel
    pub(crate) job_limit: Arc<tokio::sync::Semaphore>,
    /// Map of in-flight jobs to their cancellation tokens
    pub(crate) active_jobs:
        Arc<tokio::sync::Mutex<std::collections::HashMap<JobId, CancellationToken>>>,
    /// Flag to indicate whether new jobs are accepted (cleared during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Token that stops the dispatcher loop
    pub(crate) shutdown_token: CancellationToken,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TrackDownloader {
    /// In-memory job and artifact store
    pub(crate) store: Arc<JobStore>,
    /// FIFO hand-off between submission and the dispatcher
    pub(crate) queue: Arc<JobQueue>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Metadata lookup seam
    pub(crate) catalog: Arc<dyn CatalogProvider>,
    /// Audio fetch seam
    pub(crate) fetcher: Arc<dyn TrackFetcher>,
    /// Throttled progress publisher
    pub(crate) reporter: Arc<ProgressReporter>,
    /// Pipeline execution state
    pub(crate) pipeline: PipelineState,
}

impl TrackDownloader {
    /// Create a new TrackDownloader instance.
    ///
    /// This wires the in-memory store, the job queue and the concurrency
    /// limits, but does not start processing; call
    /// [`start`](Self::start) to launch the dispatcher.
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogProvider>,
        fetcher: Arc<dyn TrackFetcher>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let reporter = Arc::new(ProgressReporter::new(sink, &config.progress));
        let job_limit = Arc::new(tokio::sync::Semaphore::new(
            config.download.max_parallel_jobs,
        ));

        let pipeline = PipelineState {
            job_limit,
            active_jobs: Arc::new(tokio::sync::Mutex::new(std::collections::HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        };

        Self {
            store: Arc::new(JobStore::new()),
            queue: Arc::new(JobQueue::new()),
            config: Arc::new(config),
            catalog,
            fetcher,
            reporter,
            pipeline,
        }
    }

    /// Submit a pre-resolved batch of tracks as one job.
    ///
    /// The job is stored as Pending and enqueued for the dispatcher.
    /// Returns immediately with the new job id; processing happens in the
    /// background.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `items` is empty
    /// - [`Error::ShuttingDown`] if shutdown has begun
    pub async fn submit(
        &self,
        item_kind: ItemKind,
        items: Vec<TrackMetadata>,
        owner: Option<OwnerRef>,
    ) -> Result<JobId> {
        if !self.pipeline.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = self.store.next_id();
        let job = Job::new(id, item_kind, items, owner)?;
        let total = job.total_count();
        self.store.put(job).await;

        if !self.queue.enqueue(id) {
            return Err(Error::ShuttingDown);
        }

        tracing::info!(
            job_id = id.0,
            kind = %item_kind,
            total,
            "Job submitted"
        );
        Ok(id)
    }

    /// Resolve a catalog track id and submit it as a single-item job
    pub async fn submit_track(&self, track_id: &str, owner: Option<OwnerRef>) -> Result<JobId> {
        let track = self.catalog.get_track(track_id).await?;
        let entity = crate::catalog::CatalogEntity::Track(track);
        self.submit(entity.item_kind(), entity.into_items(), owner)
            .await
    }

    /// Resolve a catalog collection id and submit its tracks as one job
    pub async fn submit_collection(
        &self,
        collection_id: &str,
        owner: Option<OwnerRef>,
    ) -> Result<JobId> {
        let tracks = self.catalog.get_collection(collection_id).await?;
        let entity = crate::catalog::CatalogEntity::Collection(tracks);
        self.submit(entity.item_kind(), entity.into_items(), owner)
            .await
    }

    /// Search the catalog and submit the best match as a single-item job
    pub async fn submit_search(&self, text: &str, owner: Option<OwnerRef>) -> Result<JobId> {
        let mut matches = self.catalog.search(text).await?;
        if matches.is_empty() {
            return Err(Error::NotFound(format!("no catalog match for '{text}'")));
        }
        let best = matches.remove(0);
        let entity = crate::catalog::CatalogEntity::Track(best);
        self.submit(entity.item_kind(), entity.into_items(), owner)
            .await
    }

    /// Get a point-in-time status snapshot for a job
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown job ids.
    pub async fn get_status(&self, id: JobId) -> Result<JobStatus> {
        self.store
            .get(id)
            .await
            .map(|job| job.snapshot())
            .ok_or_else(|| Error::NotFound(format!("job {id} not found")))
    }

    /// Get the finished artifact for a completed job.
    ///
    /// Single-track jobs yield the raw audio bytes; multi-track jobs yield
    /// a ZIP archive. The artifact is shared, not copied.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown job ids
    /// - [`Error::NotReady`] if the job has not completed
    pub async fn get_artifact(&self, id: JobId) -> Result<Arc<Vec<u8>>> {
        let job = self
            .store
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("job {id} not found")))?;

        let status = job.status();
        if status != crate::types::Status::Completed {
            return Err(Error::NotReady { id, status });
        }

        self.store
            .get_artifact(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("artifact for job {id} not found")))
    }

    /// Cancel a job.
    ///
    /// In-flight jobs are signalled through their cancellation token and
    /// finish as Failed. Pending jobs are failed in place; the dispatcher
    /// skips them when they reach the front of the queue. Terminal jobs
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown job ids.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let Some(mut job) = self.store.get(id).await else {
            return Err(Error::NotFound(format!("job {id} not found")));
        };

        if job.status().is_terminal() {
            tracing::debug!(job_id = id.0, "Cancel ignored, job already finished");
            return Ok(());
        }

        let token = {
            let active = self.pipeline.active_jobs.lock().await;
            active.get(&id).cloned()
        };

        match token {
            Some(token) => {
                tracing::info!(job_id = id.0, "Cancelling in-flight job");
                token.cancel();
            }
            None => {
                // Still queued; fail it now and let the dispatcher skip it
                tracing::info!(job_id = id.0, "Cancelling queued job");
                job.fail("cancelled");
                self.store.update(job.clone()).await;
                self.reporter.report_terminal(&job);
            }
        }
        Ok(())
    }
}
