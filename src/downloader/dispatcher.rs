//! Dispatcher — consumes the job queue and spawns bounded job tasks.

use std::sync::Arc;

use super::TrackDownloader;
use super::job_task::JobTaskContext;

impl TrackDownloader {
    /// Start the dispatcher task.
    ///
    /// This method spawns a background task that continuously:
    /// 1. Waits for the next job id on the queue
    /// 2. Acquires a permit from the job limiter (respects max_parallel_jobs)
    /// 3. Spawns a job task for that job
    /// 4. Repeats until shutdown
    ///
    /// The permit is acquired before spawning, so at most
    /// `max_parallel_jobs` jobs run concurrently while the rest wait in
    /// FIFO order. The permit travels into the spawned task and is
    /// released when the job finishes.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let fetcher = Arc::clone(&self.fetcher);
        let reporter = Arc::clone(&self.reporter);
        let job_limit = Arc::clone(&self.pipeline.job_limit);
        let active_jobs = Arc::clone(&self.pipeline.active_jobs);
        let shutdown_token = self.pipeline.shutdown_token.clone();

        tokio::spawn(async move {
            loop {
                let id = tokio::select! {
                    _ = shutdown_token.cancelled() => {
                        tracing::debug!("Dispatcher stopping");
                        break;
                    }
                    id = queue.dequeue() => match id {
                        Some(id) => id,
                        None => {
                            tracing::debug!("Job queue closed, dispatcher stopping");
                            break;
                        }
                    },
                };

                // Jobs cancelled while still queued are already terminal
                match store.get(id).await {
                    Some(job) if !job.status().is_terminal() => {}
                    Some(_) => {
                        tracing::debug!(job_id = id.0, "Skipping finished job from queue");
                        continue;
                    }
                    None => {
                        tracing::warn!(job_id = id.0, "Dequeued unknown job id");
                        continue;
                    }
                }

                // Blocks while max_parallel_jobs tasks are in flight;
                // shutdown must also win this wait or a job could be
                // admitted after the straggler sweep
                let permit = tokio::select! {
                    permit = Arc::clone(&job_limit).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                    _ = shutdown_token.cancelled() => {
                        tracing::debug!("Dispatcher stopping while waiting for capacity");
                        break;
                    }
                };

                let cancel_token = tokio_util::sync::CancellationToken::new();
                {
                    let mut active = active_jobs.lock().await;
                    active.insert(id, cancel_token.clone());
                }

                let ctx = JobTaskContext {
                    id,
                    store: Arc::clone(&store),
                    config: Arc::clone(&config),
                    fetcher: Arc::clone(&fetcher),
                    reporter: Arc::clone(&reporter),
                    active_jobs: Arc::clone(&active_jobs),
                    cancel_token,
                };

                tokio::spawn(async move {
                    let _permit = permit;
                    super::job_task::run_job_task(ctx).await;
                });
            }
        })
    }
}
