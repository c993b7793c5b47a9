//! Per-job batch execution.
//!
//! One task runs the whole job: single-track jobs take a fast path that
//! stores the raw audio bytes; multi-track jobs fan out under the
//! per-job concurrency gate, collect per-item outcomes and package them
//! into an archive. Item failures are data, never control flow, so a
//! batch always runs to the end unless cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::archive::{ItemOutcome, build_archive};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{FetchProgress, NoProgress, TrackFetcher};
use crate::job::Job;
use crate::progress::ProgressReporter;
use crate::retry::fetch_with_retry;
use crate::store::JobStore;
use crate::types::{JobId, TrackMetadata};

/// Everything a spawned job task needs, cloned out of the facade so the
/// task owns its context
pub(crate) struct JobTaskContext {
    pub(crate) id: JobId,
    pub(crate) store: Arc<JobStore>,
    pub(crate) config: Arc<Config>,
    pub(crate) fetcher: Arc<dyn TrackFetcher>,
    pub(crate) reporter: Arc<ProgressReporter>,
    pub(crate) active_jobs:
        Arc<tokio::sync::Mutex<std::collections::HashMap<JobId, CancellationToken>>>,
    pub(crate) cancel_token: CancellationToken,
}

/// Run one job to a terminal state and deregister it.
///
/// Infrastructure errors (archive assembly, store access) fail the job;
/// they are never allowed to leave the job stuck in Processing.
pub(crate) async fn run_job_task(ctx: JobTaskContext) {
    if let Err(e) = process_job(&ctx).await {
        tracing::error!(job_id = ctx.id.0, error = %e, "Job failed with internal error");
        if let Some(mut job) = ctx.store.get(ctx.id).await {
            job.fail(e.to_string());
            ctx.store.update(job.clone()).await;
            ctx.reporter.report_terminal(&job);
        }
    }

    let mut active = ctx.active_jobs.lock().await;
    active.remove(&ctx.id);
}

async fn process_job(ctx: &JobTaskContext) -> Result<()> {
    let Some(mut job) = ctx.store.get(ctx.id).await else {
        tracing::warn!(job_id = ctx.id.0, "Job vanished before processing");
        return Ok(());
    };

    job.start_processing();
    ctx.store.update(job.clone()).await;
    ctx.reporter.report_status(&job);
    tracing::info!(
        job_id = ctx.id.0,
        total = job.total_count(),
        "Job processing started"
    );

    if job.is_single() {
        process_single(ctx, &job).await
    } else {
        process_batch(ctx, &job).await
    }
}

/// Single-track fast path: the artifact is the raw audio bytes, no
/// archive wrapping.
async fn process_single(ctx: &JobTaskContext, job: &Job) -> Result<()> {
    let track = job.items()[0].clone();
    let progress = SingleItemProgress {
        store: Arc::clone(&ctx.store),
        reporter: Arc::clone(&ctx.reporter),
        id: ctx.id,
    };

    if let Some(mut job) = ctx.store.get(ctx.id).await {
        job.current_item = Some(track.display_label());
        ctx.store.update(job.clone()).await;
        ctx.reporter.report_detail(&job);
    }

    let result = fetch_with_retry(
        ctx.fetcher.as_ref(),
        &track,
        &progress,
        &ctx.config.download,
        &ctx.config.retry,
        &ctx.cancel_token,
    )
    .await;

    let Some(mut job) = ctx.store.get(ctx.id).await else {
        return Ok(());
    };

    match result {
        Ok(bytes) => {
            let size = bytes.len();
            ctx.store.put_artifact(ctx.id, bytes).await;
            job.completed_count = 1;
            job.complete();
            tracing::info!(job_id = ctx.id.0, size, "Job completed");
        }
        Err(e) => {
            job.fail(e.to_string());
            tracing::warn!(job_id = ctx.id.0, error = %e, "Job failed");
        }
    }

    ctx.store.update(job.clone()).await;
    ctx.reporter.report_terminal(&job);
    Ok(())
}

/// Multi-track batch: bounded fan-out, outcome aggregation, archive
/// packaging.
async fn process_batch(ctx: &JobTaskContext, job: &Job) -> Result<()> {
    let items: Vec<TrackMetadata> = job.items().to_vec();
    let total = items.len();

    // Per-job gate; independent of the cross-job parallelism limit
    let gate = Arc::new(tokio::sync::Semaphore::new(
        ctx.config.download.max_concurrent_downloads,
    ));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(total);
    for (index, track) in items.iter().cloned().enumerate() {
        let gate = Arc::clone(&gate);
        let finished = Arc::clone(&finished);
        let store = Arc::clone(&ctx.store);
        let config = Arc::clone(&ctx.config);
        let fetcher = Arc::clone(&ctx.fetcher);
        let reporter = Arc::clone(&ctx.reporter);
        let cancel_token = ctx.cancel_token.clone();
        let id = ctx.id;

        handles.push(tokio::spawn(async move {
            let _permit = match gate.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return ItemOutcome {
                        index,
                        track,
                        result: Err("cancelled".to_string()),
                    };
                }
            };

            // Pace download starts; the first item goes immediately
            let min_delay = config.download.min_delay_between_downloads;
            if index > 0 && !min_delay.is_zero() {
                tokio::time::sleep(min_delay).await;
            }

            // Advertise the item before fetching so status queries see
            // what is in flight, not what last finished
            if let Some(mut job) = store.get(id).await {
                job.current_item = Some(track.display_label());
                job.set_progress(index as f32 / total as f32 * 100.0);
                store.update(job.clone()).await;
                reporter.report_detail(&job);
            }

            let result = fetch_with_retry(
                fetcher.as_ref(),
                &track,
                &NoProgress,
                &config.download,
                &config.retry,
                &cancel_token,
            )
            .await;

            let outcome = ItemOutcome {
                index,
                track: track.clone(),
                result: result.map_err(|e| e.to_string()),
            };

            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(mut job) = store.get(id).await {
                job.completed_count = done;
                job.set_progress(done as f32 / total as f32 * 100.0);
                store.update(job.clone()).await;
                reporter.report_detail(&job);
            }

            outcome
        }));
    }

    let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!(job_id = ctx.id.0, index, error = %e, "Item task panicked");
                outcomes.push(ItemOutcome {
                    index,
                    track: items[index].clone(),
                    result: Err(format!("internal task failure: {e}")),
                });
            }
        }
    }

    let Some(mut job) = ctx.store.get(ctx.id).await else {
        return Ok(());
    };

    if ctx.cancel_token.is_cancelled() {
        job.fail("cancelled");
        ctx.store.update(job.clone()).await;
        ctx.reporter.report_terminal(&job);
        tracing::info!(job_id = ctx.id.0, "Job cancelled");
        return Ok(());
    }

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    if successes == 0 {
        job.fail(format!("all {total} download(s) failed"));
        ctx.store.update(job.clone()).await;
        ctx.reporter.report_terminal(&job);
        tracing::warn!(job_id = ctx.id.0, total, "Job failed, no track downloaded");
        return Ok(());
    }

    let archive = build_archive(outcomes)?;
    let size = archive.len();
    ctx.store.put_artifact(ctx.id, archive).await;

    job.completed_count = total;
    job.complete();
    ctx.store.update(job.clone()).await;
    ctx.reporter.report_terminal(&job);
    tracing::info!(
        job_id = ctx.id.0,
        total,
        successes,
        failures = total - successes,
        size,
        "Job completed"
    );
    Ok(())
}

/// Maps fractional fetch progress of a single-track job onto the job's
/// overall progress
struct SingleItemProgress {
    store: Arc<JobStore>,
    reporter: Arc<ProgressReporter>,
    id: JobId,
}

impl FetchProgress for SingleItemProgress {
    fn on_progress(&self, percent: f32) {
        let store = Arc::clone(&self.store);
        let reporter = Arc::clone(&self.reporter);
        let id = self.id;
        tokio::spawn(async move {
            if let Some(mut job) = store.get(id).await {
                if job.status().is_terminal() {
                    return;
                }
                job.set_progress(percent);
                store.update(job.clone()).await;
                reporter.report_detail(&job);
            }
        });
    }
}
