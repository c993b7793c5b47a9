//! Startup and shutdown coordination.

use std::time::Duration;

use crate::error::Result;

use super::TrackDownloader;

/// Poll interval while waiting for in-flight jobs to drain
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl TrackDownloader {
    /// Gracefully shut down the downloader.
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Stops the dispatcher, so queued jobs are no longer started
    /// 3. Waits for in-flight jobs to finish, up to the configured grace
    ///    period
    /// 4. Cancels any jobs still running after the grace period
    ///
    /// Jobs cancelled in step 4 end up Failed; queued jobs that never
    /// started stay Pending in the store.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.pipeline
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        // 2. Stop the dispatcher loop
        self.pipeline.shutdown_token.cancel();

        // 3. Wait for in-flight jobs with a timeout
        let grace = self.config.shutdown_grace;
        let wait_result = tokio::time::timeout(grace, self.wait_for_active_jobs()).await;

        match wait_result {
            Ok(()) => {
                tracing::info!("All in-flight jobs completed gracefully");
            }
            Err(_) => {
                // 4. Grace period expired, cancel the stragglers
                let active = self.pipeline.active_jobs.lock().await;
                tracing::warn!(
                    stragglers = active.len(),
                    grace_secs = grace.as_secs(),
                    "Grace period expired, cancelling remaining jobs"
                );
                for (id, token) in active.iter() {
                    tracing::debug!(job_id = id.0, "Cancelling straggler job");
                    token.cancel();
                }
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Wait until no job task remains registered as active
    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = {
                let active = self.pipeline.active_jobs.lock().await;
                active.len()
            };

            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for in-flight jobs to finish");
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
    }
}
