//! # track-dl
//!
//! Backend library for batch music-track download services.
//!
//! ## Design Philosophy
//!
//! track-dl is designed to be:
//! - **Seam-driven** - Catalog lookup, audio fetching and progress
//!   delivery are traits the embedder implements
//! - **Failure-tolerant** - One bad track never sinks a batch; failures
//!   are aggregated into the delivered archive
//! - **Bounded** - Job parallelism and per-job download concurrency are
//!   capped independently
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use track_dl::{Config, NullSink, TrackDownloader};
//! # use track_dl::{CatalogProvider, TrackFetcher};
//! # async fn example(catalog: Arc<dyn CatalogProvider>, fetcher: Arc<dyn TrackFetcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = TrackDownloader::new(
//!     Config::default(),
//!     catalog,
//!     fetcher,
//!     Arc::new(NullSink),
//! );
//! let _dispatcher = downloader.start();
//!
//! let job_id = downloader.submit_collection("album-id", None).await?;
//! // ... poll downloader.get_status(job_id), then:
//! // let archive = downloader.get_artifact(job_id).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive assembly for multi-track jobs
pub mod archive;
/// Catalog lookup seam and credential refresh
pub mod catalog;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Audio fetch seam
pub mod fetcher;
/// Job state machine
pub mod job;
/// Progress delivery
pub mod progress;
/// FIFO job queue
pub mod queue;
/// Per-download retry envelope
pub mod retry;
/// In-memory job and artifact store
pub mod store;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archive::ERROR_MANIFEST_NAME;
pub use catalog::{CatalogEntity, CatalogProvider, TokenSource, spawn_token_refresher};
pub use config::{Config, DownloadConfig, ProgressConfig, RetryConfig};
pub use downloader::TrackDownloader;
pub use error::{DownloadError, Error, Result};
pub use fetcher::{FetchProgress, FetchQuery, NoProgress, TrackFetcher};
pub use progress::{NullSink, ProgressSink, ProgressUpdate};
pub use types::{ItemKind, JobId, JobStatus, OwnerRef, Status, TrackMetadata};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use track_dl::{Config, NullSink, TrackDownloader, run_with_shutdown};
/// # use track_dl::{CatalogProvider, TrackFetcher};
/// # async fn example(catalog: Arc<dyn CatalogProvider>, fetcher: Arc<dyn TrackFetcher>) -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = TrackDownloader::new(Config::default(), catalog, fetcher, Arc::new(NullSink));
/// let _dispatcher = downloader.start();
/// run_with_shutdown(downloader).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(downloader: TrackDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
