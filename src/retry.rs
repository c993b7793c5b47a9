//! Per-item fetch envelope: bounded attempts, per-attempt timeout, flat
//! inter-attempt delay with optional jitter, cancellable throughout.
//!
//! This is the outer of two retry layers. The opaque fetch transport may
//! retry internally with its own counter (e.g. exponential backoff while
//! re-resolving a source); this envelope only counts whole fetch attempts.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::{DownloadConfig, RetryConfig};
use crate::error::DownloadError;
use crate::fetcher::{FetchProgress, FetchQuery, TrackFetcher};
use crate::types::TrackMetadata;

/// Fetch one track with the configured retry/timeout envelope.
///
/// Behavior:
/// - up to `retry.attempts()` attempts (exactly 1 when retry is disabled);
/// - each attempt races a fresh `download_timeout` deadline;
/// - a timeout on the final attempt yields [`DownloadError::Timeout`],
///   a timeout on an earlier attempt just triggers the next retry;
/// - between attempts (never before the first) the task sleeps
///   `retry_delay`, jittered up to 2x when jitter is enabled;
/// - success on any attempt returns immediately;
/// - the cancellation token aborts attempts and inter-attempt waits alike,
///   yielding [`DownloadError::Cancelled`].
pub(crate) async fn fetch_with_retry(
    fetcher: &dyn TrackFetcher,
    track: &TrackMetadata,
    progress: &dyn FetchProgress,
    download: &DownloadConfig,
    retry: &RetryConfig,
    cancel_token: &CancellationToken,
) -> Result<Vec<u8>, DownloadError> {
    let query = FetchQuery::for_track(track);
    let max_attempts = retry.attempts();
    let mut last_error: Option<DownloadError> = None;
    let mut timed_out = false;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = if retry.jitter {
                add_jitter(retry.retry_delay)
            } else {
                retry.retry_delay
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_token.cancelled() => return Err(DownloadError::Cancelled),
            }
        }

        let attempt_result = tokio::select! {
            result = tokio::time::timeout(
                download.download_timeout,
                fetcher.fetch(&query, track, progress),
            ) => result,
            _ = cancel_token.cancelled() => return Err(DownloadError::Cancelled),
        };

        match attempt_result {
            Ok(Ok(bytes)) => {
                if attempt > 1 {
                    tracing::info!(
                        track_id = %track.id,
                        attempts = attempt,
                        "Fetch succeeded after retry"
                    );
                }
                return Ok(bytes);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    track_id = %track.id,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Fetch attempt failed"
                );
                timed_out = false;
                last_error = Some(e);
            }
            Err(_elapsed) => {
                tracing::warn!(
                    track_id = %track.id,
                    attempt,
                    max_attempts,
                    timeout_secs = download.download_timeout.as_secs(),
                    "Fetch attempt timed out"
                );
                timed_out = true;
            }
        }
    }

    if timed_out {
        Err(DownloadError::Timeout {
            attempts: max_attempts,
        })
    } else {
        Err(DownloadError::RetriesExhausted {
            attempts: max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Add random jitter to a delay: uniformly between 0% and 100% extra,
/// so the actual delay lands in `[delay, 2*delay]`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::NoProgress;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn track() -> TrackMetadata {
        TrackMetadata {
            id: "t1".into(),
            title: "Song".into(),
            duration: Duration::from_secs(180),
            album: "Album".into(),
            artists: vec!["Artist".into()],
            preview_url: None,
            cover_url: None,
        }
    }

    fn fast_config() -> (DownloadConfig, RetryConfig) {
        (
            DownloadConfig {
                download_timeout: Duration::from_millis(100),
                ..DownloadConfig::default()
            },
            RetryConfig {
                enabled: true,
                max_attempts: 3,
                retry_delay: Duration::from_millis(10),
                jitter: false,
            },
        )
    }

    /// Fetcher that fails a configurable number of times before succeeding
    struct FlakyFetcher {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
    }

    #[async_trait]
    impl TrackFetcher for FlakyFetcher {
        async fn fetch(
            &self,
            _query: &FetchQuery,
            _track: &TrackMetadata,
            _progress: &dyn FetchProgress,
        ) -> Result<Vec<u8>, DownloadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(DownloadError::Fetch("source unavailable".into()))
            } else {
                Ok(vec![0xAA, 0xBB])
            }
        }
    }

    /// Fetcher that never completes within any attempt deadline
    struct HangingFetcher {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl TrackFetcher for HangingFetcher {
        async fn fetch(
            &self,
            _query: &FetchQuery,
            _track: &TrackMetadata,
            _progress: &dyn FetchProgress,
        ) -> Result<Vec<u8>, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_makes_one_call() {
        let (download, retry) = fast_config();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            calls: Arc::clone(&calls),
            failures_before_success: 0,
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.unwrap(), vec![0xAA, 0xBB]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds_on_third_attempt() {
        let (download, retry) = fast_config();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            calls: Arc::clone(&calls),
            failures_before_success: 2,
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_ok(), "third attempt should succeed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_yield_retries_exhausted() {
        let (download, retry) = fast_config();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            calls: Arc::clone(&calls),
            failures_before_success: u32::MAX,
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(DownloadError::RetriesExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("source unavailable"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn every_attempt_timing_out_yields_timeout_kind() {
        let (download, retry) = fast_config();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = HangingFetcher {
            calls: Arc::clone(&calls),
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(DownloadError::Timeout { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(
            calls.load(Ordering::SeqCst),
            3,
            "each attempt gets its own fresh deadline"
        );
    }

    #[tokio::test]
    async fn retry_disabled_means_exactly_one_attempt() {
        let (download, _) = fast_config();
        let retry = RetryConfig {
            enabled: false,
            max_attempts: 5,
            retry_delay: Duration::from_millis(10),
            jitter: false,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            calls: Arc::clone(&calls),
            failures_before_success: u32::MAX,
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(DownloadError::RetriesExhausted { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_attempt() {
        let (download, retry) = fast_config();
        let download = DownloadConfig {
            download_timeout: Duration::from_secs(3600),
            ..download
        };
        let fetcher = HangingFetcher {
            calls: Arc::new(AtomicU32::new(0)),
        };
        let cancel_token = CancellationToken::new();

        let canceller = {
            let token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &cancel_token,
        )
        .await;

        canceller.await.unwrap();
        assert!(matches!(result, Err(DownloadError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_inter_attempt_delay() {
        let (download, _) = fast_config();
        let retry = RetryConfig {
            enabled: true,
            max_attempts: 3,
            retry_delay: Duration::from_secs(3600),
            jitter: false,
        };
        let fetcher = FlakyFetcher {
            calls: Arc::new(AtomicU32::new(0)),
            failures_before_success: u32::MAX,
        };
        let cancel_token = CancellationToken::new();

        let canceller = {
            let token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let start = std::time::Instant::now();
        let result = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &cancel_token,
        )
        .await;

        canceller.await.unwrap();
        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert!(
            start.elapsed() < Duration::from_secs(60),
            "cancellation must not wait out the retry delay"
        );
    }

    #[tokio::test]
    async fn inter_attempt_delay_is_flat_not_exponential() {
        let (download, _) = fast_config();
        let retry = RetryConfig {
            enabled: true,
            max_attempts: 4,
            retry_delay: Duration::from_millis(50),
            jitter: false,
        };
        let timestamps = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        struct TimestampingFetcher {
            timestamps: Arc<tokio::sync::Mutex<Vec<std::time::Instant>>>,
        }

        #[async_trait]
        impl TrackFetcher for TimestampingFetcher {
            async fn fetch(
                &self,
                _query: &FetchQuery,
                _track: &TrackMetadata,
                _progress: &dyn FetchProgress,
            ) -> Result<Vec<u8>, DownloadError> {
                self.timestamps.lock().await.push(std::time::Instant::now());
                Err(DownloadError::Fetch("nope".into()))
            }
        }

        let fetcher = TimestampingFetcher {
            timestamps: Arc::clone(&timestamps),
        };

        let _ = fetch_with_retry(
            &fetcher,
            &track(),
            &NoProgress,
            &download,
            &retry,
            &CancellationToken::new(),
        )
        .await;

        let ts = timestamps.lock().await;
        assert_eq!(ts.len(), 4);
        for i in 1..ts.len() {
            let gap = ts[i].duration_since(ts[i - 1]);
            assert!(
                gap >= Duration::from_millis(40) && gap < Duration::from_millis(500),
                "gap {i} should be ~50ms flat, was {gap:?}"
            );
        }
    }

    #[test]
    fn add_jitter_stays_within_bounds() {
        let delay = Duration::from_millis(50);
        for i in 0..200 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay, "iteration {i}: below base delay");
            assert!(jittered <= delay * 2, "iteration {i}: above 2x base delay");
        }
    }

    #[test]
    fn add_jitter_on_zero_delay_returns_zero() {
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }
}
