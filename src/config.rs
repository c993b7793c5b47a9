//! Configuration types for track-dl

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Download behavior configuration (concurrency, pacing, timeouts)
///
/// Groups settings related to how item fetches are scheduled and bounded.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrent item fetches within a single job (default: 4)
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Maximum concurrently-processing jobs (default: 10)
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,

    /// Pacing delay between item starts within a job, skipped for the
    /// first item (default: 100 ms)
    #[serde(default = "default_min_delay", with = "duration_serde")]
    pub min_delay_between_downloads: Duration,

    /// Per-attempt fetch timeout (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_parallel_jobs: default_max_parallel_jobs(),
            min_delay_between_downloads: default_min_delay(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Retry configuration for the per-item fetch envelope
///
/// The delay between attempts is flat; the opaque fetch transport is free
/// to run its own exponential backoff underneath, the two layers compose.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether the retry layer is active at all (default: true).
    /// When disabled, every item gets exactly one attempt.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts per item when retry is enabled (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts, not applied before the first (default: 2000 ms)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub retry_delay: Duration,

    /// Add random jitter to the inter-attempt delay (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Effective number of attempts per item
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// Progress reporting configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Emit a push update per item start and per fractional sub-progress
    /// step, not just on status changes (default: true)
    #[serde(default = "default_true")]
    pub detailed: bool,

    /// Minimum interval between non-terminal pushes per job (default: 500 ms)
    #[serde(default = "default_push_interval", with = "duration_serde")]
    pub min_push_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            detailed: true,
            min_push_interval: default_push_interval(),
        }
    }
}

/// Main configuration for [`TrackDownloader`](crate::TrackDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) — concurrency limits, pacing, timeouts
/// - [`retry`](RetryConfig) — per-item retry envelope
/// - [`progress`](ProgressConfig) — push-update behavior
///
/// Sub-config fields are flattened so the serialized form stays flat.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download scheduling settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry envelope settings
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// Progress reporting settings
    #[serde(flatten)]
    pub progress: ProgressConfig,

    /// Grace period granted to in-flight jobs during shutdown (default: 30 s)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            retry: RetryConfig::default(),
            progress: ProgressConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_max_concurrent_downloads() -> usize {
    4
}

fn default_max_parallel_jobs() -> usize {
    10
}

fn default_min_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_push_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (integer milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
