//! Error types for track-dl
//!
//! This module provides the error taxonomy used throughout the library:
//! - Validation errors (rejected before any job record exists)
//! - NotFound / NotReady for status and artifact queries
//! - Per-item download failures (timeout, exhausted retries, cancellation)
//! - Structural failures that fail a whole job

use thiserror::Error;

use crate::types::{JobId, Status};

/// Result type alias for track-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for track-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input rejected at submission time (e.g. empty item list)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown job, artifact, or catalog entity
    #[error("not found: {0}")]
    NotFound(String),

    /// Job exists but has not produced an artifact yet
    #[error("job {id} has no artifact yet (status: {status})")]
    NotReady {
        /// The job that was queried
        id: JobId,
        /// Its current, non-terminal status
        status: Status,
    },

    /// Catalog lookup failed (fatal to job creation, never retried here)
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Per-item download failure
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Archive building failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Per-item download failures produced by the fetch-with-retry envelope
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The final attempt exceeded its deadline
    #[error("download timed out after {attempts} attempt(s)")]
    Timeout {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// All attempts failed with an operational error
    #[error("download failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Message from the final failed attempt
        last_error: String,
    },

    /// The job-wide cancellation signal fired mid-download
    #[error("download cancelled")]
    Cancelled,

    /// The underlying fetch reported a structural failure
    #[error("{0}")]
    Fetch(String),
}

impl Error {
    /// Machine-readable error code, stable for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::NotReady { .. } => "not_ready",
            Error::Catalog(_) => "catalog_error",
            Error::Download(e) => match e {
                DownloadError::Timeout { .. } => "download_timeout",
                DownloadError::RetriesExhausted { .. } => "retries_exhausted",
                DownloadError::Cancelled => "cancelled",
                DownloadError::Fetch(_) => "fetch_error",
            },
            Error::Archive(_) => "archive_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_expected_code() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::Validation("empty".into()), "validation_error"),
            (Error::NotFound("job 9".into()), "not_found"),
            (
                Error::NotReady {
                    id: JobId(3),
                    status: Status::Processing,
                },
                "not_ready",
            ),
            (Error::Catalog("token expired".into()), "catalog_error"),
            (
                Error::Download(DownloadError::Timeout { attempts: 3 }),
                "download_timeout",
            ),
            (
                Error::Download(DownloadError::RetriesExhausted {
                    attempts: 3,
                    last_error: "network".into(),
                }),
                "retries_exhausted",
            ),
            (Error::Download(DownloadError::Cancelled), "cancelled"),
            (
                Error::Download(DownloadError::Fetch("bad stream".into())),
                "fetch_error",
            ),
            (Error::Io(std::io::Error::other("disk fail")), "io_error"),
            (Error::ShuttingDown, "shutting_down"),
            (Error::Other("unknown".into()), "internal_error"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.code(), expected, "wrong code for {error}");
        }
    }

    #[test]
    fn timeout_display_includes_attempt_count() {
        let err = DownloadError::Timeout { attempts: 3 };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn retries_exhausted_display_includes_last_error() {
        let err = DownloadError::RetriesExhausted {
            attempts: 2,
            last_error: "connection reset".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn not_ready_display_names_job_and_status() {
        let err = Error::NotReady {
            id: JobId(42),
            status: Status::Pending,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("pending"));
    }
}
