//! The opaque fetch seam.
//!
//! The core never talks to a media source directly; it hands a
//! [`FetchQuery`] and the track metadata to an implementation of
//! [`TrackFetcher`] and receives raw audio bytes back. The fetcher is free
//! to run its own transport-level retries (e.g. re-resolving a search
//! result) underneath the envelope in [`retry`](crate::retry); the two
//! retry layers keep separate attempt counters and compose.

use async_trait::async_trait;

use crate::error::DownloadError;
use crate::types::TrackMetadata;

/// Search-style query derived from track metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchQuery(pub String);

impl FetchQuery {
    /// Derive the query for a track: credited artists plus title
    pub fn for_track(track: &TrackMetadata) -> Self {
        Self(track.display_label())
    }
}

impl std::fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiver for fractional per-fetch progress (0–100).
///
/// Passed by reference into every fetch call; implementations map the
/// fraction into the owning job's progress slice. No ambient context.
pub trait FetchProgress: Send + Sync {
    /// Called by the fetcher as the transfer advances
    fn on_progress(&self, percent: f32);
}

/// No-op progress receiver for callers that do not track sub-progress
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_progress(&self, _percent: f32) {}
}

/// The opaque fetch-and-transcode operation.
///
/// Implementations fail with a [`DownloadError::Fetch`] carrying a
/// human-readable message; classification (timeout, exhausted retries) is
/// applied by the retry envelope, not here.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Fetch one track, reporting fractional progress along the way
    async fn fetch(
        &self,
        query: &FetchQuery,
        track: &TrackMetadata,
        progress: &dyn FetchProgress,
    ) -> Result<Vec<u8>, DownloadError>;
}
