//! The catalog lookup seam.
//!
//! Metadata comes from an external catalog service behind the
//! [`CatalogProvider`] trait. Responses with different shapes (one track
//! vs a collection of tracks) are modeled as a closed tagged union,
//! [`CatalogEntity`], mapped through one pure function per shape.
//!
//! Catalog failures are fatal to job creation; this layer never retries.
//!
//! Providers that authenticate with short-lived credentials can own a
//! [`spawn_token_refresher`] background task instead of sharing mutable
//! global token state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{ItemKind, TrackMetadata};

/// Read-only view of the external track catalog
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Look up a single track by catalog id
    async fn get_track(&self, id: &str) -> Result<TrackMetadata>;

    /// Look up a collection (album/playlist) by catalog id
    async fn get_collection(&self, id: &str) -> Result<Vec<TrackMetadata>>;

    /// Free-text search, best match first
    async fn search(&self, text: &str) -> Result<Vec<TrackMetadata>>;
}

/// Closed set of catalog response shapes
#[derive(Clone, Debug)]
pub enum CatalogEntity {
    /// A single track
    Track(TrackMetadata),
    /// An ordered collection of tracks
    Collection(Vec<TrackMetadata>),
}

impl CatalogEntity {
    /// The job item-kind this shape maps to
    pub fn item_kind(&self) -> ItemKind {
        match self {
            CatalogEntity::Track(_) => ItemKind::Track,
            CatalogEntity::Collection(_) => ItemKind::Collection,
        }
    }

    /// Flatten into the ordered item list a job is built from
    pub fn into_items(self) -> Vec<TrackMetadata> {
        match self {
            CatalogEntity::Track(track) => map_track(track),
            CatalogEntity::Collection(tracks) => map_collection(tracks),
        }
    }
}

/// Shape mapper: single track -> item list
fn map_track(track: TrackMetadata) -> Vec<TrackMetadata> {
    vec![track]
}

/// Shape mapper: collection -> item list, submission order preserved
fn map_collection(tracks: Vec<TrackMetadata>) -> Vec<TrackMetadata> {
    tracks
}

/// Source of refreshable credentials for a catalog client.
///
/// `refresh` performs one credential renewal and reports how long the new
/// credential remains valid.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Renew the credential, returning its validity window
    async fn refresh(&self) -> Result<Duration>;
}

/// Delay before retrying after a failed credential refresh
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Fraction of the validity window after which to refresh proactively
const REFRESH_HEADROOM: f64 = 0.8;

/// Spawn a background task that keeps a catalog credential fresh.
///
/// The next-refresh deadline is recomputed on both paths: after a
/// successful refresh the task sleeps for 80% of the reported validity
/// window; after a failure it retries on a short fixed delay. The task
/// exits when the token is cancelled.
pub fn spawn_token_refresher(
    source: Arc<dyn TokenSource>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = match source.refresh().await {
                Ok(valid_for) => {
                    let delay = valid_for.mul_f64(REFRESH_HEADROOM);
                    tracing::debug!(
                        valid_secs = valid_for.as_secs(),
                        next_refresh_secs = delay.as_secs(),
                        "Catalog credential refreshed"
                    );
                    delay
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Catalog credential refresh failed, will retry");
                    REFRESH_RETRY_DELAY
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_token.cancelled() => {
                    tracing::debug!("Token refresher stopping");
                    break;
                }
            }
        }
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn track(n: usize) -> TrackMetadata {
        TrackMetadata {
            id: format!("t{n}"),
            title: format!("Track {n}"),
            duration: Duration::from_secs(180),
            album: "Album".into(),
            artists: vec!["Artist".into()],
            preview_url: None,
            cover_url: None,
        }
    }

    #[test]
    fn track_shape_maps_to_single_item() {
        let entity = CatalogEntity::Track(track(1));
        assert_eq!(entity.item_kind(), ItemKind::Track);
        let items = entity.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "t1");
    }

    #[test]
    fn collection_shape_preserves_order() {
        let entity = CatalogEntity::Collection(vec![track(1), track(2), track(3)]);
        assert_eq!(entity.item_kind(), ItemKind::Collection);
        let items = entity.into_items();
        let ids: Vec<&str> = items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    struct CountingSource {
        calls: AtomicU32,
        fail_first: bool,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn refresh(&self) -> Result<Duration> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                Err(Error::Catalog("auth rejected".into()))
            } else {
                // Tiny validity window so the test observes re-refreshes
                Ok(Duration::from_millis(50))
            }
        }
    }

    #[tokio::test]
    async fn refresher_re_refreshes_before_expiry() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail_first: false,
        });
        let cancel_token = CancellationToken::new();
        let handle = spawn_token_refresher(source.clone(), cancel_token.clone());

        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel_token.cancel();
        handle.await.unwrap();

        assert!(
            source.calls.load(Ordering::SeqCst) >= 3,
            "should have refreshed several times within 300ms at a 50ms window"
        );
    }

    #[tokio::test]
    async fn refresher_survives_a_failed_refresh() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail_first: true,
        });
        let cancel_token = CancellationToken::new();
        let handle = spawn_token_refresher(source.clone(), cancel_token.clone());

        // First refresh fails immediately; the task must stay alive
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished(), "refresher must not exit on failure");

        cancel_token.cancel();
        handle.await.unwrap();
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn refresher_stops_on_cancellation() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail_first: false,
        });
        let cancel_token = CancellationToken::new();
        let handle = spawn_token_refresher(source, cancel_token.clone());

        cancel_token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "refresher should stop promptly");
    }
}
