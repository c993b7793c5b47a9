//! Core types for track-dl

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a job
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Opaque routing identifier for progress delivery (e.g. a chat session).
///
/// Jobs without a push target carry `None` instead of a sentinel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerRef(pub i64);

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of request a job was created from.
///
/// Carried as a descriptive tag; output packaging follows the item count
/// (one item = raw stream, several = archive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A single track
    Track,
    /// An album or playlist spanning several tracks
    Collection,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemKind::Track => "track",
            ItemKind::Collection => "collection",
        };
        write!(f, "{s}")
    }
}

/// Job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created and waiting in the queue
    Pending,
    /// Admitted by the dispatcher, items being fetched
    Processing,
    /// Terminal: artifact stored (possibly with a partial-failure manifest)
    Completed,
    /// Terminal: structural failure, cancellation, or every item failed
    Failed,
}

impl Status {
    /// Whether this status is terminal (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Metadata describing one track, as returned by the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Catalog identifier of the track
    pub id: String,
    /// Display title
    pub title: String,
    /// Track duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Album or collection name
    pub album: String,
    /// Artists in credited order
    pub artists: Vec<String>,
    /// Preview clip URL, if the catalog provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Cover art URL, if the catalog provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl TrackMetadata {
    /// Display label combining credited artists and title
    pub fn display_label(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artists.join(", "), self.title)
        }
    }
}

/// Point-in-time snapshot of a job, returned by status queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStatus {
    /// Job identifier
    pub id: JobId,
    /// Request kind the job was created from
    pub item_kind: ItemKind,
    /// Current lifecycle status
    pub status: Status,
    /// Progress percentage in [0, 100]
    pub progress: f32,
    /// Display label of the in-flight item, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    /// Items finished so far (success or accounted failure)
    pub completed_count: usize,
    /// Total items in the job
    pub total_count: usize,
    /// Error message, present only when status is Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Duration <-> integer milliseconds serialization
pub(crate) mod duration_millis {
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
