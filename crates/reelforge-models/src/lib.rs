//! Shared data models for the Reelforge processing orchestrator.
//!
//! This crate provides Serde-serializable types for:
//! - Video generation requests (`VideoSpec`) and storyboards (`Scene`)
//! - Per-segment render state (`Segment`) and the aggregate run (`VideoRun`)
//! - The exclusive processing lock (`ProcessingLock`)
//! - The segment cache manifest (`CacheEntry`)
//! - Queue job and progress event schemas shared between the API and worker

pub mod cache_entry;
pub mod job;
pub mod job_status;
pub mod lock;
pub mod progress;
pub mod scene;
pub mod segment;
pub mod video_run;
pub mod video_spec;

pub use cache_entry::{CacheEntry, CACHE_MANIFEST_VERSION};
pub use job::JobId;
pub use job_status::{JobStatus, JobStatusCache};
pub use lock::{ProcessingLock, DEFAULT_LOCK_KEY, DEFAULT_LOCK_TTL_SECS};
pub use progress::{GenerateVideoJob, ProgressEvent};
pub use scene::{Scene, Storyboard, TransitionType};
pub use segment::{Segment, SegmentStatus};
pub use video_run::{ArtifactInfo, ArtifactKind, RunMetadata, RunPhase, VideoRun};
pub use video_spec::{video_id_for_request, VideoSpec, MAX_DURATION_SECS, MIN_DURATION_SECS, SEGMENT_DURATION_SECS};

/// Unique identifier for a video processing run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
