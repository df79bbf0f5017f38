//! Per-scene render state tracked through the generating phase.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Scene;

/// Lifecycle of a single segment's clip generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::Generating => "generating",
            SegmentStatus::Completed => "completed",
            SegmentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Completed | SegmentStatus::Failed)
    }
}

/// One storyboard scene plus the bookkeeping needed to render, retry and
/// cache its clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub scene: Scene,

    #[serde(default)]
    pub status: SegmentStatus,

    /// Number of generation attempts made so far (including the first).
    /// `retry_count()` below reports attempts beyond the first.
    #[serde(default)]
    pub attempts: u32,

    /// The provider's job identifier for the in-flight or most recent
    /// attempt, persisted the moment the provider returns it so a crash
    /// mid-generation still leaves a resumable hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Path to the rendered clip on disk once completed, relative to the
    /// video's storage root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<String>,

    /// Path to this segment's extracted last frame, relative to the video's
    /// storage root. Populated only for completed, non-final segments -- it
    /// is the continuity hint passed to the next segment's generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_path: Option<String>,

    /// Content-addressed cache key of the rendered clip, present once a
    /// cache lookup or store has happened for this segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,

    /// Error message from the most recent failed attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Segment {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            status: SegmentStatus::Pending,
            attempts: 0,
            job_id: None,
            clip_path: None,
            last_frame_path: None,
            cache_key: None,
            last_error: None,
        }
    }

    /// Mark the segment as starting a new attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.status = SegmentStatus::Generating;
    }

    /// Attempts beyond the first.
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Persist the provider's job handle for the attempt in progress.
    pub fn set_job_id(&mut self, job_id: impl Into<String>) {
        self.job_id = Some(job_id.into());
    }

    /// Mark the segment completed with the given clip path.
    pub fn complete(&mut self, clip_path: impl Into<String>, cache_key: Option<String>) {
        self.status = SegmentStatus::Completed;
        self.clip_path = Some(clip_path.into());
        self.cache_key = cache_key;
        self.last_error = None;
    }

    /// Record the continuity-hint frame extracted after completion. Only
    /// called for segments that have a successor.
    pub fn set_last_frame(&mut self, path: impl Into<String>) {
        self.last_frame_path = Some(path.into());
    }

    /// Mark the segment failed with the given error. Does not advance
    /// `attempts` -- callers increment that via `begin_attempt`.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SegmentStatus::Failed;
        self.last_error = Some(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status == SegmentStatus::Completed
    }
}
