//! The persisted state of one video generation run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Segment, VideoId};

/// The six-phase state machine a run moves through, strictly forward except
/// for the retry loop inside `Generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Decomposing,
    Generating,
    Stitching,
    Audio,
    Merging,
    Transcoding,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Decomposing => "decomposing",
            RunPhase::Generating => "generating",
            RunPhase::Stitching => "stitching",
            RunPhase::Audio => "audio",
            RunPhase::Merging => "merging",
            RunPhase::Transcoding => "transcoding",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }

    /// The phase that immediately follows this one on the success path.
    /// Returns `None` for terminal phases.
    pub fn next(&self) -> Option<RunPhase> {
        match self {
            RunPhase::Decomposing => Some(RunPhase::Generating),
            RunPhase::Generating => Some(RunPhase::Stitching),
            RunPhase::Stitching => Some(RunPhase::Audio),
            RunPhase::Audio => Some(RunPhase::Merging),
            RunPhase::Merging => Some(RunPhase::Transcoding),
            RunPhase::Transcoding => Some(RunPhase::Completed),
            RunPhase::Completed | RunPhase::Failed => None,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of artifact a run may produce on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Silent, concatenated/crossfaded clip at the working resolution.
    Stitched720,
    /// Final delivery file with audio, at the working resolution.
    Final720,
    /// Final delivery file transcoded down to a lower quality tier.
    Final480,
    /// Standalone narration + music track.
    Audio,
    /// Poster frame extracted from the finished video.
    Thumbnail,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Stitched720 => "stitched_720",
            ArtifactKind::Final720 => "final_720",
            ArtifactKind::Final480 => "final_480",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Thumbnail => "thumbnail",
        }
    }
}

/// Metadata about a stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactInfo {
    /// Path on disk, relative to the video's storage root.
    pub path: String,
    /// Publicly reachable URL, if the artifact has been exposed for
    /// delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Container/codec short name, e.g. "mp4" or "aac".
    pub format: String,
    /// Duration in seconds, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Technical metadata describing the finished render.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
}

/// The full persisted state of one video generation run. This is the unit
/// that gets read back on crash recovery and written at the end of every
/// phase method.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRun {
    pub video_id: VideoId,
    pub user_id: String,
    pub prompt: String,

    pub phase: RunPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub segments: Vec<Segment>,

    /// Full narration script written for the whole video, synthesized once
    /// in the audio phase rather than per segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_script: Option<String>,

    pub files: HashMap<ArtifactKind, ArtifactInfo>,
    pub metadata: RunMetadata,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Monotonically increasing counter bumped on every persisted update,
    /// used to detect progress events arriving out of order.
    #[serde(default)]
    pub version: u64,
}

impl VideoRun {
    pub fn new(video_id: VideoId, user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            user_id: user_id.into(),
            prompt: prompt.into(),
            phase: RunPhase::Decomposing,
            title: None,
            segments: Vec::new(),
            narration_script: None,
            files: HashMap::new(),
            metadata: RunMetadata::default(),
            error_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Advance to the next phase in the success path, bumping the version
    /// and touching `updated_at`. Panics if called from a terminal phase --
    /// callers are expected to check `phase.is_terminal()` first.
    pub fn advance(&mut self) {
        self.phase = self
            .phase
            .next()
            .expect("advance() called from a terminal phase");
        self.touch();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = RunPhase::Failed;
        self.error_message = Some(message.into());
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn completed_segments(&self) -> usize {
        self.segments.iter().filter(|s| s.is_completed()).count()
    }

    pub fn all_segments_completed(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(|s| s.is_completed())
    }

    pub fn progress_fraction(&self) -> f64 {
        if self.segments.is_empty() {
            return match self.phase {
                RunPhase::Decomposing => 0.0,
                _ => 1.0,
            };
        }
        self.completed_segments() as f64 / self.total_segments() as f64
    }
}
