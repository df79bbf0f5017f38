//! Queue job and progress event schemas shared between the API and worker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{RunPhase, VideoId, VideoSpec};

/// Job enqueued onto the submission stream. Collapsed to a single variant
/// since the orchestrator only ever does one thing: drive a `VideoSpec`
/// through to a finished `VideoRun`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[non_exhaustive]
pub struct GenerateVideoJob {
    pub job_id: crate::JobId,
    pub video_id: VideoId,
    pub user_id: String,
    pub spec: VideoSpec,
}

impl GenerateVideoJob {
    pub fn new(video_id: VideoId, spec: VideoSpec) -> Self {
        let user_id = spec.user_id.clone();
        Self {
            job_id: crate::JobId::new(),
            video_id,
            user_id,
            spec,
        }
    }
}

/// A single progress update published over the video's progress channel.
/// Consumers (polling handlers, potential websocket bridges) use `seq` to
/// discard updates that arrive out of order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub video_id: VideoId,
    pub phase: RunPhase,
    /// Overall progress in [0.0, 1.0].
    pub progress: f64,
    /// Segment index this update concerns, when phase-specific.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp_ms: i64,
    pub seq: u64,
}

impl ProgressEvent {
    pub fn new(video_id: VideoId, phase: RunPhase, progress: f64, seq: u64) -> Self {
        Self {
            video_id,
            phase,
            progress: progress.clamp(0.0, 1.0),
            segment: None,
            message: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            seq,
        }
    }

    pub fn with_segment(mut self, segment: u32) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
