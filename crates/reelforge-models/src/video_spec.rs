//! Input specification for a video generation run.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::VideoId;

/// Minimum total duration accepted for a generated video, in seconds.
pub const MIN_DURATION_SECS: f64 = 5.0;
/// Maximum total duration accepted for a generated video, in seconds.
pub const MAX_DURATION_SECS: f64 = 120.0;
/// Duration of a single rendered segment, in seconds (provider limit).
pub const SEGMENT_DURATION_SECS: f64 = 12.0;

/// Request payload for starting a new video generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VideoSpec {
    /// Idempotency key supplied by the caller. Submitting the same request
    /// ID twice returns the existing run instead of starting a new one.
    pub request_id: Uuid,

    /// The user-supplied text prompt describing the video to generate.
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,

    /// Target total duration in seconds. Falls back to a storyboard-chosen
    /// duration when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration_secs: Option<f64>,

    /// Requested narration voice, if any. Providers fall back to a default
    /// voice when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Owning user, used only for storage/quota attribution, never for
    /// credential checks.
    pub user_id: String,

    /// When this spec was accepted by the API.
    pub created_at: DateTime<Utc>,
}

impl VideoSpec {
    pub fn new(prompt: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            prompt: prompt.into(),
            target_duration_secs: None,
            voice_id: None,
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Duration the storyboard decomposition should aim for, clamped to the
    /// accepted range.
    pub fn requested_duration_secs(&self) -> f64 {
        self.target_duration_secs
            .unwrap_or(MAX_DURATION_SECS / 2.0)
            .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
    }
}

/// Generate the deterministic video ID a given request ID maps to, so that
/// duplicate submissions resolve to the same run without a lookup.
pub fn video_id_for_request(request_id: &Uuid) -> VideoId {
    VideoId::from_string(request_id.to_string())
}
