//! Shared provider-facing types that don't belong in the core data model --
//! they describe provider wire shapes and call parameters, not persisted
//! run state.

use serde::{Deserialize, Serialize};

/// Result of `StoryboardProvider::enhance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedPrompt {
    pub enhanced_prompt: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub estimated_duration_secs: u32,
}

/// A continuity hint passed to `VideoSegmentProvider::start` so consecutive
/// segments look like one continuous shot. Providers that only accept text
/// conditioning get the text variant; image-conditioning providers get the
/// last frame of the previous segment.
#[derive(Debug, Clone)]
pub enum ContinuityHint {
    Image(std::path::PathBuf),
    Text(String),
}

/// Opaque handle to an in-flight segment generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self { job_id: job_id.into() }
    }
}

/// State of a polled segment generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SegmentJobState {
    Pending,
    Running,
    Succeeded { generation_ids: Vec<String> },
    Failed { error: String },
}

impl SegmentJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentJobState::Succeeded { .. } | SegmentJobState::Failed { .. })
    }
}

/// Voice synthesis parameters passed to `NarrationProvider::synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    #[serde(default)]
    pub style: f32,
    #[serde(default = "default_speaker_boost")]
    pub use_speaker_boost: bool,
}

fn default_speaker_boost() -> bool {
    true
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}
