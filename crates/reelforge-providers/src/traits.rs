//! The three narrow client interfaces the orchestrator drives.
//!
//! Object-safe so worker code holds them as `Arc<dyn Trait>` and tests
//! substitute a mock without touching the network.

use async_trait::async_trait;
use reelforge_models::Scene;

use crate::error::ProviderResult;
use crate::types::{ContinuityHint, EnhancedPrompt, JobHandle, SegmentJobState, VoiceSettings};

#[async_trait]
pub trait StoryboardProvider: Send + Sync {
    /// Rewrite a raw user prompt into a richer description plus a short
    /// title, without changing its meaning.
    async fn enhance(&self, prompt: &str, target_duration: u32) -> ProviderResult<EnhancedPrompt>;

    /// Break a prompt into an ordered sequence of scenes covering
    /// `target_duration` seconds at `segment_duration` seconds each.
    async fn decompose(
        &self,
        prompt: &str,
        target_duration: u32,
        segment_duration: u32,
    ) -> ProviderResult<Vec<Scene>>;

    /// Write a narration script covering the given scenes.
    async fn write_narration(&self, prompt: &str, scenes: &[Scene], duration: u32) -> ProviderResult<String>;
}

#[async_trait]
pub trait VideoSegmentProvider: Send + Sync {
    /// Start an asynchronous video segment generation job.
    async fn start(
        &self,
        scene_prompt: &str,
        width: u32,
        height: u32,
        n_seconds: u32,
        continuity_hint: Option<ContinuityHint>,
    ) -> ProviderResult<JobHandle>;

    /// Poll the current state of a previously started job.
    async fn poll(&self, job: &JobHandle) -> ProviderResult<SegmentJobState>;

    /// Download the rendered clip bytes for a completed generation.
    async fn fetch_content(&self, generation_id: &str) -> ProviderResult<bytes::Bytes>;
}

#[async_trait]
pub trait NarrationProvider: Send + Sync {
    /// Synthesize speech audio (MP3 bytes) for a narration script.
    async fn synthesize(
        &self,
        script: &str,
        voice_id: &str,
        model: &str,
        settings: VoiceSettings,
    ) -> ProviderResult<bytes::Bytes>;

    /// Estimate spoken duration in seconds, used before synthesis actually
    /// runs to size the sync-verifier's tolerance check.
    fn estimate_duration(&self, text: &str) -> u32;
}
