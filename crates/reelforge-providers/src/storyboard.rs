//! HTTP-backed `StoryboardProvider`, in the shape of a Gemini-style REST
//! client: JSON request body, API key as a query parameter, a response
//! wrapped in `candidates[0].content.parts[0].text` that may itself be
//! fenced in a ```json code block.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reelforge_models::Scene;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::StoryboardProvider;
use crate::types::EnhancedPrompt;

const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.5-flash-lite"];

pub struct HttpStoryboardProvider {
    client: Client,
    api_key: String,
    api_base: String,
    models: Vec<String>,
}

impl HttpStoryboardProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            models: DEFAULT_MODELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("STORYBOARD_API_KEY")
            .map_err(|_| ProviderError::config("STORYBOARD_API_KEY not set"))?;
        let mut provider = Self::new(api_key);
        if let Ok(base) = std::env::var("STORYBOARD_API_BASE") {
            provider.api_base = base;
        }
        Ok(provider)
    }

    async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        let mut last_error = None;

        for model in &self.models {
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("storyboard model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::RequestFailed("no models configured".into())))
    }

    async fn call_model(&self, model: &str, prompt: &str) -> ProviderResult<String> {
        let url = format!("{}/{}:generateContent?key={}", self.api_base, model, self.api_key);

        let request = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
            generation_config: GenerationConfig { response_mime_type: "application/json".to_string() },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if response.status() == 429 {
            return Err(ProviderError::RateLimited(format!("{} rate limited", model)));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::bad_response(status, body));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::ParseFailed("empty response".into()))?;

        Ok(strip_markdown_fence(&text))
    }
}

fn strip_markdown_fence(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim().to_string()
}

#[async_trait]
impl StoryboardProvider for HttpStoryboardProvider {
    async fn enhance(&self, prompt: &str, target_duration: u32) -> ProviderResult<EnhancedPrompt> {
        let ask = format!(
            "Rewrite the following video prompt into a richer visual description and a \
             short title, without changing its meaning. Return ONLY a JSON object with keys \
             enhanced_prompt, title, keywords (array of strings), estimated_duration_secs \
             (integer, close to {target_duration}).\n\nPrompt: {prompt}"
        );

        let text = self.generate(&ask).await?;
        debug!("enhance response: {}", text);
        serde_json::from_str(&text).map_err(|e| ProviderError::ParseFailed(e.to_string()))
    }

    async fn decompose(&self, prompt: &str, target_duration: u32, segment_duration: u32) -> ProviderResult<Vec<Scene>> {
        let n = (target_duration as f64 / segment_duration as f64).ceil() as u32;
        let ask = format!(
            "Break the following video prompt into exactly {n} scenes of roughly \
             {segment_duration} seconds each. Return ONLY a JSON array of {n} objects, each \
             with keys visual_prompt (string), narration (string, spoken line for this scene), \
             continuity_notes (string, lighting/subject continuity from the previous scene, \
             empty for the first scene).\n\nPrompt: {prompt}"
        );

        let text = self.generate(&ask).await?;
        let raw: Vec<RawScene> = serde_json::from_str(&text).map_err(|e| ProviderError::ParseFailed(e.to_string()))?;

        info!("decomposed prompt into {} scenes", raw.len());
        Ok(build_scenes(raw, segment_duration))
    }

    async fn write_narration(&self, prompt: &str, scenes: &[Scene], duration: u32) -> ProviderResult<String> {
        let scene_lines: Vec<String> = scenes
            .iter()
            .map(|s| format!("Scene {}: {}", s.index + 1, s.visual_prompt))
            .collect();

        let ask = format!(
            "Write a narration script for a {duration}-second video about: {prompt}\n\n\
             The video has these scenes in order:\n{}\n\n\
             Return ONLY the narration text, no scene labels, no markdown.",
            scene_lines.join("\n")
        );

        let text = self.generate(&ask).await?;
        Ok(text.trim().to_string())
    }
}

/// Build contiguous, ordered `Scene`s from the provider's per-scene
/// descriptions. Timing and ordering are computed here rather than trusted
/// from the model, since they must be exact.
fn build_scenes(raw: Vec<RawScene>, segment_duration: u32) -> Vec<Scene> {
    let n = raw.len() as u32;
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| {
            let i = i as u32;
            let start = (i * segment_duration) as f64;
            let end = if i + 1 == n { start + segment_duration as f64 } else { start + segment_duration as f64 };
            let mut scene = Scene::new(i, r.visual_prompt, start, end);
            scene.narration = r.narration;
            if !r.continuity_notes.is_empty() {
                scene.continuity_notes = Some(r.continuity_notes);
            }
            scene
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawScene {
    visual_prompt: String,
    #[serde(default)]
    narration: String,
    #[serde(default)]
    continuity_notes: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markdown_fence_unwraps_json_block() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_markdown_fence(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn strip_markdown_fence_passes_through_plain_text() {
        assert_eq!(strip_markdown_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn build_scenes_produces_contiguous_ranges() {
        let raw = vec![
            RawScene { visual_prompt: "a".into(), narration: "one".into(), continuity_notes: String::new() },
            RawScene { visual_prompt: "b".into(), narration: "two".into(), continuity_notes: "same lighting".into() },
        ];
        let scenes = build_scenes(raw, 12);
        assert_eq!(scenes[0].start_time_secs, 0.0);
        assert_eq!(scenes[0].end_time_secs, 12.0);
        assert_eq!(scenes[1].start_time_secs, 12.0);
        assert_eq!(scenes[1].end_time_secs, 24.0);
        assert_eq!(scenes[1].continuity_notes.as_deref(), Some("same lighting"));
    }
}
