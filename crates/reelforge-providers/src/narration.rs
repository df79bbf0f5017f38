//! HTTP-backed `NarrationProvider`: text-to-speech synthesis, in the shape
//! of an ElevenLabs-style REST client (voice ID in the path, settings in
//! the JSON body, MP3 bytes back).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::NarrationProvider;
use crate::types::VoiceSettings;

/// Average spoken words per second used by `estimate_duration`.
const WORDS_PER_SECOND: f64 = 2.5;

pub struct HttpNarrationProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl HttpNarrationProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: "https://api.elevenlabs.io/v1".to_string(),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("NARRATION_API_KEY")
            .map_err(|_| ProviderError::config("NARRATION_API_KEY not set"))?;
        let mut provider = Self::new(api_key);
        if let Ok(base) = std::env::var("NARRATION_API_BASE") {
            provider.api_base = base;
        }
        Ok(provider)
    }
}

#[async_trait]
impl NarrationProvider for HttpNarrationProvider {
    async fn synthesize(&self, script: &str, voice_id: &str, model: &str, settings: VoiceSettings) -> ProviderResult<bytes::Bytes> {
        let url = format!("{}/text-to-speech/{}", self.api_base, voice_id);

        let body = SynthesizeRequest {
            text: script.to_string(),
            model_id: model.to_string(),
            voice_settings: settings,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status() == 429 {
            return Err(ProviderError::RateLimited("narration synthesis rate limited".into()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::bad_response(status, error_body));
        }

        Ok(response.bytes().await?)
    }

    fn estimate_duration(&self, text: &str) -> u32 {
        let word_count = text.split_whitespace().count() as f64;
        (word_count / WORDS_PER_SECOND).ceil() as u32
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest {
    text: String,
    model_id: String,
    voice_settings: VoiceSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_duration_rounds_up_from_word_count() {
        let provider = HttpNarrationProvider::new("test-key");
        // 5 words / 2.5 wps = 2.0s exactly.
        assert_eq!(provider.estimate_duration("one two three four five"), 2);
        // 6 words / 2.5 wps = 2.4s, ceil to 3.
        assert_eq!(provider.estimate_duration("one two three four five six"), 3);
    }

    #[test]
    fn estimate_duration_handles_empty_text() {
        let provider = HttpNarrationProvider::new("test-key");
        assert_eq!(provider.estimate_duration(""), 0);
    }
}
