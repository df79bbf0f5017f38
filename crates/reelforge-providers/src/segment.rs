//! HTTP-backed `VideoSegmentProvider`: start an async generation job, poll
//! it, then download the finished clip. A thin `reqwest::Client` wrapper
//! reading `VIDEO_SEGMENT_API_KEY`/`VIDEO_SEGMENT_API_BASE` from the
//! environment.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::VideoSegmentProvider;
use crate::types::{ContinuityHint, JobHandle, SegmentJobState};

pub struct HttpVideoSegmentProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl HttpVideoSegmentProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self { client: Client::new(), api_key: api_key.into(), api_base: api_base.into() }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("VIDEO_SEGMENT_API_KEY")
            .map_err(|_| ProviderError::config("VIDEO_SEGMENT_API_KEY not set"))?;
        let api_base = std::env::var("VIDEO_SEGMENT_API_BASE")
            .unwrap_or_else(|_| "https://api.example-video-gen.com/v1".to_string());
        Ok(Self::new(api_key, api_base))
    }
}

#[async_trait]
impl VideoSegmentProvider for HttpVideoSegmentProvider {
    async fn start(
        &self,
        scene_prompt: &str,
        width: u32,
        height: u32,
        n_seconds: u32,
        continuity_hint: Option<ContinuityHint>,
    ) -> ProviderResult<JobHandle> {
        let mut request = StartRequest {
            prompt: scene_prompt.to_string(),
            width,
            height,
            seconds: n_seconds,
            image_base64: None,
            prompt_suffix: None,
        };

        match continuity_hint {
            Some(ContinuityHint::Image(path)) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| ProviderError::RequestFailed(format!("reading continuity frame {:?}: {}", path, e)))?;
                request.image_base64 = Some(base64_encode(&bytes));
            }
            Some(ContinuityHint::Text(hint)) => {
                request.prompt_suffix = Some(hint);
            }
            None => {}
        }

        let url = format!("{}/generations", self.api_base);
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&request).send().await?;

        if response.status() == 429 {
            return Err(ProviderError::RateLimited("video segment generation rate limited".into()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::bad_response(status, body));
        }

        let parsed: StartResponse = response.json().await?;
        debug!("started segment generation job {}", parsed.id);
        Ok(JobHandle::new(parsed.id))
    }

    async fn poll(&self, job: &JobHandle) -> ProviderResult<SegmentJobState> {
        let url = format!("{}/generations/{}", self.api_base, job.job_id);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await?;

        if response.status() == 404 {
            return Err(ProviderError::JobNotFound(job.job_id.clone()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::bad_response(status, body));
        }

        let parsed: PollResponse = response.json().await?;
        Ok(match parsed.status.as_str() {
            "pending" | "queued" => SegmentJobState::Pending,
            "running" | "processing" => SegmentJobState::Running,
            "succeeded" | "completed" => SegmentJobState::Succeeded {
                generation_ids: parsed.generation_ids.unwrap_or_else(|| vec![job.job_id.clone()]),
            },
            "failed" | "error" => SegmentJobState::Failed { error: parsed.error.unwrap_or_else(|| "unknown error".into()) },
            other => SegmentJobState::Failed { error: format!("unrecognized status: {other}") },
        })
    }

    async fn fetch_content(&self, generation_id: &str) -> ProviderResult<bytes::Bytes> {
        let url = format!("{}/generations/{}/content", self.api_base, generation_id);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::bad_response(status, body));
        }

        Ok(response.bytes().await?)
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[derive(Debug, Serialize)]
struct StartRequest {
    prompt: String,
    width: u32,
    height: u32,
    seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    generation_ids: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}
