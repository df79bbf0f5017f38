//! `POST /prompts/enhance`, `POST /prompts/decompose`: thin passthroughs to
//! the `StoryboardProvider`, exposed so a client can preview a prompt
//! rewrite or storyboard before committing to `POST /videos/create`.

use axum::extract::State;
use axum::Json;
use reelforge_models::{Scene, SEGMENT_DURATION_SECS};
use reelforge_providers::EnhancedPrompt;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::security::sanitize_string;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub prompt: String,
    #[serde(default)]
    pub target_duration_secs: Option<u32>,
}

/// `POST /prompts/enhance`.
pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(req): Json<EnhanceRequest>,
) -> ApiResult<Json<EnhancedPrompt>> {
    let prompt = sanitize_string(req.prompt.trim());
    let target_duration = req.target_duration_secs.unwrap_or(60);
    let enhanced = state.storyboard.enhance(&prompt, target_duration).await?;
    Ok(Json(enhanced))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposeRequest {
    pub prompt: String,
    #[serde(default)]
    pub target_duration_secs: Option<u32>,
    #[serde(default)]
    pub segment_duration_secs: Option<u32>,
}

/// `POST /prompts/decompose`.
pub async fn decompose_prompt(
    State(state): State<AppState>,
    Json(req): Json<DecomposeRequest>,
) -> ApiResult<Json<Vec<Scene>>> {
    let prompt = sanitize_string(req.prompt.trim());
    let target_duration = req.target_duration_secs.unwrap_or(60);
    let segment_duration = req
        .segment_duration_secs
        .unwrap_or(SEGMENT_DURATION_SECS as u32);
    let scenes = state
        .storyboard
        .decompose(&prompt, target_duration, segment_duration)
        .await?;
    Ok(Json(scenes))
}
