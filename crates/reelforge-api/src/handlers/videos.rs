//! `POST /videos/create`, `GET /videos/:id`, `.../status`, `.../segments`,
//! `POST .../cancel`, `DELETE /videos/:id`.
//!
//! Each handler is a thin projection over the `VideoRunRepository`, plus a
//! `JobStatusCache` read where the Redis-cached progress snapshot is
//! fresher than what has been persisted to the document store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reelforge_models::{
    video_id_for_request, GenerateVideoJob, RunPhase, SegmentStatus, VideoId, VideoRun, VideoSpec,
};

use crate::error::{ApiError, ApiResult};
use crate::security::{is_valid_video_id, sanitize_string, sanitize_title};
use crate::state::AppState;

/// Mirrors `reelforge_worker::orchestrator::CANCEL_MESSAGE`. Duplicated here
/// rather than pulling in the worker crate as a dependency for one string --
/// the two sides agree on this literal as the cancellation signal written
/// into `VideoRun::error_message`.
const CANCEL_MESSAGE: &str = "cancelled by user";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    pub prompt: String,
    #[serde(default)]
    pub original_prompt: Option<String>,
    pub duration: f64,
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Pre-supplied scenes, skipping storyboard decomposition. Not yet
    /// wired into `VideoSpec` -- see DESIGN.md for the open-question
    /// resolution. Rejected explicitly rather than silently ignored.
    #[serde(default)]
    pub scenes: Option<Vec<serde_json::Value>>,
    /// Idempotency key. Submitting the same key twice returns the existing
    /// run instead of starting a new one.
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoResponse {
    pub id: String,
    pub title: String,
    pub target_duration: f64,
    pub segment_count: u32,
    pub status: String,
}

/// `POST /videos/create`.
pub async fn create_video(
    State(state): State<AppState>,
    Json(req): Json<CreateVideoRequest>,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    if req.duration < reelforge_models::MIN_DURATION_SECS || req.duration > reelforge_models::MAX_DURATION_SECS {
        return Err(ApiError::validation(format!(
            "duration must be between {} and {} seconds",
            reelforge_models::MIN_DURATION_SECS,
            reelforge_models::MAX_DURATION_SECS
        )));
    }
    if req.prompt.trim().is_empty() {
        return Err(ApiError::validation("prompt must not be empty"));
    }
    if req.scenes.as_ref().is_some_and(|s| !s.is_empty()) {
        return Err(ApiError::validation(
            "pre-supplied scenes are not supported; omit `scenes` and let the storyboard provider decompose the prompt",
        ));
    }

    // Best-effort early rejection. True mutual exclusion is still the
    // orchestrator's lock acquire -- a narrow race where two creates both
    // see the lock free just means both get queued, and the queue (not a
    // second 503) serializes them past this point.
    if let Some(lock) = state
        .lock_repo
        .status(reelforge_models::DEFAULT_LOCK_KEY)
        .await?
    {
        if !lock.is_expired() {
            return Err(ApiError::Busy);
        }
    }

    let prompt = sanitize_string(req.prompt.trim());
    let request_id = req.request_id.unwrap_or_else(Uuid::new_v4);
    let video_id = video_id_for_request(&request_id);

    if let Some(existing) = state.run_repo.get(&video_id).await? {
        return Ok((
            StatusCode::OK,
            Json(CreateVideoResponse {
                id: existing.video_id.as_str().to_string(),
                title: existing.title.unwrap_or_default(),
                target_duration: req.duration,
                segment_count: existing.total_segments() as u32,
                status: existing.phase.as_str().to_string(),
            }),
        ));
    }

    let user_id = req
        .original_prompt
        .as_deref()
        .map(sanitize_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "anonymous".to_string());

    let mut spec = VideoSpec::new(prompt.clone(), user_id.clone());
    spec.request_id = request_id;
    spec.target_duration_secs = Some(req.duration);
    spec.voice_id = req.voice_id.clone();

    let title = sanitize_title(&prompt);
    let segment_count =
        (req.duration / reelforge_models::SEGMENT_DURATION_SECS).ceil().max(1.0) as u32;

    let mut run = VideoRun::new(video_id.clone(), user_id, prompt);
    run.title = Some(title.clone());

    match state.run_repo.create(&run).await {
        Ok(()) => {}
        Err(reelforge_store::FirestoreError::AlreadyExists(_)) => {
            if let Some(existing) = state.run_repo.get(&video_id).await? {
                return Ok((
                    StatusCode::OK,
                    Json(CreateVideoResponse {
                        id: existing.video_id.as_str().to_string(),
                        title: existing.title.unwrap_or_default(),
                        target_duration: req.duration,
                        segment_count: existing.total_segments() as u32,
                        status: existing.phase.as_str().to_string(),
                    }),
                ));
            }
        }
        Err(e) => return Err(e.into()),
    }

    let job = GenerateVideoJob::new(video_id.clone(), spec);
    state.queue.enqueue(job).await?;
    crate::metrics::record_job_enqueued();

    Ok((
        StatusCode::CREATED,
        Json(CreateVideoResponse {
            id: video_id.as_str().to_string(),
            title,
            target_duration: req.duration,
            segment_count,
            status: "pending".to_string(),
        }),
    ))
}

fn parse_video_id(raw: &str) -> ApiResult<VideoId> {
    if !is_valid_video_id(raw) {
        return Err(ApiError::bad_request("invalid video id"));
    }
    Ok(VideoId::from_string(raw.to_string()))
}

/// `GET /videos/:id` -- the full `VideoRun` projection.
pub async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<VideoRun>> {
    let video_id = parse_video_id(&id)?;
    let run = state
        .run_repo
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;
    Ok(Json(run))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub status: String,
    pub progress: u32,
    pub current_phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_segment: Option<u32>,
    pub segment_count: u32,
    pub completed_segments: u32,
    pub failed_segments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub is_processing: bool,
}

/// `GET /videos/:id/status`.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let video_id = parse_video_id(&id)?;
    let run = state
        .run_repo
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;

    let job_status = state.progress.get_job_status(&video_id).await.ok().flatten();

    let completed_segments = run.completed_segments() as u32;
    let failed_segments = run
        .segments
        .iter()
        .filter(|s| s.status == SegmentStatus::Failed)
        .count() as u32;
    let current_segment = run
        .segments
        .iter()
        .position(|s| s.status == SegmentStatus::Generating)
        .map(|i| i as u32);

    let progress = job_status
        .as_ref()
        .map(|j| j.progress as u32)
        .unwrap_or_else(|| (run.progress_fraction() * 100.0).round() as u32);

    let is_processing = !run.phase.is_terminal();
    let status = if run.phase.is_terminal() {
        run.phase.as_str().to_string()
    } else {
        "processing".to_string()
    };

    Ok(Json(VideoStatusResponse {
        status,
        progress,
        current_phase: run.phase.as_str().to_string(),
        current_segment,
        segment_count: run.total_segments() as u32,
        completed_segments,
        failed_segments,
        error_message: run.error_message,
        is_processing,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentProjection {
    pub index: u32,
    pub status: String,
    pub progress: u32,
    pub visual_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// `GET /videos/:id/segments`.
pub async fn get_video_segments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SegmentProjection>>> {
    let video_id = parse_video_id(&id)?;
    let run = state
        .run_repo
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;

    let projections = run
        .segments
        .iter()
        .map(|seg| SegmentProjection {
            index: seg.scene.index,
            status: seg.status.as_str().to_string(),
            progress: match seg.status {
                SegmentStatus::Completed => 100,
                SegmentStatus::Generating => 50,
                SegmentStatus::Pending | SegmentStatus::Failed => 0,
            },
            visual_prompt: seg.scene.visual_prompt.clone(),
            clip_path: seg.clip_path.clone(),
            last_error: seg.last_error.clone(),
        })
        .collect();

    Ok(Json(projections))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// `POST /videos/:id/cancel`.
///
/// Writes the cancellation signal the orchestrator's `check_cancelled`
/// polls for between phases and between segments, rather than reaching
/// into the worker process directly -- API and worker are separate
/// deployables that only share the document store and the queue.
pub async fn cancel_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let video_id = parse_video_id(&id)?;
    let (mut run, update_time) = state
        .run_repo
        .get_with_version(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;

    if run.phase.is_terminal() {
        return Ok(Json(CancelResponse { cancelled: false }));
    }

    run.fail(CANCEL_MESSAGE);
    state.run_repo.put(&run, update_time.as_deref()).await?;

    Ok(Json(CancelResponse { cancelled: true }))
}

/// `DELETE /videos/:id`. Refuses to delete a still-processing run.
pub async fn delete_video(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let video_id = parse_video_id(&id)?;
    let run = state
        .run_repo
        .get(&video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {id} not found")))?;

    if !run.phase.is_terminal() {
        return Err(ApiError::conflict("cannot delete a video that is still processing"));
    }

    state
        .storage
        .delete_subtree(&run.user_id, video_id.as_str())
        .await?;
    state.run_repo.delete(&video_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_progress_matches_spec_derivation() {
        use reelforge_models::{Scene, Segment};

        let mut seg = Segment::new(Scene::new(0, "a cat", 0.0, 12.0));
        seg.status = SegmentStatus::Generating;
        let proj = SegmentProjection {
            index: seg.scene.index,
            status: seg.status.as_str().to_string(),
            progress: match seg.status {
                SegmentStatus::Completed => 100,
                SegmentStatus::Generating => 50,
                SegmentStatus::Pending | SegmentStatus::Failed => 0,
            },
            visual_prompt: seg.scene.visual_prompt.clone(),
            clip_path: None,
            last_error: None,
        };
        assert_eq!(proj.progress, 50);
    }
}
