//! `GET /system/status`: processing lock state, storage disk estimate, and
//! segment cache statistics in one call, grounded on the `ProcessingLockRepository::status`,
//! `LocalStorage::estimate_disk_usage` and `SegmentCache::stats` the
//! worker's recovery path and the cache's own cleanup sweep already use.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub held: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub bytes_used: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub entry_count: usize,
    pub total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusResponse {
    pub lock: LockStatus,
    pub storage: StorageStatus,
    pub cache: CacheStatus,
    pub queue_length: u64,
    pub dlq_length: u64,
}

/// `GET /system/status`.
pub async fn system_status(State(state): State<AppState>) -> ApiResult<Json<SystemStatusResponse>> {
    let lock = state
        .lock_repo
        .status(reelforge_models::DEFAULT_LOCK_KEY)
        .await?;

    let lock_status = match lock {
        Some(l) => LockStatus {
            held: true,
            video_id: Some(l.video_id.as_str().to_string()),
            owner: Some(l.owner),
            expires_at: Some(l.expires_at),
        },
        None => LockStatus {
            held: false,
            video_id: None,
            owner: None,
            expires_at: None,
        },
    };

    let bytes_used = state.storage.estimate_disk_usage(state.storage.layout().root()).await?;
    let cache_stats = state.cache.stats().await;
    let queue_length = state.queue.len().await?;
    let dlq_length = state.queue.dlq_len().await?;

    crate::metrics::set_queue_length(queue_length);
    crate::metrics::set_dlq_length(dlq_length);

    Ok(Json(SystemStatusResponse {
        lock: lock_status,
        storage: StorageStatus { bytes_used },
        cache: CacheStatus {
            entry_count: cache_stats.entry_count,
            total_bytes: cache_stats.total_bytes,
            oldest: cache_stats.oldest,
            newest: cache_stats.newest,
        },
        queue_length,
        dlq_length,
    }))
}
