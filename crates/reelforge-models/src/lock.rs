//! The exclusive processing lock that serializes orchestrator runs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::VideoId;

/// Firestore document ID the single-worker deployment locks on. Multi-worker
/// deployments would key this per shard instead; the orchestrator itself is
/// agnostic to how many distinct lock keys exist.
pub const DEFAULT_LOCK_KEY: &str = "reelforge:orchestrator";

/// Default time a lock is held before it is considered abandoned.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 900;

/// A held (or recently held) processing lock.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingLock {
    pub key: String,
    pub video_id: VideoId,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProcessingLock {
    pub fn new(key: impl Into<String>, video_id: VideoId, owner: impl Into<String>, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            video_id,
            owner: owner.into(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
