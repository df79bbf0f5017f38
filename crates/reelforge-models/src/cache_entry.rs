//! Manifest entry for the content-addressed segment cache.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema version stamped on every manifest entry. Bumping this
/// intentionally invalidates the entire cache on the next read, the same
/// way cached neural analysis results fall back to a miss on a version
/// mismatch.
pub const CACHE_MANIFEST_VERSION: u32 = 1;

/// Default lifetime of a cache entry before it is eligible for cleanup.
pub const CACHE_ENTRY_TTL_DAYS: i64 = 7;

/// One entry in the segment cache manifest.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    /// Hash of the inputs that produced this clip (visual prompt, scene
    /// index, provider identity, continuity hint).
    pub key: String,

    /// Path to the cached clip file, relative to the cache root.
    pub path: String,

    /// Size of the cached file in bytes.
    pub size_bytes: u64,

    /// Schema version this entry was written under.
    #[serde(default = "default_manifest_version")]
    pub version: u32,

    pub created_at: DateTime<Utc>,

    /// When this entry becomes eligible for cleanup. Defaults to
    /// `created_at + CACHE_ENTRY_TTL_DAYS`.
    pub expires_at: DateTime<Utc>,

    /// Last time this entry was returned from a lookup, used for
    /// least-recently-used eviction.
    pub last_accessed_at: DateTime<Utc>,

    /// The scene prompt this entry was keyed on, kept for diagnostics even
    /// though the key itself is a hash.
    pub scene_prompt: String,
    /// The segment index this entry was keyed on.
    pub segment_number: u32,
    /// Duration of the cached clip in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

fn default_manifest_version() -> u32 {
    CACHE_MANIFEST_VERSION
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        path: impl Into<String>,
        size_bytes: u64,
        scene_prompt: impl Into<String>,
        segment_number: u32,
        duration_secs: Option<f64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            path: path.into(),
            size_bytes,
            version: CACHE_MANIFEST_VERSION,
            created_at: now,
            expires_at: now + chrono::Duration::days(CACHE_ENTRY_TTL_DAYS),
            last_accessed_at: now,
            scene_prompt: scene_prompt.into(),
            segment_number,
            duration_secs,
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == CACHE_MANIFEST_VERSION
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn touch_accessed(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}
