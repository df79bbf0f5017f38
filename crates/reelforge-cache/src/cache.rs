//! Content-addressed segment cache, keyed by `H(scenePrompt || segmentIndex)`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reelforge_models::CacheEntry;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::CacheResult;
use crate::manifest::Manifest;

/// Default hash truncation length. 16 hex chars is a collision risk once
/// the cache holds more than a few hundred thousand entries, so the default
/// is wider and the length stays configurable for callers that need the
/// shorter key.
pub const DEFAULT_HASH_LEN: usize = 32;

/// Minimum interval between `cleanup()` sweeps.
pub const CLEANUP_INTERVAL_HOURS: i64 = 24;

/// Aggregate cache statistics for `GET /system/status`.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Content-addressed file cache for rendered segment clips.
pub struct SegmentCache {
    cache_root: PathBuf,
    manifest_path: PathBuf,
    hash_len: usize,
    manifest: Arc<Mutex<Manifest>>,
}

impl SegmentCache {
    pub async fn new(cache_root: impl Into<PathBuf>, hash_len: usize) -> CacheResult<Self> {
        let cache_root = cache_root.into();
        fs::create_dir_all(&cache_root).await?;
        let manifest_path = cache_root.join("manifest.json");
        let manifest = Manifest::load(&manifest_path).await;
        Ok(Self {
            cache_root,
            manifest_path,
            hash_len,
            manifest: Arc::new(Mutex::new(manifest)),
        })
    }

    pub fn key_for(&self, scene_prompt: &str, segment_number: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scene_prompt.as_bytes());
        hasher.update(b"\0");
        hasher.update(segment_number.to_be_bytes());
        let digest = hasher.finalize();
        let hex = hex_encode(&digest);
        hex[..self.hash_len.min(hex.len())].to_string()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_root.join(format!("{key}.mp4"))
    }

    /// Look up a cached clip. A stale manifest entry (expired, or whose
    /// file has gone missing) is self-healing: it's removed from the
    /// manifest and treated as a miss rather than surfaced as an error.
    pub async fn lookup(&self, scene_prompt: &str, segment_number: u32) -> CacheResult<Option<PathBuf>> {
        let key = self.key_for(scene_prompt, segment_number);
        let mut manifest = self.manifest.lock().await;

        let Some(entry) = manifest.entries.get(&key).cloned() else {
            return Ok(None);
        };

        let path = self.cache_root.join(&entry.path);
        let stale = entry.is_expired() || !entry.is_current_version() || !path.exists();
        if stale {
            manifest.entries.remove(&key);
            manifest.save(&self.manifest_path).await?;
            return Ok(None);
        }

        if let Some(mut touched) = manifest.entries.get(&key).cloned() {
            touched.touch_accessed();
            manifest.entries.insert(key, touched);
            manifest.save(&self.manifest_path).await?;
        }

        Ok(Some(path))
    }

    /// Copy `source_path` into the cache under this key and record the
    /// manifest entry. Files are copied, never moved -- a `VideoRun`'s
    /// segment file and the cache's copy are independent after this call.
    pub async fn store(
        &self,
        scene_prompt: &str,
        segment_number: u32,
        source_path: impl AsRef<Path>,
        duration_secs: Option<f64>,
    ) -> CacheResult<PathBuf> {
        let key = self.key_for(scene_prompt, segment_number);
        let dest = self.entry_path(&key);
        fs::copy(source_path.as_ref(), &dest).await?;
        let size = fs::metadata(&dest).await?.len();

        let relative = dest
            .strip_prefix(&self.cache_root)
            .unwrap_or(&dest)
            .to_string_lossy()
            .to_string();

        let entry = CacheEntry::new(key.clone(), relative, size, scene_prompt, segment_number, duration_secs);

        let mut manifest = self.manifest.lock().await;
        manifest.entries.insert(key, entry);
        manifest.save(&self.manifest_path).await?;

        Ok(dest)
    }

    /// Convenience wrapper: look up and, on a hit, copy straight to
    /// `target_path`. Returns whether a hit occurred.
    pub async fn copy_to(&self, scene_prompt: &str, segment_number: u32, target_path: impl AsRef<Path>) -> CacheResult<bool> {
        match self.lookup(scene_prompt, segment_number).await? {
            Some(cached) => {
                if let Some(parent) = target_path.as_ref().parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::copy(&cached, target_path.as_ref()).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Purge expired entries. No-op if the last cleanup was within
    /// `CLEANUP_INTERVAL_HOURS`.
    pub async fn cleanup(&self) -> CacheResult<usize> {
        let mut manifest = self.manifest.lock().await;

        if let Some(last) = manifest.last_cleanup {
            if Utc::now() - last < chrono::Duration::hours(CLEANUP_INTERVAL_HOURS) {
                return Ok(0);
            }
        }

        let expired: Vec<String> = manifest
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired() || !e.is_current_version())
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = manifest.entries.remove(key) {
                let path = self.cache_root.join(&entry.path);
                if let Err(e) = fs::remove_file(&path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %e, path = %path.display(), "failed to remove expired cache file");
                    }
                }
            }
        }

        manifest.last_cleanup = Some(Utc::now());
        manifest.save(&self.manifest_path).await?;

        info!(removed = expired.len(), "segment cache cleanup complete");
        Ok(expired.len())
    }

    pub async fn stats(&self) -> CacheStats {
        let manifest = self.manifest.lock().await;
        let entry_count = manifest.entries.len();
        let total_bytes = manifest.entries.values().map(|e| e.size_bytes).sum();
        let oldest = manifest.entries.values().map(|e| e.created_at).min();
        let newest = manifest.entries.values().map(|e| e.created_at).max();
        CacheStats {
            entry_count,
            total_bytes,
            oldest,
            newest,
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache_in_tempdir() -> (tempfile::TempDir, SegmentCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::new(dir.path(), DEFAULT_HASH_LEN).await.unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let (dir, cache) = cache_in_tempdir().await;
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"fake clip bytes").await.unwrap();

        cache.store("a dog runs", 0, &source, Some(12.0)).await.unwrap();
        let hit = cache.lookup("a dog runs", 0).await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn lookup_miss_for_unknown_key() {
        let (_dir, cache) = cache_in_tempdir().await;
        assert!(cache.lookup("never stored", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn different_segment_numbers_are_different_keys() {
        let (_dir, cache) = cache_in_tempdir().await;
        assert_ne!(cache.key_for("p", 0), cache.key_for("p", 1));
    }

    #[tokio::test]
    async fn lookup_self_heals_when_backing_file_is_missing() {
        let (dir, cache) = cache_in_tempdir().await;
        let source = dir.path().join("clip.mp4");
        fs::write(&source, b"bytes").await.unwrap();
        cache.store("p", 0, &source, None).await.unwrap();

        // Delete the backing file out from under the manifest.
        let key = cache.key_for("p", 0);
        fs::remove_file(cache.entry_path(&key)).await.unwrap();

        assert!(cache.lookup("p", 0).await.unwrap().is_none());
        // The stale entry should have been pruned, not just reported missing.
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn hash_length_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::new(dir.path(), 16).await.unwrap();
        assert_eq!(cache.key_for("p", 0).len(), 16);
    }
}
