//! Filesystem operations over the storage layout: tree creation, segment
//! enumeration, subtree deletion, size probing and disk-usage estimation.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::layout::StorageLayout;

/// Local-disk storage backend, rooted at `UPLOAD_DIR`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    layout: StorageLayout,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(root),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Create the full directory tree for a video (segments/, frames/),
    /// idempotently.
    pub async fn create_tree(&self, user_id: &str, video_id: &str) -> StorageResult<()> {
        let segments = self.layout.segments_dir(user_id, video_id);
        let frames = self.layout.frames_dir(user_id, video_id);
        fs::create_dir_all(&segments)
            .await
            .map_err(|e| StorageError::io(&segments, e))?;
        fs::create_dir_all(&frames)
            .await
            .map_err(|e| StorageError::io(&frames, e))?;
        fs::create_dir_all(self.layout.cache_root())
            .await
            .map_err(|e| StorageError::io(self.layout.cache_root(), e))?;
        fs::create_dir_all(self.layout.temp_root())
            .await
            .map_err(|e| StorageError::io(self.layout.temp_root(), e))?;
        Ok(())
    }

    /// List a video's completed segment files, sorted ascending by segment
    /// number. Missing segments simply aren't present in the result --
    /// callers compare `len()` against `segmentCount` to detect gaps.
    pub async fn list_segment_files(&self, user_id: &str, video_id: &str) -> StorageResult<Vec<PathBuf>> {
        let dir = self.layout.segments_dir(user_id, video_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await.map_err(|e| StorageError::io(&dir, e))?;
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| StorageError::io(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("mp4") {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Remove a video's whole subtree. Deleting a `VideoRun` removes
    /// everything it owns; the cache tree is untouched (cache entries are
    /// copied, never moved, into a run's segment path).
    pub async fn delete_subtree(&self, user_id: &str, video_id: &str) -> StorageResult<()> {
        let root = self.layout.video_root(user_id, video_id);
        match fs::remove_dir_all(&root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&root, e)),
        }
    }

    /// Probe a file's size in bytes; `None` if it doesn't exist.
    pub async fn file_size(&self, path: impl AsRef<Path>) -> StorageResult<Option<u64>> {
        let path = path.as_ref();
        match fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Walk a subtree summing file sizes, used by `GET /system/status`'s
    /// disk-space estimate.
    pub async fn estimate_disk_usage(&self, path: impl AsRef<Path>) -> StorageResult<u64> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(0);
        }
        let mut total = 0u64;
        let mut stack = vec![path.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut read_dir = fs::read_dir(&dir).await.map_err(|e| StorageError::io(&dir, e))?;
            while let Some(entry) = read_dir.next_entry().await.map_err(|e| StorageError::io(&dir, e))? {
                let meta = entry.metadata().await.map_err(|e| StorageError::io(entry.path(), e))?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_tree_then_delete_subtree_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.create_tree("user1", "video1").await.unwrap();

        let video_root = storage.layout().video_root("user1", "video1");
        assert!(video_root.join("segments").exists());
        assert!(video_root.join("frames").exists());

        storage.delete_subtree("user1", "video1").await.unwrap();
        assert!(!video_root.exists());
    }

    #[tokio::test]
    async fn list_segment_files_sorts_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.create_tree("u", "v").await.unwrap();

        for n in [3, 1, 2] {
            let path = storage.layout().segment_path("u", "v", n);
            fs::write(&path, b"x").await.unwrap();
        }

        let files = storage.list_segment_files("u", "v").await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("segment_001.mp4"));
        assert!(files[2].ends_with("segment_003.mp4"));
    }

    #[tokio::test]
    async fn delete_subtree_on_missing_video_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.delete_subtree("nobody", "nothing").await.unwrap();
    }

    #[tokio::test]
    async fn estimate_disk_usage_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.create_tree("u", "v").await.unwrap();
        fs::write(storage.layout().audio_path("u", "v"), vec![0u8; 100])
            .await
            .unwrap();
        fs::write(storage.layout().segment_path("u", "v", 1), vec![0u8; 50])
            .await
            .unwrap();

        let total = storage
            .estimate_disk_usage(storage.layout().video_root("u", "v"))
            .await
            .unwrap();
        assert_eq!(total, 150);
    }
}
