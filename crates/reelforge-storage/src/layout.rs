//! Deterministic on-disk tree for a video run's artifacts.
//!
//! ```text
//! <root>/videos/<userId>/<videoId>/
//!     segments/segment_NNN.mp4    (N zero-padded to 3)
//!     frames/frame_NNN.jpg
//!     stitched_720p.mp4
//!     final_720p.mp4
//!     final_480p.mp4
//!     audio.mp3
//!     thumbnail.jpg
//! <root>/cache/segments/<hash>.mp4 + manifest.json
//! <root>/temp/processing/...
//! ```
//!
//! Every path below is a pure function of its inputs: nothing here reads
//! or writes the filesystem, so callers can compute a path before deciding
//! whether to create it.

use std::path::PathBuf;

/// Quality tiers a run's final delivery file is produced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    P720,
    P480,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P720 => "720p",
            Quality::P480 => "480p",
        }
    }
}

/// Root-relative path layout for one storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn video_root(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.root.join("videos").join(user_id).join(video_id)
    }

    pub fn segments_dir(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.video_root(user_id, video_id).join("segments")
    }

    pub fn segment_path(&self, user_id: &str, video_id: &str, segment_number: u32) -> PathBuf {
        self.segments_dir(user_id, video_id)
            .join(format!("segment_{:03}.mp4", segment_number))
    }

    pub fn frames_dir(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.video_root(user_id, video_id).join("frames")
    }

    pub fn frame_path(&self, user_id: &str, video_id: &str, segment_number: u32) -> PathBuf {
        self.frames_dir(user_id, video_id)
            .join(format!("frame_{:03}.jpg", segment_number))
    }

    pub fn stitched_path(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.video_root(user_id, video_id).join("stitched_720p.mp4")
    }

    pub fn final_path(&self, user_id: &str, video_id: &str, quality: Quality) -> PathBuf {
        let name = match quality {
            Quality::P720 => "final_720p.mp4",
            Quality::P480 => "final_480p.mp4",
        };
        self.video_root(user_id, video_id).join(name)
    }

    pub fn audio_path(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.video_root(user_id, video_id).join("audio.mp3")
    }

    pub fn thumbnail_path(&self, user_id: &str, video_id: &str) -> PathBuf {
        self.video_root(user_id, video_id).join("thumbnail.jpg")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root.join("cache").join("segments")
    }

    pub fn cache_manifest_path(&self) -> PathBuf {
        self.cache_root().join("manifest.json")
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root.join("temp").join("processing")
    }

    /// Relative path (from the storage root) for an absolute path under it,
    /// used when persisting `ArtifactInfo::path` so records stay portable
    /// across a relocated `UPLOAD_DIR`.
    pub fn relativize(&self, absolute: &std::path::Path) -> Option<PathBuf> {
        absolute.strip_prefix(&self.root).ok().map(|p| p.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_numbers_are_zero_padded_to_three() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.segment_path("u1", "v1", 3),
            PathBuf::from("/data/videos/u1/v1/segments/segment_003.mp4")
        );
        assert_eq!(
            layout.segment_path("u1", "v1", 42),
            PathBuf::from("/data/videos/u1/v1/segments/segment_042.mp4")
        );
    }

    #[test]
    fn final_path_selects_by_quality() {
        let layout = StorageLayout::new("/data");
        assert!(layout
            .final_path("u1", "v1", Quality::P720)
            .ends_with("final_720p.mp4"));
        assert!(layout
            .final_path("u1", "v1", Quality::P480)
            .ends_with("final_480p.mp4"));
    }

    #[test]
    fn relativize_strips_the_configured_root() {
        let layout = StorageLayout::new("/data");
        let abs = layout.audio_path("u1", "v1");
        assert_eq!(
            layout.relativize(&abs),
            Some(PathBuf::from("videos/u1/v1/audio.mp3"))
        );
    }
}
