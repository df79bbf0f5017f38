//! FFmpeg/FFprobe process adapter.
//!
//! This crate wraps the external `ffmpeg`/`ffprobe` binaries behind a small,
//! typed surface: a command builder, a progress-parsing runner with
//! cancellation and timeout support, probing, frame extraction, thumbnail
//! generation, crossfade stitching, concatenation, audio merge and
//! resolution transcoding. Every operation is synchronous from the
//! orchestrator's point of view (it awaits the child process to exit)
//! and surfaces failures as a single `MediaError::FfmpegFailed`/
//! `FfprobeFailed` with the captured stderr.

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod merge;
pub mod probe;
pub mod progress;
pub mod stitch;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use merge::merge_av;
pub use probe::{probe_media, probe_video, MediaInfo, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use stitch::{concat_simple, stitch_crossfade, DEFAULT_FADE_DURATION_SECS};
pub use thumbnail::{extract_frame_at, extract_last_frame, generate_thumbnail, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
pub use transcode::{transcode, TIER_480P, TIER_720P};
