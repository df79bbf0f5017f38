//! Thumbnail and frame-extraction operations.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::scale_and_pad;

/// Default timestamp (seconds) a poster thumbnail is pulled from.
pub const THUMBNAIL_TIMESTAMP_SECS: f64 = 2.0;
/// Output dimensions for the poster thumbnail.
pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// Generate a poster thumbnail, scaled to 1280x720, from `ts` seconds into
/// the video (defaults to 2s via `THUMBNAIL_TIMESTAMP_SECS`).
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    ts_secs: f64,
) -> MediaResult<()> {
    let filter = scale_and_pad(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT);

    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(ts_secs)
        .single_frame()
        .video_filter(&filter)
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await
}

/// Extract a single frame at an arbitrary timestamp, at source resolution.
pub async fn extract_frame_at(
    video_path: impl AsRef<Path>,
    ts_secs: f64,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(ts_secs)
        .single_frame()
        .output_arg("-qscale:v")
        .output_arg("2")
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await
}

/// Extract the last frame of a clip, reaching back 0.1s from EOF so the
/// seek always lands on a decodable frame. Used to build the continuity
/// hint passed to the next segment's generation.
pub async fn extract_last_frame(
    video_path: impl AsRef<Path>,
    duration_secs: f64,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let ts = (duration_secs - 0.1).max(0.0);
    extract_frame_at(video_path, ts, output_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_defaults_match_spec() {
        assert!((THUMBNAIL_TIMESTAMP_SECS - 2.0).abs() < f64::EPSILON);
        assert_eq!(THUMBNAIL_WIDTH, 1280);
        assert_eq!(THUMBNAIL_HEIGHT, 720);
    }
}
