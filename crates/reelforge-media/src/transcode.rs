//! Resolution transcoding for delivery quality tiers.

use std::path::{Path, PathBuf};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::scale_and_pad;

/// Scale to `width`x`height` (H.264 `medium`, CRF 23), audio copied
/// through untouched.
pub async fn transcode(
    input: impl AsRef<Path>,
    out: impl AsRef<Path>,
    width: u32,
    height: u32,
) -> MediaResult<PathBuf> {
    let out = out.as_ref();
    let filter = scale_and_pad(width, height);

    let cmd = FfmpegCommand::new(input.as_ref(), out)
        .video_filter(&filter)
        .video_codec("libx264")
        .preset("medium")
        .crf(23)
        .audio_codec("copy")
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await?;
    Ok(out.to_path_buf())
}

/// Standard delivery tiers this system produces.
pub const TIER_720P: (u32, u32) = (1280, 720);
pub const TIER_480P: (u32, u32) = (854, 480);
