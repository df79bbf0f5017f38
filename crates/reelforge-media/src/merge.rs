//! Audio/video merge for the final delivery file.

use std::path::{Path, PathBuf};

use crate::command::FfmpegRunner;
use crate::error::MediaResult;

/// Merge a silent video with a narration/music track: copy the video
/// stream untouched, encode audio to AAC 192kbps. `trim_to_shortest` maps
/// to ffmpeg's `-shortest`, used when the sync verifier decided trimming
/// (rather than padding) was the right call.
pub async fn merge_av(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    out: impl AsRef<Path>,
    trim_to_shortest: bool,
) -> MediaResult<PathBuf> {
    let out = out.as_ref();

    let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];
    args.push("-i".into());
    args.push(video.as_ref().to_string_lossy().to_string());
    args.push("-i".into());
    args.push(audio.as_ref().to_string_lossy().to_string());
    args.push("-c:v".into());
    args.push("copy".into());
    args.push("-c:a".into());
    args.push("aac".into());
    args.push("-b:a".into());
    args.push("192k".into());
    args.push("-map".into());
    args.push("0:v:0".into());
    args.push("-map".into());
    args.push("1:a:0".into());
    if trim_to_shortest {
        args.push("-shortest".into());
    }
    args.push(out.to_string_lossy().to_string());

    FfmpegRunner::new().run_raw_args(&args).await?;
    Ok(out.to_path_buf())
}
