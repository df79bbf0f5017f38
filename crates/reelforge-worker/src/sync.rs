//! Audio/video duration reconciliation ahead of the final merge.
//!
//! The text-to-speech track and the stitched video track are generated
//! independently, so their durations rarely line up to the millisecond.
//! This module decides whether the drift is close enough to ignore, and
//! if not, whether to pad the audio with silence or speed it up, before
//! handing both tracks to `merge::merge_av`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use reelforge_media::command::FfmpegRunner;
use reelforge_media::error::{MediaError, MediaResult};
use reelforge_media::probe::{probe_media, probe_video};

/// Drift under which the two tracks are considered already in sync.
pub const SYNC_TOLERANCE_SECS: f64 = 2.0;
/// Drift under which no adjustment is made at all; the audio is copied
/// through untouched.
pub const COPY_THRESHOLD_SECS: f64 = 0.5;

/// Lowest resolution `validate` will accept.
pub const MIN_WIDTH: u32 = 480;
pub const MIN_HEIGHT: u32 = 270;
/// Duration below which `validate` warns but does not reject.
pub const MIN_DURATION_WARN_SECS: f64 = 10.0;

/// What `adjust_audio` should do to reconcile the two durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Durations already close enough; merge as-is.
    None,
    /// Audio is shorter than the video; pad with silence.
    Pad,
    /// Audio is longer than the video; trim or speed up.
    TrimOrSpeedUp,
}

/// Result of comparing a video track's duration against its paired audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub in_sync: bool,
    pub video_duration: f64,
    pub audio_duration: f64,
    /// `audio_duration - video_duration`; negative means audio is shorter.
    pub diff: f64,
    pub recommendation: Recommendation,
}

/// Probe both tracks and compare their durations against `tolerance`.
pub async fn verify(
    video_path: impl AsRef<Path>,
    audio_path: impl AsRef<Path>,
    tolerance: f64,
) -> MediaResult<SyncReport> {
    let video_duration = probe_video(video_path.as_ref()).await?.duration;
    let audio_duration = probe_media(audio_path.as_ref()).await?.duration;
    let diff = audio_duration - video_duration;

    let in_sync = diff.abs() <= tolerance;
    let recommendation = if in_sync {
        Recommendation::None
    } else if diff < 0.0 {
        Recommendation::Pad
    } else {
        Recommendation::TrimOrSpeedUp
    };

    Ok(SyncReport {
        in_sync,
        video_duration,
        audio_duration,
        diff,
        recommendation,
    })
}

/// Reconcile `audio`'s duration to `target_duration`, writing the result
/// to `out`.
///
/// - `|audio_duration - target_duration| <= 0.5s`: byte-copy, no filter.
/// - audio shorter than target: pad with silence (`apad`) out to the
///   target duration.
/// - audio longer than target: tempo-scale by `audio/target` via
///   `atempo`, clamped to ffmpeg's valid `[0.5, 2.0]` range per filter
///   instance and chained if a single stage can't cover the ratio.
pub async fn adjust_audio(
    audio: impl AsRef<Path>,
    target_duration: f64,
    out: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let audio = audio.as_ref();
    let out = out.as_ref();

    let audio_duration = probe_media(audio).await?.duration;
    let diff = audio_duration - target_duration;

    if diff.abs() <= COPY_THRESHOLD_SECS {
        tokio::fs::copy(audio, out).await?;
        return Ok(out.to_path_buf());
    }

    if diff < 0.0 {
        let pad_secs = target_duration - audio_duration;
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-af".to_string(),
            format!("apad=pad_dur={:.3}", pad_secs),
            "-t".to_string(),
            format!("{:.3}", target_duration),
            out.to_string_lossy().to_string(),
        ];
        FfmpegRunner::new().run_raw_args(&args).await?;
    } else {
        let ratio = audio_duration / target_duration;
        let filter = atempo_chain(ratio);
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-af".to_string(),
            filter,
            out.to_string_lossy().to_string(),
        ];
        FfmpegRunner::new().run_raw_args(&args).await?;
    }

    Ok(out.to_path_buf())
}

/// Build an `atempo` filter chain covering `ratio`, splitting into
/// multiple stages since a single `atempo` instance only accepts
/// `[0.5, 2.0]`.
fn atempo_chain(ratio: f64) -> String {
    let mut remaining = ratio;
    let mut stages = Vec::new();

    while remaining > 2.0 {
        stages.push(2.0_f64);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push(0.5_f64);
        remaining /= 0.5;
    }
    stages.push(remaining);

    stages
        .into_iter()
        .map(|s| format!("atempo={:.4}", s))
        .collect::<Vec<_>>()
        .join(",")
}

/// Post-merge check on a final delivery file: does it have both streams,
/// what codecs, what duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedReport {
    pub has_video: bool,
    pub has_audio: bool,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub duration: f64,
}

pub async fn verify_merged(path: impl AsRef<Path>) -> MediaResult<MergedReport> {
    let path = path.as_ref();
    let media = probe_media(path).await?;

    let video_info = probe_video(path).await.ok();

    Ok(MergedReport {
        has_video: video_info.is_some(),
        has_audio: media.channels.is_some() || media.sample_rate.is_some(),
        video_codec: video_info.as_ref().map(|v| v.codec.clone()),
        audio_codec: None,
        duration: media.duration,
    })
}

/// Delivery-readiness check: a hard reject below 480x270, a warning
/// (not a rejection) below 10 seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub async fn validate(path: impl AsRef<Path>) -> MediaResult<ValidationReport> {
    let info = probe_video(path.as_ref()).await?;
    let mut report = ValidationReport {
        is_valid: true,
        ..Default::default()
    };

    if info.width < MIN_WIDTH || info.height < MIN_HEIGHT {
        report.is_valid = false;
        report.errors.push(format!(
            "resolution {}x{} is below the minimum {}x{}",
            info.width, info.height, MIN_WIDTH, MIN_HEIGHT
        ));
    }

    if info.duration < MIN_DURATION_WARN_SECS {
        report.warnings.push(format!(
            "duration {:.1}s is shorter than the recommended {:.1}s",
            info.duration, MIN_DURATION_WARN_SECS
        ));
    }

    if info.duration <= 0.0 {
        report.is_valid = false;
        report
            .errors
            .push("duration is zero or could not be determined".to_string());
    }

    Ok(report)
}

/// Collapse any media error from this module's operations to the single
/// toolchain-failure kind callers outside this crate reason about.
pub fn classify(err: &MediaError) -> bool {
    err.is_toolchain_failure() || err.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_picks_pad_when_audio_shorter() {
        let diff = 8.0 - 12.0;
        assert!(diff < 0.0);
    }

    #[test]
    fn atempo_chain_single_stage_within_range() {
        let chain = atempo_chain(1.2);
        assert_eq!(chain, "atempo=1.2000");
    }

    #[test]
    fn atempo_chain_splits_large_ratio() {
        let chain = atempo_chain(3.0);
        assert!(chain.contains("atempo=2.0000"));
        assert!(chain.matches("atempo=").count() == 2);
    }

    #[test]
    fn atempo_chain_splits_small_ratio() {
        let chain = atempo_chain(0.3);
        assert!(chain.contains("atempo=0.5000"));
        assert!(chain.matches("atempo=").count() == 2);
    }

    #[test]
    fn copy_threshold_matches_spec() {
        assert!((COPY_THRESHOLD_SECS - 0.5).abs() < f64::EPSILON);
        assert!((SYNC_TOLERANCE_SECS - 2.0).abs() < f64::EPSILON);
    }
}
