//! FFmpeg filter-graph builders for stitching, transcoding and thumbnails.

/// Build the `xfade` filter-complex chain that crossfades N clips already
/// loaded as `[0:v]..[N-1:v]` inputs into a single output labeled `[vout]`.
///
/// `durations` is the *measured* duration of each input clip in seconds
/// (from `probe_video`, not the nominal segment duration -- see
/// `stitch_crossfade` in `crate::stitch`), so a short last clip or provider
/// variance never desyncs the chain.
///
/// For N clips there are N-1 crossfades. The i-th crossfade (0-indexed)
/// overlaps at `offset_i = (sum of durations[0..=i]) - (i+1) * fade_secs`,
/// folding the fade window out of the running total so each successive
/// offset is measured against the already-faded timeline rather than the
/// nominal per-clip length.
pub fn build_crossfade_filter(durations: &[f64], fade_secs: f64) -> String {
    assert!(durations.len() >= 2, "crossfade needs at least two clips");

    let mut filter = String::new();
    let mut running = durations[0];
    let mut prev_label = "0:v".to_string();

    for i in 1..durations.len() {
        let offset = (running - fade_secs * i as f64).max(0.0);
        let out_label = if i == durations.len() - 1 {
            "vout".to_string()
        } else {
            format!("xf{}", i)
        };
        filter.push_str(&format!(
            "[{prev}][{idx}:v]xfade=transition=fade:duration={fade:.3}:offset={offset:.3}[{out}];",
            prev = prev_label,
            idx = i,
            fade = fade_secs,
            offset = offset,
            out = out_label,
        ));
        running += durations[i];
        prev_label = out_label;
    }

    // Drop the trailing separator the loop body always appends.
    filter.pop();
    filter
}

/// Scale-only filter used by `transcode`/thumbnail generation. Preserves
/// aspect ratio, padding to the exact target so the output is always
/// `width x height`.
pub fn scale_and_pad(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_crossfade_offset_uses_measured_duration() {
        let filter = build_crossfade_filter(&[12.0, 12.0], 0.5);
        assert!(filter.contains("offset=11.500"));
        assert!(filter.contains("[vout]"));
    }

    #[test]
    fn three_clip_chain_compounds_offsets() {
        // Clip 2 shorter than nominal (provider variance).
        let filter = build_crossfade_filter(&[12.0, 10.0, 12.0], 0.5);
        // First crossfade at 12 - 0.5 = 11.5
        assert!(filter.contains("offset=11.500"));
        // Running total after clip 1 (faded) is 12 + 10 = 22, minus 2*0.5
        assert!(filter.contains("offset=21.000"));
        assert!(filter.contains("[xf1]"));
        assert!(filter.contains("[vout]"));
    }

    #[test]
    fn scale_and_pad_targets_exact_dimensions() {
        let filter = scale_and_pad(1280, 720);
        assert!(filter.contains("1280:720"));
    }
}
