//! Crash recovery: deciding where a video run should resume from based on
//! whatever was last persisted, without trusting in-memory state from a
//! worker process that may have died mid-phase.
//!
//! `RecoveryPlanner::plan` is the pure decision core -- no I/O, so it can be
//! driven from fixtures in tests. The on-disk facts it needs (how many
//! segment files actually exist, whether the stitched file exists) are
//! gathered by the caller and passed in as `RecoveryInputs`.

use reelforge_models::{RunPhase, VideoRun};

/// On-disk facts the planner needs but can't determine on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryInputs {
    /// Number of segment clip files actually present in storage.
    pub segments_on_disk: usize,
    /// Whether the stitched (silent) clip exists on disk.
    pub stitched_exists: bool,
}

/// What the orchestrator should do to resume a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Resume from `phase`. `resume_segment` gives the 0-indexed segment to
    /// retry next when resuming into `Generating`; `None` otherwise.
    Resume {
        phase: RunPhase,
        resume_segment: Option<usize>,
    },
    /// Nothing to do -- the run is already terminal, or never left its
    /// initial phase.
    NotRecoverable,
}

pub struct RecoveryPlanner;

impl RecoveryPlanner {
    /// Decide how to resume `run`, given the on-disk facts in `inputs`.
    ///
    /// Pure: calling this twice with the same arguments always yields the
    /// same action.
    pub fn plan(run: &VideoRun, inputs: &RecoveryInputs) -> RecoveryAction {
        match run.phase {
            RunPhase::Decomposing | RunPhase::Completed | RunPhase::Failed => {
                RecoveryAction::NotRecoverable
            }
            RunPhase::Generating => Self::resume_generating(run),
            RunPhase::Stitching => {
                if inputs.segments_on_disk == run.total_segments() {
                    RecoveryAction::Resume {
                        phase: RunPhase::Stitching,
                        resume_segment: None,
                    }
                } else {
                    Self::resume_generating(run)
                }
            }
            RunPhase::Audio | RunPhase::Merging | RunPhase::Transcoding => {
                if inputs.stitched_exists {
                    RecoveryAction::Resume {
                        phase: RunPhase::Audio,
                        resume_segment: None,
                    }
                } else if inputs.segments_on_disk == run.total_segments() {
                    RecoveryAction::Resume {
                        phase: RunPhase::Stitching,
                        resume_segment: None,
                    }
                } else {
                    Self::resume_generating(run)
                }
            }
        }
    }

    /// Find the largest contiguous prefix of completed segments and resume
    /// generation right after it.
    fn resume_generating(run: &VideoRun) -> RecoveryAction {
        let prefix = run
            .segments
            .iter()
            .take_while(|s| s.is_completed())
            .count();

        RecoveryAction::Resume {
            phase: RunPhase::Generating,
            resume_segment: Some(prefix),
        }
    }
}

/// Apply a `RecoveryAction` to `run` in place: reset phase, clear the
/// carried error, and mark any segment at or after the resume point back to
/// pending so the orchestrator retries it.
pub fn apply(run: &mut VideoRun, action: &RecoveryAction) {
    match action {
        RecoveryAction::NotRecoverable => {}
        RecoveryAction::Resume { phase, resume_segment } => {
            run.phase = *phase;
            run.error_message = None;

            if let Some(from) = resume_segment {
                for segment in run.segments.iter_mut().skip(*from) {
                    if !segment.is_completed() {
                        segment.status = reelforge_models::SegmentStatus::Pending;
                        segment.last_error = None;
                    }
                }
            }

            run.touch();
        }
    }
}

/// A non-terminal run untouched for this long is considered abandoned by
/// its previous worker and a candidate for the periodic sweep.
pub const STALE_RUN_THRESHOLD_SECS: i64 = 30 * 60;

/// Whether `run` has gone untouched long enough to be swept.
pub fn is_stale(run: &VideoRun, now: chrono::DateTime<chrono::Utc>) -> bool {
    if run.phase.is_terminal() {
        return false;
    }
    (now - run.updated_at).num_seconds() >= STALE_RUN_THRESHOLD_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_models::{Scene, Segment, VideoId};

    fn run_with_segments(phase: RunPhase, statuses: &[bool]) -> VideoRun {
        let mut run = VideoRun::new(VideoId::new(), "user-1", "a cat video");
        run.phase = phase;
        run.segments = statuses
            .iter()
            .enumerate()
            .map(|(i, &completed)| {
                let scene = Scene::new(i as u32, format!("scene {i}"), (i * 12) as f64, ((i + 1) * 12) as f64);
                let mut segment = Segment::new(scene);
                if completed {
                    segment.complete(format!("segments/segment_{i:03}.mp4"), Some(format!("key{i}")));
                }
                segment
            })
            .collect();
        run
    }

    #[test]
    fn decomposing_is_not_recoverable() {
        let run = run_with_segments(RunPhase::Decomposing, &[]);
        assert_eq!(
            RecoveryPlanner::plan(&run, &RecoveryInputs::default()),
            RecoveryAction::NotRecoverable
        );
    }

    #[test]
    fn terminal_phases_are_not_recoverable() {
        let completed = run_with_segments(RunPhase::Completed, &[true, true]);
        let failed = run_with_segments(RunPhase::Failed, &[true, false]);
        assert_eq!(
            RecoveryPlanner::plan(&completed, &RecoveryInputs::default()),
            RecoveryAction::NotRecoverable
        );
        assert_eq!(
            RecoveryPlanner::plan(&failed, &RecoveryInputs::default()),
            RecoveryAction::NotRecoverable
        );
    }

    #[test]
    fn generating_resumes_after_largest_completed_prefix() {
        let run = run_with_segments(RunPhase::Generating, &[true, true, false, true, false]);
        let action = RecoveryPlanner::plan(&run, &RecoveryInputs::default());
        assert_eq!(
            action,
            RecoveryAction::Resume { phase: RunPhase::Generating, resume_segment: Some(2) }
        );
    }

    #[test]
    fn stitching_resumes_in_place_when_all_segments_present_on_disk() {
        let run = run_with_segments(RunPhase::Stitching, &[true, true, true]);
        let inputs = RecoveryInputs { segments_on_disk: 3, stitched_exists: false };
        assert_eq!(
            RecoveryPlanner::plan(&run, &inputs),
            RecoveryAction::Resume { phase: RunPhase::Stitching, resume_segment: None }
        );
    }

    #[test]
    fn stitching_falls_back_to_generating_when_segments_missing_on_disk() {
        let run = run_with_segments(RunPhase::Stitching, &[true, true, true]);
        let inputs = RecoveryInputs { segments_on_disk: 2, stitched_exists: false };
        assert_eq!(
            RecoveryPlanner::plan(&run, &inputs),
            RecoveryAction::Resume { phase: RunPhase::Generating, resume_segment: Some(3) }
        );
    }

    #[test]
    fn audio_resumes_at_audio_when_stitched_file_exists() {
        let run = run_with_segments(RunPhase::Audio, &[true, true]);
        let inputs = RecoveryInputs { segments_on_disk: 2, stitched_exists: true };
        assert_eq!(
            RecoveryPlanner::plan(&run, &inputs),
            RecoveryAction::Resume { phase: RunPhase::Audio, resume_segment: None }
        );
    }

    #[test]
    fn merging_falls_back_to_stitching_when_stitched_file_missing_but_segments_intact() {
        let run = run_with_segments(RunPhase::Merging, &[true, true]);
        let inputs = RecoveryInputs { segments_on_disk: 2, stitched_exists: false };
        assert_eq!(
            RecoveryPlanner::plan(&run, &inputs),
            RecoveryAction::Resume { phase: RunPhase::Stitching, resume_segment: None }
        );
    }

    #[test]
    fn transcoding_falls_all_the_way_back_to_generating_when_nothing_survived() {
        let run = run_with_segments(RunPhase::Transcoding, &[true, false]);
        let inputs = RecoveryInputs { segments_on_disk: 0, stitched_exists: false };
        assert_eq!(
            RecoveryPlanner::plan(&run, &inputs),
            RecoveryAction::Resume { phase: RunPhase::Generating, resume_segment: Some(1) }
        );
    }

    #[test]
    fn plan_is_deterministic_across_repeated_calls() {
        let run = run_with_segments(RunPhase::Generating, &[true, false, false]);
        let inputs = RecoveryInputs::default();
        let first = RecoveryPlanner::plan(&run, &inputs);
        let second = RecoveryPlanner::plan(&run, &inputs);
        assert_eq!(first, second);
    }

    #[test]
    fn apply_resets_phase_and_reopens_segments_from_resume_point() {
        let mut run = run_with_segments(RunPhase::Generating, &[true, true, false]);
        run.fail("ffmpeg exploded");
        let action = RecoveryAction::Resume { phase: RunPhase::Generating, resume_segment: Some(2) };
        apply(&mut run, &action);
        assert_eq!(run.phase, RunPhase::Generating);
        assert!(run.error_message.is_none());
        assert_eq!(run.segments[2].status, reelforge_models::SegmentStatus::Pending);
    }

    #[test]
    fn stale_check_respects_threshold_and_terminal_state() {
        let mut run = run_with_segments(RunPhase::Generating, &[]);
        let now = chrono::Utc::now();
        run.updated_at = now - chrono::Duration::seconds(STALE_RUN_THRESHOLD_SECS + 1);
        assert!(is_stale(&run, now));

        run.updated_at = now - chrono::Duration::seconds(60);
        assert!(!is_stale(&run, now));

        let mut done = run_with_segments(RunPhase::Completed, &[]);
        done.updated_at = now - chrono::Duration::seconds(STALE_RUN_THRESHOLD_SECS + 100);
        assert!(!is_stale(&done, now));
    }
}
