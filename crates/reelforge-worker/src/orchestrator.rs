//! The processing orchestrator: drives one `VideoSpec` through the six-phase
//! state machine (decomposing -> generating -> stitching -> audio -> merging
//! -> transcoding) to a finished `VideoRun`, under the exclusive processing
//! lock.
//!
//! Every phase method does the same three things in order: do the work,
//! advance `run.phase` and persist it, publish a progress event. A crash
//! between any two of those steps is recoverable -- `recovery::plan` reads
//! the last persisted phase back and figures out where to resume, using
//! on-disk facts rather than trusting anything held in memory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use reelforge_cache::SegmentCache;
use reelforge_media::{MediaError, TIER_480P, TIER_720P};
use reelforge_models::{
    ArtifactInfo, ArtifactKind, ProcessingLock, ProgressEvent, RunPhase, Scene, Segment, SegmentStatus,
    TransitionType, VideoId, VideoRun, VideoSpec, DEFAULT_LOCK_KEY,
};
use reelforge_providers::{
    ContinuityHint, NarrationProvider, ProviderError, SegmentJobState, StoryboardProvider, VideoSegmentProvider,
    VoiceSettings,
};
use reelforge_queue::ProgressChannel;
use reelforge_storage::{LocalStorage, PublicUrlMapper, Quality};
use reelforge_store::{ProcessingLockRepository, VideoRunRepository};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::recovery::{self, RecoveryAction, RecoveryPlanner};
use crate::retry::RetryPolicy;
use crate::sync;

/// Voice used when a request doesn't specify one. ElevenLabs' stock
/// "Rachel" voice, the conventional default for providers in this shape.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_VOICE_MODEL: &str = "eleven_multilingual_v2";

/// Marker an external cancel request writes into `VideoRun::error_message`
/// when it flips `phase` to `Failed` out from under a running orchestrator.
/// `check_cancelled` looks for exactly this so a cooperative cancel request
/// is distinguishable from an ordinary phase failure on the next read.
pub const CANCEL_MESSAGE: &str = "cancelled by user";

/// Everything a phase method needs: the three external providers, the
/// stores, the cache, and the progress channel. Bundled as `Arc<dyn Trait>`
/// handles so tests can substitute fakes without touching the network.
pub struct Services {
    pub run_repo: Arc<VideoRunRepository>,
    pub lock_repo: Arc<ProcessingLockRepository>,
    pub storyboard: Arc<dyn StoryboardProvider>,
    pub segments: Arc<dyn VideoSegmentProvider>,
    pub narration: Arc<dyn NarrationProvider>,
    pub cache: Arc<SegmentCache>,
    pub storage: Arc<LocalStorage>,
    pub urls: Arc<PublicUrlMapper>,
    pub progress: Arc<ProgressChannel>,
}

/// Holds the processing lock for the lifetime of a run. Releases it on
/// every exit path -- success, failure, cancellation, or an orchestrator
/// panic -- by spawning the async release call from `Drop`, since `Drop`
/// itself can't be async.
struct LockGuard {
    lock_repo: Arc<ProcessingLockRepository>,
    key: String,
    owner: String,
    heartbeat: JoinHandle<()>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
        let lock_repo = Arc::clone(&self.lock_repo);
        let key = self.key.clone();
        let owner = self.owner.clone();
        tokio::spawn(async move {
            if let Err(e) = lock_repo.release(&key, &owner).await {
                warn!(error = %e, key, owner, "failed to release processing lock");
            }
        });
    }
}

pub struct Orchestrator {
    services: Services,
    config: WorkerConfig,
    retry_policy: RetryPolicy,
    seq: AtomicU64,
}

impl Orchestrator {
    pub fn new(services: Services, config: WorkerConfig, retry_policy: RetryPolicy) -> Self {
        Self {
            services,
            config,
            retry_policy,
            seq: AtomicU64::new(0),
        }
    }

    /// Drive `spec` through to a finished `VideoRun`. Acquires the
    /// exclusive processing lock for the duration; returns `Err(Busy)`
    /// immediately if another run already holds it.
    pub async fn run(&self, video_id: VideoId, spec: VideoSpec) -> WorkerResult<VideoRun> {
        let owner = self.config.worker_id.clone();
        let lock = self
            .services
            .lock_repo
            .try_acquire(DEFAULT_LOCK_KEY, &video_id, &owner, Some(self.config.lock_timeout.as_secs() as i64))
            .await?
            .ok_or(WorkerError::Busy)?;
        let _guard = self.spawn_lock_guard(lock);

        let mut run = self.load_or_create_run(&video_id, &spec).await?;
        self.services.storage.create_tree(&run.user_id, run.video_id.as_str()).await?;

        match self.drive(&mut run, &spec).await {
            Ok(()) => {
                run.phase = RunPhase::Completed;
                run.touch();
                self.persist(&run).await?;
                self.publish_progress(&run, 1.0, "video generation complete").await;
                let _ = self.services.cache.cleanup().await;
                Ok(run)
            }
            Err(e) => {
                if !run.phase.is_terminal() {
                    run.fail(e.to_string());
                    let _ = self.persist(&run).await;
                }
                self.publish_progress(&run, 0.0, format!("run failed: {e}")).await;
                Err(e)
            }
        }
    }

    fn spawn_lock_guard(&self, lock: ProcessingLock) -> LockGuard {
        let lock_repo = Arc::clone(&self.services.lock_repo);
        let key = lock.key.clone();
        let owner = lock.owner;
        let interval = self.config.lock_heartbeat_interval;
        let ttl_secs = self.config.lock_timeout.as_secs() as i64;

        let heartbeat_repo = Arc::clone(&lock_repo);
        let heartbeat_key = key.clone();
        let heartbeat_owner = owner.clone();
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = heartbeat_repo.extend(&heartbeat_key, &heartbeat_owner, ttl_secs).await {
                    warn!(error = %e, "failed to extend processing lock");
                }
            }
        });

        LockGuard { lock_repo, key, owner, heartbeat }
    }

    async fn load_or_create_run(&self, video_id: &VideoId, spec: &VideoSpec) -> WorkerResult<VideoRun> {
        if let Some((mut run, _update_time)) = self.services.run_repo.get_with_version(video_id).await? {
            if run.phase.is_terminal() {
                return Ok(run);
            }

            let inputs = self.gather_recovery_inputs(&run).await?;
            let action = RecoveryPlanner::plan(&run, &inputs);
            if action != RecoveryAction::NotRecoverable {
                info!(video_id = %video_id, ?action, "resuming interrupted run");
            }
            recovery::apply(&mut run, &action);
            self.persist(&run).await?;
            Ok(run)
        } else {
            let run = VideoRun::new(video_id.clone(), spec.user_id.clone(), spec.prompt.clone());
            self.services.run_repo.create(&run).await?;
            Ok(run)
        }
    }

    async fn gather_recovery_inputs(&self, run: &VideoRun) -> WorkerResult<recovery::RecoveryInputs> {
        let segment_files = self.services.storage.list_segment_files(&run.user_id, run.video_id.as_str()).await?;
        let stitched_path = self.services.storage.layout().stitched_path(&run.user_id, run.video_id.as_str());
        Ok(recovery::RecoveryInputs {
            segments_on_disk: segment_files.len(),
            stitched_exists: stitched_path.exists(),
        })
    }

    /// Re-fetch the persisted run and check whether an external cancel
    /// request has already flipped it to `Failed`. This is the only signal
    /// `POST /videos/:id/cancel` needs to give the orchestrator: it writes
    /// the terminal state directly, and the orchestrator notices on its
    /// next phase-boundary check rather than needing a dedicated flag.
    async fn check_cancelled(&self, video_id: &VideoId) -> WorkerResult<bool> {
        match self.services.run_repo.get(video_id).await? {
            Some(latest) => Ok(latest.phase == RunPhase::Failed && latest.error_message.as_deref() == Some(CANCEL_MESSAGE)),
            None => Ok(false),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Publish a progress event. `phase_fraction` is progress *within* the
    /// current phase, in `[0.0, 1.0]`; it's mapped onto that phase's slice
    /// of the overall 0-100% range before publishing.
    async fn publish_progress(&self, run: &VideoRun, phase_fraction: f64, message: impl Into<String>) {
        let progress = overall_progress(run.phase, phase_fraction);
        let mut event = ProgressEvent::new(run.video_id.clone(), run.phase, progress, self.next_seq()).with_message(message);
        if let Some(index) = run.segments.iter().position(|s| s.status == SegmentStatus::Generating) {
            event = event.with_segment(index as u32);
        }
        if let Err(e) = self.services.progress.publish_with_history(&event).await {
            warn!(error = %e, video_id = %run.video_id, "failed to publish progress event");
        }
    }

    async fn persist(&self, run: &VideoRun) -> WorkerResult<()> {
        self.services.run_repo.put(run, None).await?;
        Ok(())
    }

    async fn drive(&self, run: &mut VideoRun, spec: &VideoSpec) -> WorkerResult<()> {
        loop {
            if run.phase.is_terminal() {
                return Ok(());
            }
            if self.check_cancelled(&run.video_id).await? {
                return Err(WorkerError::Cancelled);
            }

            match run.phase {
                RunPhase::Decomposing => self.run_decomposing(run, spec).await?,
                RunPhase::Generating => self.run_generating(run).await?,
                RunPhase::Stitching => self.run_stitching(run).await?,
                RunPhase::Audio => self.run_audio(run, spec).await?,
                RunPhase::Merging => self.run_merging(run).await?,
                RunPhase::Transcoding => self.run_transcoding(run).await?,
                RunPhase::Completed | RunPhase::Failed => return Ok(()),
            }
        }
    }

    async fn run_decomposing(&self, run: &mut VideoRun, spec: &VideoSpec) -> WorkerResult<()> {
        self.publish_progress(run, 0.0, "decomposing prompt into storyboard").await;

        let target_duration = spec.requested_duration_secs();
        let segment_duration = self.config.segment_duration_for(target_duration);
        let segment_count = self.config.segment_count_for(target_duration);

        let enhanced = match self.services.storyboard.enhance(&spec.prompt, target_duration.round() as u32).await {
            Ok(enhanced) => Some(enhanced),
            Err(e) => {
                warn!(error = %e, "prompt enhancement failed, continuing with the raw prompt");
                None
            }
        };

        let title = enhanced.as_ref().map(|e| e.title.clone()).unwrap_or_else(|| derive_title(&spec.prompt));
        let decompose_prompt = enhanced.as_ref().map(|e| e.enhanced_prompt.as_str()).unwrap_or(&spec.prompt);

        let scenes = match self
            .services
            .storyboard
            .decompose(decompose_prompt, target_duration.round() as u32, segment_duration.round() as u32)
            .await
        {
            Ok(scenes) if !scenes.is_empty() => scenes,
            Ok(_) => fallback_decomposition(&spec.prompt, segment_count, segment_duration),
            Err(e) => {
                warn!(error = %e, "storyboard decomposition failed, falling back to uniform scenes");
                fallback_decomposition(&spec.prompt, segment_count, segment_duration)
            }
        };

        let narration_script = match self.services.storyboard.write_narration(&spec.prompt, &scenes, target_duration.round() as u32).await {
            Ok(script) if !script.trim().is_empty() => Some(script),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "narration scripting failed, video will be produced silent");
                None
            }
        };

        run.title = Some(title);
        run.segments = scenes.into_iter().map(Segment::new).collect();
        run.narration_script = narration_script;
        run.advance();
        self.persist(run).await?;
        self.publish_progress(run, 1.0, "storyboard ready").await;
        Ok(())
    }

    async fn run_generating(&self, run: &mut VideoRun) -> WorkerResult<()> {
        let total = run.total_segments();
        if total == 0 {
            return Err(WorkerError::validation("storyboard produced no scenes"));
        }

        for index in 0..total {
            if run.segments[index].is_completed() {
                continue;
            }
            if self.check_cancelled(&run.video_id).await? {
                return Err(WorkerError::Cancelled);
            }

            let continuity_hint = self.continuity_hint_for(run, index).await?;
            self.generate_segment(run, index, continuity_hint).await?;

            let fraction = run.completed_segments() as f64 / total as f64;
            self.publish_progress(run, fraction, format!("segment {}/{} complete", index + 1, total)).await;
        }

        run.advance();
        self.persist(run).await?;
        Ok(())
    }

    async fn continuity_hint_for(&self, run: &VideoRun, index: usize) -> WorkerResult<Option<ContinuityHint>> {
        if index == 0 {
            return Ok(None);
        }
        let previous = &run.segments[index - 1];
        if let Some(relative) = &previous.last_frame_path {
            let absolute = self.services.storage.layout().root().join(relative);
            if tokio::fs::try_exists(&absolute).await.unwrap_or(false) {
                return Ok(Some(ContinuityHint::Image(absolute)));
            }
        }
        Ok(Some(ContinuityHint::Text(previous.scene.visual_prompt.clone())))
    }

    async fn generate_segment(&self, run: &mut VideoRun, index: usize, continuity_hint: Option<ContinuityHint>) -> WorkerResult<()> {
        let scene = run.segments[index].scene.clone();
        let segment_path = self.services.storage.layout().segment_path(&run.user_id, run.video_id.as_str(), index as u32);

        if self.services.cache.copy_to(&scene.visual_prompt, index as u32, &segment_path).await? {
            let cache_key = self.services.cache.key_for(&scene.visual_prompt, index as u32);
            run.segments[index].complete(self.relative_path(&segment_path), Some(cache_key));
            self.persist(run).await?;
            self.maybe_extract_continuity_frame(run, index).await?;
            return Ok(());
        }

        let mut last_error: Option<WorkerError> = None;

        for attempt in 1..=self.retry_policy.max_attempts {
            run.segments[index].begin_attempt();
            self.persist(run).await?;

            match self.generate_segment_attempt(run, index, &scene, &segment_path, continuity_hint.clone()).await {
                Ok(()) => {
                    let _ = self.services.cache.store(&scene.visual_prompt, index as u32, &segment_path, Some(scene.duration_secs())).await;
                    let cache_key = self.services.cache.key_for(&scene.visual_prompt, index as u32);
                    run.segments[index].complete(self.relative_path(&segment_path), Some(cache_key));
                    self.persist(run).await?;
                    self.maybe_extract_continuity_frame(run, index).await?;
                    return Ok(());
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(segment = index, attempt, error = %e, retryable, "segment generation attempt failed");
                    run.segments[index].fail(e.to_string());
                    self.persist(run).await?;
                    if !retryable {
                        let reason = e.to_string();
                        return Err(WorkerError::segment_failed(index as u32, run.segments[index].attempts, reason));
                    }
                    last_error = Some(e);
                    if attempt < self.retry_policy.max_attempts {
                        tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string());
        Err(WorkerError::segment_failed(index as u32, run.segments[index].attempts, reason))
    }

    async fn generate_segment_attempt(
        &self,
        run: &mut VideoRun,
        index: usize,
        scene: &Scene,
        segment_path: &Path,
        continuity_hint: Option<ContinuityHint>,
    ) -> WorkerResult<()> {
        let (width, height) = TIER_720P;
        let handle = self
            .services
            .segments
            .start(&scene.visual_prompt, width, height, scene.duration_secs().round() as u32, continuity_hint)
            .await?;

        run.segments[index].set_job_id(handle.job_id.clone());
        self.persist(run).await?;

        let deadline = tokio::time::Instant::now() + self.config.segment_timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(WorkerError::Media(MediaError::Timeout(self.config.segment_timeout.as_secs())));
            }

            match self.services.segments.poll(&handle).await? {
                SegmentJobState::Succeeded { generation_ids } => {
                    let generation_id = generation_ids
                        .first()
                        .ok_or_else(|| WorkerError::validation("segment job succeeded with no generation ids"))?;
                    let bytes = self.services.segments.fetch_content(generation_id).await?;
                    if let Some(parent) = segment_path.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(segment_path, &bytes).await?;
                    return Ok(());
                }
                SegmentJobState::Failed { error } => {
                    return Err(WorkerError::Provider(ProviderError::RequestFailed(error)));
                }
                SegmentJobState::Pending | SegmentJobState::Running => {
                    tokio::time::sleep(self.config.polling_interval).await;
                }
            }
        }
    }

    /// Extract the segment's last frame as the continuity hint for its
    /// successor. Skipped for the final segment, which has none.
    async fn maybe_extract_continuity_frame(&self, run: &mut VideoRun, index: usize) -> WorkerResult<()> {
        if index + 1 >= run.total_segments() {
            return Ok(());
        }

        let clip_path = self.services.storage.layout().root().join(run.segments[index].clip_path.as_ref().expect("segment just completed"));
        let frame_path = self.services.storage.layout().frame_path(&run.user_id, run.video_id.as_str(), index as u32);
        if let Some(parent) = frame_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let duration = reelforge_media::probe_video(&clip_path).await?.duration;
        reelforge_media::extract_last_frame(&clip_path, duration, &frame_path).await?;

        let relative = self.relative_path(&frame_path);
        run.segments[index].set_last_frame(relative);
        self.persist(run).await?;
        Ok(())
    }

    async fn run_stitching(&self, run: &mut VideoRun) -> WorkerResult<()> {
        self.publish_progress(run, 0.0, "stitching segments").await;

        let root = self.services.storage.layout().root().to_path_buf();
        let segment_paths: Vec<PathBuf> = run
            .segments
            .iter()
            .map(|s| root.join(s.clip_path.as_ref().expect("all segments completed before stitching")))
            .collect();

        let stitched_path = self.services.storage.layout().stitched_path(&run.user_id, run.video_id.as_str());

        let has_crossfades = run.segments.iter().skip(1).any(|s| s.scene.transition == TransitionType::Crossfade);
        if has_crossfades {
            reelforge_media::stitch_crossfade(&segment_paths, &stitched_path, reelforge_media::DEFAULT_FADE_DURATION_SECS).await?;
        } else {
            reelforge_media::concat_simple(&segment_paths, &stitched_path).await?;
        }

        let info = reelforge_media::probe_video(&stitched_path).await?;
        let size = self.services.storage.file_size(&stitched_path).await?.unwrap_or(0);
        run.files.insert(
            ArtifactKind::Stitched720,
            ArtifactInfo {
                path: self.relative_path(&stitched_path),
                url: None,
                size_bytes: size,
                format: "mp4".to_string(),
                duration_secs: Some(info.duration),
            },
        );
        run.metadata.resolution = Some(format!("{}x{}", info.width, info.height));
        run.metadata.fps = Some(info.fps);
        run.metadata.codec = Some(info.codec.clone());

        run.advance();
        self.persist(run).await?;
        self.publish_progress(run, 1.0, "segments stitched").await;
        Ok(())
    }

    async fn run_audio(&self, run: &mut VideoRun, spec: &VideoSpec) -> WorkerResult<()> {
        self.publish_progress(run, 0.0, "synthesizing narration").await;

        let audio_path = self.services.storage.layout().audio_path(&run.user_id, run.video_id.as_str());
        let stitched_path = self.services.storage.layout().stitched_path(&run.user_id, run.video_id.as_str());
        let stitched_duration = reelforge_media::probe_video(&stitched_path).await?.duration;

        match run.narration_script.clone() {
            Some(script) if !script.trim().is_empty() => {
                let voice_id = spec.voice_id.clone().unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());
                let bytes = self.services.narration.synthesize(&script, &voice_id, DEFAULT_VOICE_MODEL, VoiceSettings::default()).await?;
                if let Some(parent) = audio_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&audio_path, &bytes).await?;

                let report = sync::verify(&stitched_path, &audio_path, sync::SYNC_TOLERANCE_SECS).await?;
                if !report.in_sync {
                    let adjusted_path = audio_path.with_extension("adjusted.mp3");
                    sync::adjust_audio(&audio_path, stitched_duration, &adjusted_path).await?;
                    tokio::fs::rename(&adjusted_path, &audio_path).await?;
                }
            }
            _ => {
                info!(video_id = %run.video_id, "no narration script, producing a silent audio track");
                generate_silence(&audio_path, stitched_duration).await?;
            }
        }

        let info = reelforge_media::probe_media(&audio_path).await?;
        let size = self.services.storage.file_size(&audio_path).await?.unwrap_or(0);
        run.files.insert(
            ArtifactKind::Audio,
            ArtifactInfo {
                path: self.relative_path(&audio_path),
                url: None,
                size_bytes: size,
                format: "mp3".to_string(),
                duration_secs: Some(info.duration),
            },
        );

        run.advance();
        self.persist(run).await?;
        self.publish_progress(run, 1.0, "narration ready").await;
        Ok(())
    }

    async fn run_merging(&self, run: &mut VideoRun) -> WorkerResult<()> {
        self.publish_progress(run, 0.0, "merging audio and video").await;

        let stitched_path = self.services.storage.layout().stitched_path(&run.user_id, run.video_id.as_str());
        let audio_path = self.services.storage.layout().audio_path(&run.user_id, run.video_id.as_str());
        let final_path = self.services.storage.layout().final_path(&run.user_id, run.video_id.as_str(), Quality::P720);

        let report = sync::verify(&stitched_path, &audio_path, sync::SYNC_TOLERANCE_SECS).await?;
        let trim_to_shortest = matches!(report.recommendation, sync::Recommendation::TrimOrSpeedUp);

        reelforge_media::merge_av(&stitched_path, &audio_path, &final_path, trim_to_shortest).await?;

        let merged = sync::verify_merged(&final_path).await?;
        if !merged.has_video || !merged.has_audio {
            return Err(WorkerError::validation("merged delivery file is missing a video or audio stream"));
        }

        let thumbnail_path = self.services.storage.layout().thumbnail_path(&run.user_id, run.video_id.as_str());
        let thumbnail_ts = reelforge_media::thumbnail::THUMBNAIL_TIMESTAMP_SECS.min((merged.duration - 0.1).max(0.0));
        reelforge_media::generate_thumbnail(&final_path, &thumbnail_path, thumbnail_ts).await?;

        let final_size = self.services.storage.file_size(&final_path).await?.unwrap_or(0);
        run.files.insert(
            ArtifactKind::Final720,
            ArtifactInfo {
                path: self.relative_path(&final_path),
                url: Some(self.services.urls.public_url(&self.relative_path_buf(&final_path))),
                size_bytes: final_size,
                format: "mp4".to_string(),
                duration_secs: Some(merged.duration),
            },
        );

        let thumb_size = self.services.storage.file_size(&thumbnail_path).await?.unwrap_or(0);
        run.files.insert(
            ArtifactKind::Thumbnail,
            ArtifactInfo {
                path: self.relative_path(&thumbnail_path),
                url: Some(self.services.urls.public_url(&self.relative_path_buf(&thumbnail_path))),
                size_bytes: thumb_size,
                format: "jpg".to_string(),
                duration_secs: None,
            },
        );

        run.advance();
        self.persist(run).await?;
        self.publish_progress(run, 1.0, "audio and video merged").await;
        Ok(())
    }

    async fn run_transcoding(&self, run: &mut VideoRun) -> WorkerResult<()> {
        self.publish_progress(run, 0.0, "transcoding delivery tiers").await;

        let final_720 = self.services.storage.layout().final_path(&run.user_id, run.video_id.as_str(), Quality::P720);
        let final_480 = self.services.storage.layout().final_path(&run.user_id, run.video_id.as_str(), Quality::P480);

        let (width_480, height_480) = TIER_480P;
        reelforge_media::transcode(&final_720, &final_480, width_480, height_480).await?;

        let report = sync::validate(&final_720).await?;
        if !report.is_valid {
            return Err(WorkerError::validation(report.errors.join("; ")));
        }
        for warning in &report.warnings {
            warn!(video_id = %run.video_id, warning, "delivery quality warning");
        }

        let size = self.services.storage.file_size(&final_480).await?.unwrap_or(0);
        let info = reelforge_media::probe_video(&final_480).await?;
        run.files.insert(
            ArtifactKind::Final480,
            ArtifactInfo {
                path: self.relative_path(&final_480),
                url: Some(self.services.urls.public_url(&self.relative_path_buf(&final_480))),
                size_bytes: size,
                format: "mp4".to_string(),
                duration_secs: Some(info.duration),
            },
        );

        run.advance();
        self.persist(run).await?;
        self.publish_progress(run, 1.0, "transcoding complete").await;
        Ok(())
    }

    fn relative_path_buf(&self, absolute: &Path) -> PathBuf {
        self.services.storage.layout().relativize(absolute).unwrap_or_else(|| absolute.to_path_buf())
    }

    fn relative_path(&self, absolute: &Path) -> String {
        self.relative_path_buf(absolute).to_string_lossy().to_string()
    }
}

/// Generate a silent audio track covering `duration_secs`, used when
/// decomposition produced no narration script.
async fn generate_silence(out: &Path, duration_secs: f64) -> WorkerResult<()> {
    let args = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
        "-t".to_string(),
        format!("{:.3}", duration_secs.max(0.1)),
        "-q:a".to_string(),
        "9".to_string(),
        "-acodec".to_string(),
        "libmp3lame".to_string(),
        out.to_string_lossy().to_string(),
    ];
    reelforge_media::command::FfmpegRunner::new().run_raw_args(&args).await?;
    Ok(())
}

/// The [lo, hi) slice of overall progress each phase owns.
fn phase_band(phase: RunPhase) -> (f64, f64) {
    match phase {
        RunPhase::Decomposing => (0.0, 0.05),
        RunPhase::Generating => (0.05, 0.70),
        RunPhase::Stitching => (0.70, 0.80),
        RunPhase::Audio => (0.80, 0.90),
        RunPhase::Merging => (0.90, 0.95),
        RunPhase::Transcoding => (0.95, 1.0),
        RunPhase::Completed => (1.0, 1.0),
        RunPhase::Failed => (0.0, 0.0),
    }
}

fn overall_progress(phase: RunPhase, phase_fraction: f64) -> f64 {
    let (lo, hi) = phase_band(phase);
    lo + (hi - lo) * phase_fraction.clamp(0.0, 1.0)
}

/// A short title derived from the prompt when prompt enhancement didn't run
/// or failed: the first few words, capped in length.
fn derive_title(prompt: &str) -> String {
    let mut words: Vec<&str> = prompt.trim().split_whitespace().take(8).collect();
    if words.is_empty() {
        words.push("Untitled");
    }
    let mut title = words.join(" ");
    if title.len() > 60 {
        title.truncate(60);
    }
    title
}

/// Uniform storyboard used when the storyboard provider's decomposition
/// fails or returns nothing: `segment_count` scenes of `segment_duration`
/// seconds each, all sharing the raw prompt as their visual description.
fn fallback_decomposition(prompt: &str, segment_count: u32, segment_duration: f64) -> Vec<Scene> {
    (0..segment_count)
        .map(|i| {
            let start = i as f64 * segment_duration;
            Scene::new(i, prompt.to_string(), start, start + segment_duration)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_title_caps_at_eight_words() {
        let title = derive_title("a very long prompt with way more than eight words describing a scene");
        assert_eq!(title.split_whitespace().count(), 8);
    }

    #[test]
    fn derive_title_handles_blank_prompt() {
        assert_eq!(derive_title("   "), "Untitled");
    }

    #[test]
    fn fallback_decomposition_produces_contiguous_scenes() {
        let scenes = fallback_decomposition("a dog runs", 3, 12.0);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].start_time_secs, 0.0);
        assert_eq!(scenes[1].start_time_secs, 12.0);
        assert_eq!(scenes[2].end_time_secs, 36.0);
        assert!(scenes.iter().all(|s| s.visual_prompt == "a dog runs"));
    }

    #[test]
    fn progress_bands_are_contiguous_and_monotonic() {
        let phases = [
            RunPhase::Decomposing,
            RunPhase::Generating,
            RunPhase::Stitching,
            RunPhase::Audio,
            RunPhase::Merging,
            RunPhase::Transcoding,
        ];
        let mut previous_hi = 0.0;
        for phase in phases {
            let (lo, hi) = phase_band(phase);
            assert_eq!(lo, previous_hi);
            assert!(hi > lo);
            previous_hi = hi;
        }
        assert_eq!(previous_hi, 1.0);
    }

    #[test]
    fn overall_progress_interpolates_within_band() {
        assert_eq!(overall_progress(RunPhase::Generating, 0.0), 0.05);
        assert_eq!(overall_progress(RunPhase::Generating, 1.0), 0.70);
        let mid = overall_progress(RunPhase::Generating, 0.5);
        assert!((mid - 0.375).abs() < 1e-9);
    }
}
