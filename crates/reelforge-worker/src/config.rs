//! Worker configuration, loaded from the environment table in the system's
//! config surface plus the ambient keys every `*Config::from_env()` in the
//! workspace needs.

use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parse(key, default_secs))
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_parse(key, default_ms))
}

/// Worker/orchestrator configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Validation bounds for `targetDuration`, enforced at the API
    /// boundary but also honored here as a defensive clamp.
    pub min_video_duration_secs: f64,
    pub max_video_duration_secs: f64,
    /// Default segment size: 12s, or 5s when the target duration itself
    /// is 5s.
    pub segment_duration_secs: f64,
    /// Per-segment retry cap.
    pub max_segment_retries: u32,
    /// Parallel-mode upper bound. Batch/parallel mode is opt-in and never
    /// silently enabled.
    pub max_concurrent_jobs: usize,
    /// Generator poll cadence.
    pub polling_interval: Duration,
    /// Wall-clock bounds.
    pub video_timeout: Duration,
    pub segment_timeout: Duration,
    pub lock_timeout: Duration,
    /// Storage root (on-disk tree for a run's artifacts).
    pub upload_dir: String,
    /// Cache key truncation length, configurable, default 32.
    pub cache_hash_len: usize,
    /// ffmpeg/ffprobe child process timeout.
    pub ffmpeg_timeout: Duration,
    /// Owner identity this worker process acquires the lock under.
    pub worker_id: String,
    /// How often the executor scans for abandoned pending entries
    /// (crash recovery) and sweeps stale runs.
    pub claim_interval: Duration,
    /// Minimum idle time before a pending queue entry is reclaimed.
    pub claim_min_idle: Duration,
    /// Interval for extending the processing lock while a run is active.
    pub lock_heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_video_duration_secs: 5.0,
            max_video_duration_secs: 120.0,
            segment_duration_secs: 12.0,
            max_segment_retries: 3,
            max_concurrent_jobs: 1,
            polling_interval: Duration::from_secs(10),
            video_timeout: Duration::from_secs(30 * 60),
            segment_timeout: Duration::from_secs(15 * 60),
            lock_timeout: Duration::from_secs(30 * 60),
            upload_dir: "/tmp/reelforge".to_string(),
            cache_hash_len: 32,
            ffmpeg_timeout: Duration::from_secs(10 * 60),
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(5 * 60),
            lock_heartbeat_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            min_video_duration_secs: env_parse("MIN_VIDEO_DURATION", default.min_video_duration_secs),
            max_video_duration_secs: env_parse("MAX_VIDEO_DURATION", default.max_video_duration_secs),
            segment_duration_secs: env_parse("SEGMENT_DURATION", default.segment_duration_secs),
            max_segment_retries: env_parse("MAX_SEGMENT_RETRIES", default.max_segment_retries),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", default.max_concurrent_jobs),
            polling_interval: env_millis("POLLING_INTERVAL_MS", default.polling_interval.as_millis() as u64),
            video_timeout: env_millis("VIDEO_TIMEOUT_MS", default.video_timeout.as_millis() as u64),
            segment_timeout: env_millis("SEGMENT_TIMEOUT_MS", default.segment_timeout.as_millis() as u64),
            lock_timeout: env_millis("LOCK_TIMEOUT_MS", default.lock_timeout.as_millis() as u64),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or(default.upload_dir),
            cache_hash_len: env_parse("CACHE_HASH_LEN", default.cache_hash_len),
            ffmpeg_timeout: env_secs("FFMPEG_TIMEOUT_SECS", default.ffmpeg_timeout.as_secs()),
            worker_id: std::env::var("WORKER_ID").unwrap_or(default.worker_id),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", default.claim_interval.as_secs()),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", default.claim_min_idle.as_secs()),
            lock_heartbeat_interval: env_secs(
                "WORKER_LOCK_HEARTBEAT_SECS",
                default.lock_heartbeat_interval.as_secs(),
            ),
        }
    }

    /// The segment duration used for a given target duration: 5s when the
    /// whole video is exactly 5s, the configured default otherwise.
    pub fn segment_duration_for(&self, target_duration_secs: f64) -> f64 {
        if (target_duration_secs - 5.0).abs() < f64::EPSILON {
            5.0
        } else {
            self.segment_duration_secs
        }
    }

    /// `ceil(targetDuration / segmentDuration)`.
    pub fn segment_count_for(&self, target_duration_secs: f64) -> u32 {
        let segment_duration = self.segment_duration_for(target_duration_secs);
        (target_duration_secs / segment_duration).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.min_video_duration_secs, 5.0);
        assert_eq!(config.max_video_duration_secs, 120.0);
        assert_eq!(config.segment_duration_secs, 12.0);
        assert_eq!(config.max_segment_retries, 3);
        assert_eq!(config.max_concurrent_jobs, 1);
    }

    #[test]
    fn five_second_video_uses_five_second_segment() {
        let config = WorkerConfig::default();
        assert_eq!(config.segment_duration_for(5.0), 5.0);
        assert_eq!(config.segment_count_for(5.0), 1);
    }

    #[test]
    fn hundred_twenty_second_video_has_ten_segments() {
        let config = WorkerConfig::default();
        assert_eq!(config.segment_duration_for(120.0), 12.0);
        assert_eq!(config.segment_count_for(120.0), 10);
    }

    #[test]
    fn sixty_second_video_has_five_segments() {
        let config = WorkerConfig::default();
        assert_eq!(config.segment_count_for(60.0), 5);
    }
}
