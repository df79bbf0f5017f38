//! Application state.

use std::sync::Arc;

use reelforge_cache::SegmentCache;
use reelforge_providers::{HttpStoryboardProvider, StoryboardProvider};
use reelforge_queue::{JobQueue, ProgressChannel};
use reelforge_storage::{LocalStorage, PublicUrlMapper};
use reelforge_store::{FirestoreClient, FirestoreConfig, ProcessingLockRepository, VideoRunRepository};

use crate::config::ApiConfig;

/// Shared application state. Holds the same repositories/services the
/// worker's `Services` bundle holds, minus anything only the orchestrator
/// itself needs (providers other than storyboard, sync verification).
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub run_repo: Arc<VideoRunRepository>,
    pub lock_repo: Arc<ProcessingLockRepository>,
    pub queue: Arc<JobQueue>,
    pub progress: Arc<ProgressChannel>,
    pub storage: Arc<LocalStorage>,
    pub cache: Arc<SegmentCache>,
    pub urls: Arc<PublicUrlMapper>,
    pub storyboard: Arc<dyn StoryboardProvider>,
    pub upload_dir: String,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let firestore_config = FirestoreConfig::from_env()?;
        let firestore = FirestoreClient::new(firestore_config).await?;

        let run_repo = Arc::new(VideoRunRepository::new(firestore.clone()));
        let lock_repo = Arc::new(ProcessingLockRepository::new(firestore));

        let queue = JobQueue::from_env()?;

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let progress = ProgressChannel::new(&redis_url)?;

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "/tmp/reelforge".to_string());
        let storage = Arc::new(LocalStorage::new(&upload_dir));

        let cache_hash_len: usize = std::env::var("CACHE_HASH_LEN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(32);
        let cache_root = std::path::Path::new(&upload_dir).join("cache/segments");
        let cache = Arc::new(SegmentCache::new(cache_root, cache_hash_len).await?);

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080/files".to_string());
        let urls = Arc::new(PublicUrlMapper::new(public_base_url));

        let storyboard: Arc<dyn StoryboardProvider> = Arc::new(HttpStoryboardProvider::from_env()?);

        Ok(Self {
            config,
            run_repo,
            lock_repo,
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            storage,
            cache,
            urls,
            storyboard,
            upload_dir,
        })
    }
}
