//! Video processing worker binary: the Processing Orchestrator's host
//! process. Consumes `GenerateVideoJob`s from the Redis queue and drives
//! each one to a terminal `VideoRun` under the exclusive processing lock.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelforge_cache::SegmentCache;
use reelforge_providers::{HttpNarrationProvider, HttpStoryboardProvider, HttpVideoSegmentProvider};
use reelforge_queue::{JobQueue, ProgressChannel};
use reelforge_storage::{LocalStorage, PublicUrlMapper};
use reelforge_store::{FirestoreClient, FirestoreConfig, ProcessingLockRepository, VideoRunRepository};
use reelforge_worker::{JobExecutor, Orchestrator, RetryPolicy, Services, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("reelforge=info".parse().unwrap()))
        .init();

    info!("starting reelforge-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    if let Err(e) = run(config).await {
        error!(error = %e, "worker exited with error");
        std::process::exit(1);
    }
}

async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    let firestore_config = FirestoreConfig::from_env()?;
    let firestore = FirestoreClient::new(firestore_config).await?;

    let run_repo = Arc::new(VideoRunRepository::new(firestore.clone()));
    let lock_repo = Arc::new(ProcessingLockRepository::new(firestore));

    match lock_repo.sweep().await {
        Ok(cleared) => info!(cleared, "swept expired processing locks at startup"),
        Err(e) => error!(error = %e, "failed to sweep expired processing locks at startup"),
    }

    let storyboard = Arc::new(HttpStoryboardProvider::from_env()?);
    let segments = Arc::new(HttpVideoSegmentProvider::from_env()?);
    let narration = Arc::new(HttpNarrationProvider::from_env()?);

    let cache_root = std::path::Path::new(&config.upload_dir).join("cache/segments");
    let cache = Arc::new(SegmentCache::new(cache_root, config.cache_hash_len).await?);
    let storage = Arc::new(LocalStorage::new(&config.upload_dir));

    let public_base_url = std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080/files".to_string());
    let urls = Arc::new(PublicUrlMapper::new(public_base_url));

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let progress = Arc::new(ProgressChannel::new(&redis_url)?);

    let services = Services {
        run_repo,
        lock_repo,
        storyboard,
        segments,
        narration,
        cache,
        storage,
        urls,
        progress,
    };

    let retry_policy = RetryPolicy::from_env();
    let orchestrator = Orchestrator::new(services, config.clone(), retry_policy);

    let queue = JobQueue::from_env()?;
    let executor = Arc::new(JobExecutor::new(config, queue, orchestrator));

    let run_handle = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received (ctrl-c)"),
        _ = term.recv() => info!("shutdown signal received (sigterm)"),
    }
    executor.shutdown();

    run_handle.await??;
    info!("worker shutdown complete");
    Ok(())
}
