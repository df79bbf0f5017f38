//! Job executor: consumes `GenerateVideoJob`s from `reelforge-queue` and
//! drives each one through the `Orchestrator` to a terminal `VideoRun`.
//!
//! Single-active-worker scheduling is enforced two ways: a
//! `Semaphore::new(max_concurrent_jobs)` bounding how many jobs this
//! process will drive at once (default 1), and the processing lock itself,
//! which is what actually makes a multi-instance deployment safe. A
//! periodic claim pass reclaims stream entries abandoned by a crashed
//! consumer and feeds them back through the same per-job path, where
//! `Orchestrator::run`'s own recovery step (not this loop) decides how to
//! resume.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reelforge_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::error::{Classification, WorkerError, WorkerResult};
use crate::orchestrator::Orchestrator;

/// Consumes jobs from the queue and runs them through the orchestrator.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, orchestrator: Orchestrator) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("{}-{}", config.worker_id, Uuid::new_v4());
        Self {
            config,
            queue: Arc::new(queue),
            orchestrator: Arc::new(orchestrator),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run the consumption loop until shutdown is signalled. Spawns a
    /// sibling task that periodically reclaims abandoned pending entries.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "starting job executor"
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        info!("waiting for in-flight jobs to complete");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_jobs()).await;
        info!("job executor stopped");
        Ok(())
    }

    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let orchestrator = Arc::clone(&self.orchestrator);
        let consumer_name = self.consumer_name.clone();
        let semaphore = Arc::clone(&self.job_semaphore);
        let min_idle = self.config.claim_min_idle;
        let interval = self.config.claim_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle.as_millis() as u64, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!(count = jobs.len(), "claimed abandoned pending jobs");
                                for (message_id, job) in jobs {
                                    let permit = match semaphore.clone().acquire_owned().await {
                                        Ok(permit) => permit,
                                        Err(_) => break,
                                    };
                                    let queue = Arc::clone(&queue);
                                    let orchestrator = Arc::clone(&orchestrator);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute(&orchestrator, &queue, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "failed to claim pending jobs"),
                        }
                    }
                }
            }
        })
    }

    async fn consume_once(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self.queue.consume(&self.consumer_name, 1000, available.min(5)).await?;
        if jobs.is_empty() {
            return Ok(());
        }
        debug!(count = jobs.len(), "consumed jobs from stream");

        for (message_id, job) in jobs {
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config("job semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                let _permit = permit;
                Self::execute(&orchestrator, &queue, message_id, job).await;
            });
        }
        Ok(())
    }

    /// Run one job through the orchestrator, then ack/DLQ it on the queue.
    /// The orchestrator's own `VideoRun` persistence is the durable record
    /// of outcome; the queue ack is just "stop redelivering this message".
    async fn execute(
        orchestrator: &Orchestrator,
        queue: &JobQueue,
        message_id: String,
        job: reelforge_models::GenerateVideoJob,
    ) {
        info!(video_id = %job.video_id, job_id = %job.job_id, "executing job");

        match orchestrator.run(job.video_id.clone(), job.spec.clone()).await {
            Ok(run) => {
                info!(video_id = %run.video_id, phase = %run.phase, "job finished");
                if let Err(e) = queue.ack(&message_id).await {
                    error!(video_id = %job.video_id, error = %e, "failed to ack job");
                }
                if let Err(e) = queue.clear_dedup(&job.video_id).await {
                    warn!(video_id = %job.video_id, error = %e, "failed to clear dedup key");
                }
            }
            Err(e) => {
                error!(video_id = %job.video_id, error = %e, "job failed");
                if e.classify() == Classification::Busy {
                    // Another run holds the lock; leave the message
                    // unacked so it gets redelivered once the lock frees.
                    return;
                }
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                    error!(video_id = %job.video_id, error = %dlq_err, "failed to move job to DLQ");
                }
                if let Err(e) = queue.clear_dedup(&job.video_id).await {
                    warn!(video_id = %job.video_id, error = %e, "failed to clear dedup key");
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs.max(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
