//! Redis Streams job queue and progress pub/sub.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams (single job kind: `GenerateVideoJob`)
//! - Worker consumption with retry/DLQ
//! - Progress events via Redis Pub/Sub, keyed by video ID

pub mod error;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::{
    ProgressChannel,
    HEARTBEAT_TTL_SECS, PROGRESS_HISTORY_TTL_SECS, JOB_STATUS_TTL_SECS,
    STALE_GRACE_PERIOD_SECS, STALE_THRESHOLD_SECS,
};
pub use queue::{JobQueue, QueueConfig};

pub use reelforge_models::{GenerateVideoJob, JobStatus, JobStatusCache, ProgressEvent};
