//! Worker error types and the classification taxonomy the orchestrator and
//! retry policy dispatch on.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// The error-kind taxonomy the retry policy and the HTTP layer both
/// dispatch on, replacing string-matched control flow with a tagged sum
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Malformed input; rejected at the API boundary, never reaches here.
    Validation,
    /// The processing lock is held by another run.
    Busy,
    /// Network/rate-limit/5xx-equivalent; safe to retry with backoff.
    Transient,
    /// A segment exhausted its retries; the whole run fails.
    SegmentFailed,
    /// The ffmpeg/ffprobe child process failed.
    ToolchainError,
    /// Invalid credentials, quota exhausted -- retrying will not help.
    ProviderFatal,
    /// The caller requested cancellation.
    Cancelled,
    /// The worker process crashed mid-phase; recovery decides what's next.
    Interrupted,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("processing lock unavailable")]
    Busy,

    #[error("segment {segment} failed after {attempts} attempts: {reason}")]
    SegmentFailed {
        segment: u32,
        attempts: u32,
        reason: String,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(#[from] reelforge_providers::ProviderError),

    #[error("media error: {0}")]
    Media(#[from] reelforge_media::MediaError),

    #[error("storage error: {0}")]
    Storage(#[from] reelforge_storage::StorageError),

    #[error("store error: {0}")]
    Store(#[from] reelforge_store::FirestoreError),

    #[error("cache error: {0}")]
    Cache(#[from] reelforge_cache::CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] reelforge_queue::QueueError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn segment_failed(segment: u32, attempts: u32, reason: impl Into<String>) -> Self {
        Self::SegmentFailed {
            segment,
            attempts,
            reason: reason.into(),
        }
    }

    /// Classify this error into the taxonomy the orchestrator and the
    /// retry policy both dispatch on.
    pub fn classify(&self) -> Classification {
        match self {
            WorkerError::Validation(_) => Classification::Validation,
            WorkerError::Busy => Classification::Busy,
            WorkerError::SegmentFailed { .. } => Classification::SegmentFailed,
            WorkerError::Cancelled => Classification::Cancelled,
            WorkerError::Media(e) => {
                if e.is_retryable() {
                    Classification::Transient
                } else {
                    Classification::ToolchainError
                }
            }
            WorkerError::Provider(e) => match e.classify() {
                reelforge_providers::Classification::Transient
                | reelforge_providers::Classification::RateLimited
                | reelforge_providers::Classification::ProviderUnavailable => Classification::Transient,
                reelforge_providers::Classification::Permanent => Classification::ProviderFatal,
            },
            WorkerError::Storage(_) | WorkerError::Io(_) => Classification::ToolchainError,
            WorkerError::Store(_) | WorkerError::Cache(_) | WorkerError::Queue(_) => Classification::Transient,
            WorkerError::Config(_) => Classification::ProviderFatal,
        }
    }

    /// Whether the retry policy should give this error another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.classify(), Classification::Transient)
    }

    /// Fallback classification for an opaque error message (e.g. a
    /// provider that returned a bare string instead of a structured
    /// error). Used only when the failing call couldn't give us a typed
    /// error to classify structurally.
    pub fn is_transient_message(msg: &str) -> bool {
        crate::retry::is_transient_by_message(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_failed_classifies_as_segment_failed() {
        let err = WorkerError::segment_failed(5, 3, "provider gave up");
        assert_eq!(err.classify(), Classification::SegmentFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn busy_does_not_retry() {
        assert_eq!(WorkerError::Busy.classify(), Classification::Busy);
        assert!(!WorkerError::Busy.is_retryable());
    }

    #[test]
    fn cancelled_classifies_as_cancelled() {
        assert_eq!(WorkerError::Cancelled.classify(), Classification::Cancelled);
    }

    #[test]
    fn provider_fatal_is_not_retryable() {
        let err = WorkerError::Provider(reelforge_providers::ProviderError::bad_response(401, "invalid api key"));
        assert_eq!(err.classify(), Classification::ProviderFatal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn provider_transient_is_retryable() {
        let err = WorkerError::Provider(reelforge_providers::ProviderError::RateLimited("quota exceeded for window".into()));
        assert_eq!(err.classify(), Classification::Transient);
        assert!(err.is_retryable());
    }
}
