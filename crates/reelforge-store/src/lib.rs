//! Firestore REST API client and repositories for video run and lock
//! documents.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)
//!
//! ## Modules
//! - `client` - Main Firestore REST API client
//! - `token_cache` - Thread-safe access token caching
//! - `retry` - Retry policy with exponential backoff
//! - `metrics` - Prometheus metrics collection
//! - `lock_repo` - The exclusive processing lock document
//! - `video_run_repo` - The per-video run document
//! - `types` - Firestore document types and value conversions

pub mod client;
pub mod error;
pub mod lock_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod video_run_repo;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use lock_repo::ProcessingLockRepository;
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use video_run_repo::VideoRunRepository;

