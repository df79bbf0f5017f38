//! Axum HTTP API server: the submission/tracking surface the Processing
//! Orchestrator is driven from.
//!
//! - `POST /videos/create` validates a prompt, enqueues a `GenerateVideoJob`
//!   and returns the new run's id.
//! - `GET /videos/:id`, `.../status`, `.../segments` project the persisted
//!   `VideoRun` (and, for `.../status`, the Redis-cached `JobStatusCache`)
//!   back to the caller.
//! - `POST /videos/:id/cancel`, `DELETE /videos/:id` mutate run lifecycle.
//! - `POST /prompts/enhance`, `POST /prompts/decompose` passthrough to the
//!   `StoryboardProvider`.
//! - `GET /system/status` reports lock/storage/cache/queue state.
//! - `GET /files/:id/video` streams the finished render with HTTP range
//!   support.
//! - `GET /healthz`, `/ready`, `/metrics` are ambient ops endpoints.
//!
//! No authentication or per-user account system lives here -- `userId` is
//! an opaque caller-supplied string used only for storage attribution.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
