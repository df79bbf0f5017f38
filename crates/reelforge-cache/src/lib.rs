//! Content-addressed segment cache with a JSON manifest, TTL and cleanup.

pub mod cache;
pub mod error;
pub mod manifest;

pub use cache::{CacheStats, SegmentCache, CLEANUP_INTERVAL_HOURS, DEFAULT_HASH_LEN};
pub use error::{CacheError, CacheResult};
pub use manifest::Manifest;
