//! Client traits and HTTP implementations for the three external services
//! the orchestrator drives: storyboard generation, video segment
//! generation, and narration synthesis.
//!
//! Fallback behavior for a failing provider (degraded enhance/decompose
//! output) is orchestrator policy, not client behavior, and lives in
//! `reelforge-worker`.

pub mod error;
pub mod narration;
pub mod segment;
pub mod storyboard;
pub mod traits;
pub mod types;

pub use error::{Classification, ProviderError, ProviderResult};
pub use narration::HttpNarrationProvider;
pub use segment::HttpVideoSegmentProvider;
pub use storyboard::HttpStoryboardProvider;
pub use traits::{NarrationProvider, StoryboardProvider, VideoSegmentProvider};
pub use types::{ContinuityHint, EnhancedPrompt, JobHandle, SegmentJobState, VoiceSettings};
