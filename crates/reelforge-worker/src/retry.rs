//! The segment-generation retry policy: classify, back off, cap attempts.
//!
//! Errors are classified structurally wherever the failing call returns
//! enough information to do so -- see `reelforge_providers::error::
//! Classification` and `reelforge_media::error::MediaError` -- and only
//! fall back to matching on the error text for genuinely opaque provider
//! errors (a provider returning an untyped string).

use std::time::Duration;

/// Orchestrator-facing backoff schedule: `min(base * multiplier^(attempt-1), max)`,
/// default `(2s, x2, 30s cap)`, up to 3 attempts. This is the
/// segment-generation retry policy a phase applies around a whole
/// provider round-trip, distinct from the low-level transport retries
/// `reelforge-store`'s own `RetryConfig` performs underneath a single
/// Firestore REST call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Ok(v) = std::env::var("MAX_SEGMENT_RETRIES") {
            if let Ok(n) = v.parse() {
                policy.max_attempts = n;
            }
        }
        policy
    }

    /// Delay before the given 1-indexed attempt (the delay that precedes
    /// attempt number `attempt`, i.e. `attempt=1` is the delay after the
    /// first failure before the second try).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

/// Fallback string-matching classification for opaque provider errors
/// that don't carry a structured `Classification`. Only used when a
/// provider error can't be classified structurally -- see
/// `reelforge_providers::error::Classification` for the structural path.
pub fn is_transient_by_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    const TRANSIENT_MARKERS: &[&str] = &[
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "dns",
        "rate limit",
        "429",
        "502",
        "503",
        "504",
    ];
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_defaults_match_spec() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn retry_policy_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn retry_policy_caps_at_max_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn retry_policy_from_env_overrides_max_attempts() {
        std::env::set_var("MAX_SEGMENT_RETRIES", "5");
        let policy = RetryPolicy::from_env();
        assert_eq!(policy.max_attempts, 5);
        std::env::remove_var("MAX_SEGMENT_RETRIES");
    }

    #[test]
    fn transient_message_matching() {
        assert!(is_transient_by_message("Connection reset by peer"));
        assert!(is_transient_by_message("upstream returned 503"));
        assert!(is_transient_by_message("request timed out"));
        assert!(!is_transient_by_message("invalid api key"));
    }
}
