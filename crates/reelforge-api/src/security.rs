//! Security utilities for input validation and sanitization.
//!
//! This module provides input sanitization and ID-format validation. There
//! is no URL whitelist here -- this API never asks its caller for a URL to
//! fetch; a `VideoSpec` is a text prompt.

/// Maximum prompt length.
pub const MAX_PROMPT_LENGTH: usize = 4000;

/// Maximum title length.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Sanitize a user-provided string for safe logging and storage.
///
/// This removes control characters (keeping newlines/tabs) and caps length.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_PROMPT_LENGTH)
        .collect()
}

/// Sanitize a title for safe storage.
pub fn sanitize_title(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() > MAX_TITLE_LENGTH {
        trimmed.chars().take(MAX_TITLE_LENGTH).collect()
    } else {
        trimmed.to_string()
    }
}

/// Validate a video ID's shape before it reaches a repository lookup.
///
/// Video IDs are either a UUID (the deterministic idempotency mapping from
/// `request_id`) or an arbitrary caller-supplied string from an older
/// record; either way they should never contain path separators.
pub fn is_valid_video_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 128 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_string_strips_control_chars_but_keeps_newlines() {
        let input = "hello\u{0007}\nworld\u{0000}";
        assert_eq!(sanitize_string(input), "hello\nworld");
    }

    #[test]
    fn sanitize_title_truncates_to_max_length() {
        let long = "x".repeat(MAX_TITLE_LENGTH + 50);
        assert_eq!(sanitize_title(&long).len(), MAX_TITLE_LENGTH);
    }

    #[test]
    fn video_id_validation_rejects_path_traversal() {
        assert!(is_valid_video_id("2f3e6a10-1111-4c22-9a11-abcdefabcdef"));
        assert!(!is_valid_video_id("../../etc/passwd"));
        assert!(!is_valid_video_id(""));
    }
}
