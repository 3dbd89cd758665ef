//! Grepable error codes shared by every service error type.

/// Stable, machine-readable classification for an error.
///
/// `retryable` marks transient failures; the oracle retry policy keys off it.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
