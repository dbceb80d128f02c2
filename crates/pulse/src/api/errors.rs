use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by an upstream API call.
///
/// Messages are safe to show to end users: they name the operation but never
/// carry tokens, installation ids or raw transport output. Underlying causes
/// are logged where the error is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The points budget fell below the threshold and waiting was not allowed.
    #[error(
        "{operation}: rate limit budget exhausted ({remaining} points remaining, resets at {reset_at})"
    )]
    RateLimited {
        operation: String,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },

    /// Every attempt timed out.
    #[error("{operation} timed out after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    /// The credential lacks access to the requested resource.
    #[error(
        "{operation}: permission denied ({message}). Re-grant the required permissions to the integration and retry"
    )]
    Permission { operation: String, message: String },

    /// Any other upstream failure.
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    /// The owning task was cancelled.
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl ApiError {
    /// Create a generic API error.
    #[inline]
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a permission error.
    #[inline]
    pub fn permission(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Generic failures are the only ones a REST re-run can help with.
    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Whether an outer task queue should reschedule the operation.
    ///
    /// Permission problems do not heal on their own; everything else might.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permission { .. })
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps progress output and
/// recorded per-item errors on a single line.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_message_includes_remaining_points() {
        let err = ApiError::RateLimited {
            operation: "pull_requests".to_string(),
            remaining: 50,
            reset_at: Utc::now(),
        };
        let msg = err.to_string();
        assert!(msg.contains("50"));
        assert!(msg.contains("pull_requests"));
        assert!(err.is_rate_limited());
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_message_includes_attempts() {
        let err = ApiError::Timeout {
            operation: "members".to_string(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "members timed out after 3 attempts");
        assert!(err.is_timeout());
    }

    #[test]
    fn permission_error_guides_regrant_and_is_not_retryable() {
        let err = ApiError::permission("pull_requests", "Resource not accessible by integration");
        assert!(err.to_string().contains("Re-grant"));
        assert!(!err.is_retryable());
        assert!(!err.is_generic());
    }

    #[test]
    fn short_error_message_takes_first_line() {
        let err = ApiError::api("count", "bad gateway\nstack details");
        assert_eq!(short_error_message(&err), "count failed: bad gateway");
    }
}
