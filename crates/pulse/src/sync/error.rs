use thiserror::Error;

use crate::api::ApiError;
use crate::auth::TokenError;

/// Errors that abort a sync operation.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(
        "invalid sync window: skip_recent_days ({skip_recent_days}) must be smaller than days_back ({days_back})"
    )]
    InvalidWindow {
        days_back: u32,
        skip_recent_days: u32,
    },

    #[error("invalid sync window: {days} days back is out of range")]
    WindowOutOfRange { days: u32 },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("target lookup failed: {0}")]
    Target(String),
}

impl SyncError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_cancelled())
    }

    /// Whether an outer task queue should reschedule the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Token(e) => e.is_retryable(),
            Self::InvalidWindow { .. }
            | Self::WindowOutOfRange { .. }
            | Self::MissingField { .. } => false,
            Self::Target(_) => true,
        }
    }
}
