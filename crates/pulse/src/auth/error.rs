use std::fmt;

use thiserror::Error;

/// Why an installation can no longer mint tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// Paused by an administrator; can be resumed.
    Suspended,
    /// Uninstalled or deleted.
    Removed,
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => write!(
                f,
                "the GitHub App installation is suspended; ask an organization admin to unsuspend it"
            ),
            Self::Removed => write!(
                f,
                "the GitHub App installation was removed; reinstall the app to resume syncing"
            ),
        }
    }
}

/// Errors raised while obtaining an access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("{reason}")]
    Deactivated { reason: DeactivationReason },

    #[error("no credentials configured: set a GitHub App installation or an OAuth token")]
    NoCredentials,

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("installation lookup failed: {0}")]
    Store(String),

    #[error("invalid GitHub App private key: {0}")]
    InvalidKey(String),
}

impl TokenError {
    #[inline]
    pub fn is_deactivated(&self) -> bool {
        matches!(self, Self::Deactivated { .. })
    }

    /// Whether rescheduling could succeed without operator action.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::Store(_))
    }
}
