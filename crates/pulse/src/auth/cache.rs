//! Installation token cache with a per-installation refresh lock.
//!
//! Every lookup first re-reads the installation's status from the
//! authoritative [`InstallationStore`], so a revocation that lands while a
//! sync is running is seen on the next page even when the cached token is
//! still fresh. Refreshes are serialized per installation and re-checked
//! after the lock is acquired, so a crowd of callers holding the same expired
//! token triggers exactly one upstream fetch.

use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};

use super::{DeactivationReason, TokenError};

/// Numeric GitHub App installation id.
pub type InstallationId = u64;

/// Tokens expiring within this window are refreshed early.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// A bearer token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    /// `None` means the token does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// True when the token outlives `now + buffer`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        match self.expires_at {
            Some(exp) => exp > now + buffer,
            None => true,
        }
    }
}

/// Authoritative state of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationStatus {
    Active,
    Suspended { suspended_at: DateTime<Utc> },
    Removed,
}

impl InstallationStatus {
    fn deactivation(self) -> Option<DeactivationReason> {
        match self {
            Self::Active => None,
            Self::Suspended { .. } => Some(DeactivationReason::Suspended),
            Self::Removed => Some(DeactivationReason::Removed),
        }
    }
}

/// Source of truth for whether an installation is still active.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    async fn status(&self, installation: InstallationId) -> Result<InstallationStatus, TokenError>;
}

/// Mints a fresh token for an installation.
///
/// Implementations own durable storage of the result, if any.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self, installation: InstallationId) -> Result<CachedToken, TokenError>;
}

#[derive(Default)]
struct TokenSlot {
    token: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl TokenSlot {
    fn valid(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> Option<String> {
        let guard = self.token.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| t.is_valid_at(now, buffer))
            .map(|t| t.value.clone())
    }

    fn store(&self, token: Option<CachedToken>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }
}

/// Caches installation tokens and refreshes them on demand.
pub struct TokenCache {
    store: Arc<dyn InstallationStore>,
    fetcher: Arc<dyn TokenFetcher>,
    clock: Arc<dyn Clock>,
    buffer: chrono::Duration,
    slots: DashMap<InstallationId, Arc<TokenSlot>>,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("buffer", &self.buffer)
            .field("installations", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(store: Arc<dyn InstallationStore>, fetcher: Arc<dyn TokenFetcher>) -> Self {
        Self {
            store,
            fetcher,
            clock: Arc::new(SystemClock),
            buffer: chrono::Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
            slots: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_expiry_buffer(mut self, buffer: chrono::Duration) -> Self {
        self.buffer = buffer;
        self
    }

    fn slot(&self, installation: InstallationId) -> Arc<TokenSlot> {
        self.slots
            .entry(installation)
            .or_insert_with(|| Arc::new(TokenSlot::default()))
            .clone()
    }

    /// Prime the cache with a token loaded from elsewhere.
    pub fn seed(&self, installation: InstallationId, token: CachedToken) {
        self.slot(installation).store(Some(token));
    }

    /// Current cached token, valid or not.
    pub fn cached(&self, installation: InstallationId) -> Option<CachedToken> {
        let slot = self.slots.get(&installation)?;
        let guard = slot.token.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Drop the cached token so the next call refreshes.
    pub fn invalidate(&self, installation: InstallationId) {
        if let Some(slot) = self.slots.get(&installation) {
            slot.store(None);
        }
    }

    async fn ensure_active(&self, installation: InstallationId) -> Result<(), TokenError> {
        let status = self.store.status(installation).await?;
        match status.deactivation() {
            None => Ok(()),
            Some(reason) => {
                tracing::warn!(
                    installation,
                    reason = ?reason,
                    "Installation deactivated, discarding cached token"
                );
                self.invalidate(installation);
                Err(TokenError::Deactivated { reason })
            }
        }
    }

    /// Return a valid token for `installation`, refreshing if needed.
    pub async fn get_token(&self, installation: InstallationId) -> Result<String, TokenError> {
        self.ensure_active(installation).await?;

        let slot = self.slot(installation);
        if let Some(token) = slot.valid(self.clock.now(), self.buffer) {
            return Ok(token);
        }

        let _guard = slot.refresh.lock().await;

        // Another caller may have refreshed, or the installation may have
        // been revoked, while this one waited for the lock.
        self.ensure_active(installation).await?;
        if let Some(token) = slot.valid(self.clock.now(), self.buffer) {
            tracing::debug!(installation, "Token refreshed by a concurrent caller");
            return Ok(token);
        }

        let fresh = self.fetcher.fetch(installation).await?;
        tracing::debug!(
            installation,
            expires_at = ?fresh.expires_at,
            "Refreshed installation token"
        );
        let value = fresh.value.clone();
        slot.store(Some(fresh));
        Ok(value)
    }
}
