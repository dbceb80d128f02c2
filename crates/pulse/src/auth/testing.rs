//! In-memory auth collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    CachedToken, InstallationId, InstallationStatus, InstallationStore, TokenError, TokenFetcher,
};

/// Installation statuses held in memory; unknown ids are reported removed.
#[derive(Debug, Default)]
pub struct StaticInstallationStore {
    statuses: Mutex<HashMap<InstallationId, InstallationStatus>>,
}

impl StaticInstallationStore {
    pub fn active(ids: &[InstallationId]) -> Self {
        let statuses = ids
            .iter()
            .map(|id| (*id, InstallationStatus::Active))
            .collect();
        Self {
            statuses: Mutex::new(statuses),
        }
    }

    pub fn set(&self, installation: InstallationId, status: InstallationStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(installation, status);
    }
}

#[async_trait]
impl InstallationStore for StaticInstallationStore {
    async fn status(&self, installation: InstallationId) -> Result<InstallationStatus, TokenError> {
        let statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(statuses
            .get(&installation)
            .copied()
            .unwrap_or(InstallationStatus::Removed))
    }
}

/// Mints `token-<n>` on the n-th call and counts calls.
#[derive(Debug)]
pub struct CountingTokenFetcher {
    calls: AtomicUsize,
    expires_at: Option<DateTime<Utc>>,
    delay: Option<Duration>,
}

impl CountingTokenFetcher {
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            expires_at: Some(expires_at),
            delay: None,
        }
    }

    /// Tokens that never expire.
    pub fn non_expiring() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            expires_at: None,
            delay: None,
        }
    }

    /// Hold every fetch for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenFetcher for CountingTokenFetcher {
    async fn fetch(&self, _installation: InstallationId) -> Result<CachedToken, TokenError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(CachedToken::new(format!("token-{n}"), self.expires_at))
    }
}
