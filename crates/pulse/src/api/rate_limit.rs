//! Reactive rate-limit budgeting.
//!
//! The guard runs after every upstream call with the reading that call
//! returned. A low budget either blocks until the reset instant or fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock, sleep_or_cancel};
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::ApiError;

/// Points remaining below which the guard intervenes.
pub const DEFAULT_THRESHOLD: u32 = 100;

/// Longest the guard will wait for a reset by default.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600);

/// Rate-limit state reported alongside an upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitReading {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Points charged for the call, when the upstream reports it.
    #[serde(default)]
    pub cost: Option<u32>,
}

/// How to react to a low budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub threshold: u32,
    pub wait_for_reset: bool,
    pub max_wait: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            wait_for_reset: true,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl RateLimitPolicy {
    /// Fail immediately instead of waiting for the reset.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self {
            wait_for_reset: false,
            ..Self::default()
        }
    }
}

/// Applies a [`RateLimitPolicy`] to readings.
#[derive(Clone)]
pub struct RateLimitGuard {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitGuard")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimitGuard {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

impl RateLimitGuard {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Seconds to wait for `reading` to reset, including a one-second buffer.
    pub fn wait_for(&self, reading: &RateLimitReading) -> Duration {
        let until_reset = (reading.reset_at - self.clock.now()).num_seconds().max(0);
        Duration::from_secs(until_reset as u64 + 1)
    }

    /// Check a reading, blocking or failing when the budget is low.
    pub async fn check(
        &self,
        reading: &RateLimitReading,
        operation: &str,
        cancel: &CancellationToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<(), ApiError> {
        if reading.remaining >= self.policy.threshold {
            return Ok(());
        }

        if self.policy.wait_for_reset {
            let wait = self.wait_for(reading);
            if wait <= self.policy.max_wait {
                tracing::warn!(
                    operation,
                    remaining = reading.remaining,
                    wait_secs = wait.as_secs(),
                    "Rate limit budget low, waiting for reset"
                );
                emit(
                    on_progress,
                    SyncProgress::RateLimitWait {
                        operation: operation.to_string(),
                        remaining: reading.remaining,
                        wait_secs: wait.as_secs(),
                    },
                );

                if !sleep_or_cancel(wait, cancel).await {
                    return Err(ApiError::cancelled(operation));
                }
                return Ok(());
            }

            tracing::warn!(
                operation,
                remaining = reading.remaining,
                wait_secs = wait.as_secs(),
                max_wait_secs = self.policy.max_wait.as_secs(),
                "Rate limit reset is further away than the allowed wait"
            );
        }

        Err(ApiError::RateLimited {
            operation: operation.to_string(),
            remaining: reading.remaining,
            reset_at: reading.reset_at,
        })
    }
}
