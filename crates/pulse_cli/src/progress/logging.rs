use pulse::sync::SyncProgress;

use super::describe_window;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::SyncStarted { target, operation } => {
                tracing::info!(sync_target = %target, operation, "Sync started");
            }

            SyncProgress::PhaseStarted {
                target,
                phase,
                days_back,
                skip_recent_days,
            } => {
                tracing::info!(
                    sync_target = %target,
                    phase,
                    window = %describe_window(days_back, skip_recent_days),
                    "Onboarding phase started"
                );
            }

            SyncProgress::TotalEstimated {
                target,
                total,
                exact,
            } => {
                tracing::debug!(sync_target = %target, total, exact, "Total estimated");
            }

            SyncProgress::FetchedPage {
                target,
                page,
                count,
                processed_so_far,
            } => {
                tracing::debug!(sync_target = %target, page, count, processed_so_far, "Fetched page");
            }

            SyncProgress::ItemFailed {
                target,
                item,
                error,
            } => {
                tracing::warn!(sync_target = %target, item = %item, error = %error, "Failed to apply record");
            }

            SyncProgress::RateLimitWait {
                operation,
                remaining,
                wait_secs,
            } => {
                tracing::warn!(
                    operation = %operation,
                    remaining,
                    wait_secs,
                    "Rate limit budget low, waiting for reset"
                );
            }

            SyncProgress::RetryBackoff {
                operation,
                attempt,
                retry_after_ms,
            } => {
                tracing::warn!(
                    operation = %operation,
                    attempt,
                    retry_after_ms,
                    "Request timed out, backing off"
                );
            }

            SyncProgress::SyncComplete {
                target,
                processed,
                errors,
            } => {
                tracing::info!(sync_target = %target, processed, errors, "Sync complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
