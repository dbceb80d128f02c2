//! Bounded exponential-backoff retry for upstream calls.
//!
//! Only transient failures are retried here; the caller decides which errors
//! qualify. Backoff sleeps are cut short when the operation is cancelled.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;

use crate::clock::sleep_or_cancel;
use crate::sync::{ProgressCallback, SyncProgress};

/// Default number of attempts (the first call plus two retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Multiplier applied to the delay after every retry.
    pub factor: f32,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Default delays with a custom attempt bound.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Execute an operation, retrying errors that `is_retryable` accepts.
///
/// The operation receives the 1-indexed attempt number so it can report how
/// many attempts were spent when it gives up. Each backoff is reported via
/// [`SyncProgress::RetryBackoff`] and a `warn` log line. Once `cancel` fires,
/// pending backoff sleeps end immediately and no further retries are
/// scheduled; the operation itself is expected to observe the token.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    is_retryable: IsRetryable,
    config: &RetryConfig,
    label: &str,
    cancel: &CancellationToken,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    IsRetryable: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        let current = attempt.fetch_add(1, Ordering::SeqCst) + 1;
        operation(current)
    };

    let sleep_token = cancel.clone();
    let sleeper = move |dur: Duration| {
        let token = sleep_token.clone();
        async move {
            sleep_or_cancel(dur, &token).await;
        }
    };

    retry_op
        .retry(config.clone().into_backoff())
        .sleep(sleeper)
        .when(|err| !cancel.is_cancelled() && is_retryable(err))
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(SyncProgress::RetryBackoff {
                    operation: label.to_string(),
                    attempt: current_attempt,
                    retry_after_ms: dur.as_millis() as u64,
                });
            }
            tracing::warn!(
                operation = label,
                attempt = current_attempt,
                retry_in_ms = dur.as_millis() as u64,
                "Retrying after transient failure: {err}"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct TestError {
        message: &'static str,
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for TestError {}

    fn transient() -> TestError {
        TestError {
            message: "timed out",
            transient: true,
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_delay, Duration::from_secs(1));
        assert_eq!(config.factor, 2.0);
        assert!(!config.with_jitter);
    }

    #[test]
    fn test_retry_config_custom() {
        let config = RetryConfig::new(5).with_jitter(true);
        assert_eq!(config.max_attempts, 5);
        assert!(config.with_jitter);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_with_doubling_delays() {
        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            events_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        let seen_attempts = Arc::new(Mutex::new(Vec::new()));
        let seen_capture = Arc::clone(&seen_attempts);
        let operation = move |attempt: u32| {
            seen_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(attempt);
            async move {
                if attempt < 3 {
                    Err(transient())
                } else {
                    Ok(attempt)
                }
            }
        };

        let started = tokio::time::Instant::now();
        let result = with_retry(
            operation,
            |e: &TestError| e.transient,
            &RetryConfig::default(),
            "pull_requests",
            &CancellationToken::new(),
            Some(&callback),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            *seen_attempts.lock().unwrap_or_else(|e| e.into_inner()),
            vec![1, 2, 3]
        );
        // 1s + 2s of backoff.
        assert!(started.elapsed() >= Duration::from_secs(3));

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        let delays: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SyncProgress::RetryBackoff { retry_after_ms, .. } => Some(*retry_after_ms),
                _ => None,
            })
            .collect();
        assert_eq!(delays, vec![1000, 2000]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let err = with_retry(
            move |_attempt| {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            },
            |e: &TestError| e.transient,
            &RetryConfig::new(3),
            "members",
            &CancellationToken::new(),
            None,
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let err = with_retry(
            move |_attempt| {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(TestError {
                        message: "forbidden",
                        transient: false,
                    })
                }
            },
            |e: &TestError| e.transient,
            &RetryConfig::default(),
            "members",
            &CancellationToken::new(),
            None,
        )
        .await
        .expect_err("expected error");

        assert_eq!(err.to_string(), "forbidden");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_capture = Arc::clone(&calls);

        let result = with_retry(
            move |_attempt| {
                calls_capture.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            },
            |e: &TestError| e.transient,
            &RetryConfig::default(),
            "members",
            &cancel,
            None,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
