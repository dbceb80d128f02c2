//! Shared request path for the GraphQL and REST clients.
//!
//! One call is: send (retrying timeouts), classify the status, then hand the
//! returned rate-limit reading to the guard. The guard runs after the retry
//! loop so a low budget is never retried.

use std::sync::Arc;
use std::time::Instant;

use crate::api::{ApiError, CallContext, RateLimitGuard, RateLimitReading};
use crate::clock::{Clock, SystemClock};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::retry::{RetryConfig, with_retry};

use super::error::classify_status;

pub(crate) const USER_AGENT: &str = concat!("pulse/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub(crate) struct RequestExecutor {
    http: Arc<dyn HttpTransport>,
    retry: RetryConfig,
    guard: RateLimitGuard,
    clock: Arc<dyn Clock>,
}

impl RequestExecutor {
    pub(crate) fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http,
            retry: RetryConfig::default(),
            guard: RateLimitGuard::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub(crate) fn set_retry(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    pub(crate) fn set_guard(&mut self, guard: RateLimitGuard) {
        self.guard = guard;
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    async fn send_once(
        &self,
        operation: &str,
        attempt: u32,
        request: HttpRequest,
        ctx: CallContext<'_>,
    ) -> Result<HttpResponse, ApiError> {
        if ctx.cancel.is_cancelled() {
            return Err(ApiError::cancelled(operation));
        }

        let result = tokio::select! {
            () = ctx.cancel.cancelled() => return Err(ApiError::cancelled(operation)),
            result = self.http.send(request) => result,
        };

        match result {
            Ok(resp) => {
                classify_status(operation, attempt, &resp, self.clock.now())?;
                Ok(resp)
            }
            Err(e) if e.is_timeout() => Err(ApiError::Timeout {
                operation: operation.to_string(),
                attempts: attempt,
            }),
            Err(e) => {
                tracing::debug!(operation, error = %e, "Transport failure");
                Err(ApiError::api(operation, "could not reach GitHub"))
            }
        }
    }

    /// Send `request`, retrying timeouts, and return the successful response.
    pub(crate) async fn send(
        &self,
        operation: &str,
        request: HttpRequest,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<HttpResponse, ApiError> {
        let request = request
            .bearer(token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");

        let started = Instant::now();
        let resp = with_retry(
            |attempt| self.send_once(operation, attempt, request.clone(), ctx),
            ApiError::is_timeout,
            &self.retry,
            operation,
            ctx.cancel,
            ctx.on_progress,
        )
        .await;

        if let Err(e) = &resp {
            tracing::debug!(
                operation,
                duration_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Request failed"
            );
        }
        resp
    }

    /// Log the call and apply the rate-limit policy to its reading.
    pub(crate) async fn settle(
        &self,
        operation: &str,
        started: Instant,
        reading: Option<&RateLimitReading>,
        ctx: CallContext<'_>,
    ) -> Result<(), ApiError> {
        let duration_ms = started.elapsed().as_millis() as u64;
        match reading {
            Some(reading) => {
                tracing::debug!(
                    operation,
                    duration_ms,
                    remaining = reading.remaining,
                    limit = reading.limit,
                    cost = reading.cost,
                    "Request completed"
                );
                self.guard
                    .check(reading, operation, ctx.cancel, ctx.on_progress)
                    .await
            }
            None => {
                tracing::debug!(operation, duration_ms, "Request completed without rate-limit data");
                Ok(())
            }
        }
    }
}
