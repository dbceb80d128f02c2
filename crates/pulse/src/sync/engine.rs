//! Sync engine: full, incremental, onboarding and member syncs.
//!
//! The engine composes a token provider, an [`ApiSource`] and a
//! [`Paginator`](super::Paginator) and hands every kept record to the
//! caller's [`RecordSink`]. Each public operation returns a [`SyncReport`]
//! instead of a `Result`: per-item failures land in the report's `errors`,
//! rate-limit and permission failures abort the operation as
//! [`SyncReport::Failed`], and cancellation yields the partial counts.
//!
//! # Example
//!
//! ```ignore
//! use pulse::sync::{SyncEngine, SyncWindow};
//!
//! let engine = SyncEngine::builder()
//!     .graphql(Arc::new(graphql_client))
//!     .sink(Arc::new(sink))
//!     .build()?;
//!
//! let tokens = engine.token_provider(&credentials)?;
//! let report = engine.full_sync(&repo, SyncWindow::new(Some(90), 30)?, &tokens).await;
//! ```

mod full;
mod incremental;
mod members;
mod onboard;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::api::{
    ApiError, ApiSource, CallContext, Member, PullRequest, RateLimitReading, RepoRef,
    short_error_message,
};
use crate::auth::{Credentials, TokenCache, TokenError, TokenProvider};
use crate::clock::{Clock, SystemClock};

use super::progress::{ProgressCallback, ProgressTracker, SyncProgress, emit};
use super::result::{SyncReport, SyncResult};
use super::sink::{RecordSink, SinkError};
use super::types::{SourceStrategy, SyncOptions, SyncWindow, WindowBounds};
use super::SyncError;

/// Builder for a [`SyncEngine`].
#[derive(Default)]
pub struct SyncEngineBuilder {
    graphql: Option<Arc<dyn ApiSource>>,
    rest: Option<Arc<dyn ApiSource>>,
    token_cache: Option<Arc<TokenCache>>,
    sink: Option<Arc<dyn RecordSink>>,
    options: Option<SyncOptions>,
    clock: Option<Arc<dyn Clock>>,
    progress: Option<Arc<ProgressCallback>>,
    cancel: Option<CancellationToken>,
}

impl SyncEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the GraphQL source.
    pub fn graphql(mut self, source: Arc<dyn ApiSource>) -> Self {
        self.graphql = Some(source);
        self
    }

    /// Set the REST source.
    pub fn rest(mut self, source: Arc<dyn ApiSource>) -> Self {
        self.rest = Some(source);
        self
    }

    /// Set the installation token cache shared by every target.
    pub fn token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Set where records go.
    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the progress callback.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the token that cancels running syncs.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the engine, resolving the source strategy.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingField` when the sink or the source the
    /// strategy selects is not set.
    pub fn build(self) -> Result<SyncEngine, SyncError> {
        let sink = self.sink.ok_or(SyncError::MissingField { field: "sink" })?;
        let options = self.options.unwrap_or_default();

        let (primary, fallback) = match options.strategy {
            SourceStrategy::GraphQl => {
                let graphql = self
                    .graphql
                    .ok_or(SyncError::MissingField { field: "graphql" })?;
                let fallback = if options.rest_fallback { self.rest } else { None };
                (graphql, fallback)
            }
            SourceStrategy::Rest => {
                let rest = self.rest.ok_or(SyncError::MissingField { field: "rest" })?;
                (rest, None)
            }
        };

        Ok(SyncEngine {
            primary,
            fallback,
            token_cache: self.token_cache,
            sink,
            options,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            progress: self.progress,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// One unit of work for [`SyncEngine::execute`].
#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Full {
        repo: &'a RepoRef,
        bounds: WindowBounds,
    },
    Incremental {
        repo: &'a RepoRef,
        since: DateTime<Utc>,
    },
    Members {
        org: &'a str,
    },
}

impl Operation<'_> {
    fn label(&self) -> &'static str {
        match self {
            Self::Full { .. } => "full",
            Self::Incremental { .. } => "incremental",
            Self::Members { .. } => "members",
        }
    }

    fn target(&self) -> String {
        match self {
            Self::Full { repo, .. } | Self::Incremental { repo, .. } => repo.to_string(),
            Self::Members { org } => (*org).to_string(),
        }
    }
}

/// Runs syncs against one configured upstream.
pub struct SyncEngine {
    primary: Arc<dyn ApiSource>,
    fallback: Option<Arc<dyn ApiSource>>,
    token_cache: Option<Arc<TokenCache>>,
    sink: Arc<dyn RecordSink>,
    options: SyncOptions,
    clock: Arc<dyn Clock>,
    progress: Option<Arc<ProgressCallback>>,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::new()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// The token that cancels this engine's syncs.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolve a target's credentials to a token provider.
    pub fn token_provider(&self, credentials: &Credentials) -> Result<TokenProvider, TokenError> {
        TokenProvider::resolve(credentials, self.token_cache.clone())
    }

    /// Full history sync, optionally limited to a window.
    pub async fn full_sync(
        &self,
        repo: &RepoRef,
        window: SyncWindow,
        tokens: &TokenProvider,
    ) -> SyncReport {
        let bounds = match window
            .validate()
            .and_then(|()| window.bounds(self.clock.now()))
        {
            Ok(bounds) => bounds,
            Err(e) => {
                return SyncReport::Failed {
                    error: e.to_string(),
                    retryable: false,
                };
            }
        };
        self.execute(Operation::Full { repo, bounds }, tokens).await
    }

    /// Sync pull requests updated at or after `since`.
    pub async fn incremental_sync(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
        tokens: &TokenProvider,
    ) -> SyncReport {
        self.execute(Operation::Incremental { repo, since }, tokens)
            .await
    }

    /// Sync every member of an organization.
    pub async fn sync_members(&self, org: &str, tokens: &TokenProvider) -> SyncReport {
        self.execute(Operation::Members { org }, tokens).await
    }

    /// Read the current budget through the primary source.
    pub async fn rate_limit(&self, tokens: &TokenProvider) -> Result<RateLimitReading, SyncError> {
        let token = tokens.token().await?;
        Ok(self.primary.rate_limit(&token, self.call_context()).await?)
    }

    async fn execute(&self, op: Operation<'_>, tokens: &TokenProvider) -> SyncReport {
        let target = op.target();
        tracing::info!(
            sync_target = %target,
            operation = op.label(),
            source = self.primary.name(),
            "Starting sync"
        );
        emit(
            self.on_progress(),
            SyncProgress::SyncStarted {
                target: target.clone(),
                operation: op.label(),
            },
        );

        let mut result = SyncResult::new();
        let mut outcome = self.run(op, self.primary.as_ref(), tokens, &mut result).await;

        if let Err(SyncError::Api(e)) = &outcome
            && e.is_generic()
            && let Some(fallback) = &self.fallback
        {
            tracing::warn!(
                sync_target = %target,
                error = %e,
                fallback = fallback.name(),
                "Sync failed, re-running through fallback source"
            );
            result = SyncResult::new();
            outcome = self.run(op, fallback.as_ref(), tokens, &mut result).await;
        }

        emit(
            self.on_progress(),
            SyncProgress::SyncComplete {
                target: target.clone(),
                processed: result.processed(),
                errors: result.errors.len(),
            },
        );
        self.finish(&target, outcome, &result)
    }

    async fn run(
        &self,
        op: Operation<'_>,
        source: &dyn ApiSource,
        tokens: &TokenProvider,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        match op {
            Operation::Full { repo, bounds } => {
                self.run_full(source, repo, bounds, tokens, result).await
            }
            Operation::Incremental { repo, since } => {
                self.run_incremental(source, repo, since, tokens, result)
                    .await
            }
            Operation::Members { org } => self.run_members(source, org, tokens, result).await,
        }
    }

    fn finish(
        &self,
        target: &str,
        outcome: Result<(), SyncError>,
        result: &SyncResult,
    ) -> SyncReport {
        match outcome {
            Ok(()) => {
                tracing::info!(
                    sync_target = target,
                    items_synced = result.items_synced,
                    skipped = result.skipped,
                    errors = result.errors.len(),
                    pages = result.pages,
                    "Sync complete"
                );
                SyncReport::Completed(result.summary())
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(
                    sync_target = target,
                    items_synced = result.items_synced,
                    "Sync cancelled"
                );
                SyncReport::Cancelled(result.summary())
            }
            Err(e) => {
                tracing::warn!(sync_target = target, error = %e, retryable = e.is_retryable(), "Sync aborted");
                SyncReport::Failed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        }
    }

    fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_deref()
    }

    fn call_context(&self) -> CallContext<'_> {
        CallContext::new(&self.cancel).with_progress(self.on_progress())
    }

    fn ensure_not_cancelled(&self, operation: &str) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::cancelled(operation).into());
        }
        Ok(())
    }

    async fn apply_pull_request(
        &self,
        target: &str,
        repo: &RepoRef,
        pull_request: &PullRequest,
        result: &mut SyncResult,
    ) {
        match self.sink.apply_pull_request(repo, pull_request).await {
            Ok(outcome) => result.record_pull_request(pull_request, outcome),
            Err(e) => self.item_failed(target, format!("#{}", pull_request.number), &e, result),
        }
    }

    async fn apply_member(&self, org: &str, member: &Member, result: &mut SyncResult) {
        match self.sink.apply_member(org, member).await {
            Ok(outcome) => result.record(outcome),
            Err(e) => self.item_failed(org, member.login.clone(), &e, result),
        }
    }

    fn item_failed(
        &self,
        target: &str,
        item: String,
        error: &SinkError,
        result: &mut SyncResult,
    ) {
        tracing::warn!(sync_target = target, item = %item, error = %error, "Failed to apply record");
        let message = short_error_message(error);
        result.record_error(format!("{item}: {message}"));
        emit(
            self.on_progress(),
            SyncProgress::ItemFailed {
                target: target.to_string(),
                item,
                error: message,
            },
        );
    }

    /// Report a page and keep the denominator ahead of the processed count.
    fn page_done(
        &self,
        target: &str,
        page: u32,
        count: usize,
        tracker: &mut ProgressTracker,
        result: &mut SyncResult,
    ) {
        result.pages = page;
        let processed = result.processed();
        tracing::debug!(sync_target = target, page, count, processed, "Fetched page");
        emit(
            self.on_progress(),
            SyncProgress::FetchedPage {
                target: target.to_string(),
                page,
                count,
                processed_so_far: processed,
            },
        );
        if let Some(total) = tracker.cover(processed as u64) {
            self.report_total(target, total, tracker.is_exact());
        }
    }

    fn raise_total(&self, target: &str, tracker: &mut ProgressTracker, candidate: u64, exact: bool) {
        if let Some(total) = tracker.raise(candidate, exact) {
            self.report_total(target, total, exact);
        }
    }

    fn report_total(&self, target: &str, total: u64, exact: bool) {
        emit(
            self.on_progress(),
            SyncProgress::TotalEstimated {
                target: target.to_string(),
                total,
                exact,
            },
        );
    }
}
