//! Wiring shared by every command: HTTP transport, API clients, token cache,
//! progress reporting and report output.

use std::sync::Arc;

use pulse::api::{ApiSource, RateLimitGuard, RateLimitPolicy};
use pulse::auth::{Credentials, TokenCache, TokenProvider};
use pulse::github::{AppInstallationStore, AppTokenFetcher, GraphQlClient, RestClient};
use pulse::http::{HttpTransport, ReqwestTransport};
use pulse::sync::{SyncEngine, SyncOptions, SyncReport};
use tokio_util::sync::CancellationToken;

use crate::CommonSyncOptions;
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::sink::JsonLinesSink;

/// An engine wired for one command invocation.
pub(crate) struct Session {
    pub(crate) engine: SyncEngine,
    pub(crate) tokens: TokenProvider,
    reporter: Arc<ProgressReporter>,
}

impl Session {
    /// Build the engine, clients and credentials from config and flags.
    pub(crate) fn open(
        config: &Config,
        opts: &CommonSyncOptions,
        cancel: CancellationToken,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let http: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::with_timeout(config.request_timeout())?);
        let guard = RateLimitGuard::new(rate_limit_policy(config, opts));
        let retry = config.retry_config();

        let graphql: Arc<dyn ApiSource> = Arc::new(
            GraphQlClient::new(Arc::clone(&http), config.github.graphql_url.clone())
                .with_retry(retry.clone())
                .with_rate_limit(guard.clone()),
        );
        let rest: Arc<dyn ApiSource> = Arc::new(
            RestClient::new(Arc::clone(&http), config.github.api_url.clone())
                .with_retry(retry)
                .with_rate_limit(guard),
        );

        let reporter = Arc::new(ProgressReporter::new());
        let mut builder = SyncEngine::builder()
            .graphql(graphql)
            .rest(rest)
            .sink(Arc::new(JsonLinesSink::stdout()))
            .options(sync_options(config, opts))
            .progress(reporter.as_callback())
            .cancellation(cancel);

        if let Some(app) = config.app_credentials()? {
            let api_url = config.github.api_url.clone();
            let store = AppInstallationStore::new(Arc::clone(&http), api_url.clone(), Arc::clone(&app));
            let fetcher = AppTokenFetcher::new(Arc::clone(&http), api_url, app);
            builder = builder.token_cache(Arc::new(TokenCache::new(
                Arc::new(store),
                Arc::new(fetcher),
            )));
        }

        let engine = builder.build()?;
        let credentials = credentials(config, opts);
        if credentials.installation_id.is_some() && config.github.app_id.is_none() {
            tracing::warn!("Installation id configured without a GitHub App; using the token instead");
        }
        let tokens = engine.token_provider(&credentials)?;

        Ok(Self {
            engine,
            tokens,
            reporter,
        })
    }

    /// Print the report as JSON; failed syncs turn into an error exit.
    pub(crate) fn finish(self, report: SyncReport) -> Result<(), Box<dyn std::error::Error>> {
        self.reporter.finish();
        print_report(&report)?;
        match report {
            SyncReport::Failed { error, .. } => Err(error.into()),
            _ => Ok(()),
        }
    }
}

pub(crate) fn print_report(report: &SyncReport) -> Result<(), serde_json::Error> {
    eprintln!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Config-file sync options with command-line flags applied on top.
pub(crate) fn sync_options(config: &Config, opts: &CommonSyncOptions) -> SyncOptions {
    let mut options = config.sync_options();
    if let Some(strategy) = opts.strategy {
        options.strategy = strategy;
    }
    if opts.rest_fallback {
        options.rest_fallback = true;
    }
    if let Some(page_size) = opts.page_size {
        options.page_size = page_size;
    }
    if opts.no_count {
        options.count_query = false;
    }
    options
}

pub(crate) fn rate_limit_policy(config: &Config, opts: &CommonSyncOptions) -> RateLimitPolicy {
    let mut policy = config.rate_limit_policy();
    if opts.no_wait {
        policy.wait_for_reset = false;
    }
    policy
}

pub(crate) fn credentials(config: &Config, opts: &CommonSyncOptions) -> Credentials {
    Credentials {
        installation_id: opts.installation_id.or(config.github.installation_id),
        oauth_token: config.github_token(),
    }
}
