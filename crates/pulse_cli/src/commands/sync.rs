//! Sync commands: pull request history, incremental updates, onboarding and
//! organization members.

use chrono::{DateTime, Utc};
use pulse::RepoRef;
use pulse::sync::SyncWindow;
use tokio_util::sync::CancellationToken;

use crate::CommonSyncOptions;
use crate::commands::shared::Session;
use crate::config::Config;

/// One sync requested from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SyncJob {
    /// Pull requests created inside a window.
    PullRequests { repo: RepoRef, window: SyncWindow },
    /// Pull requests updated since a checkpoint.
    Incremental {
        repo: RepoRef,
        since: DateTime<Utc>,
    },
    /// Two-phase onboarding of a repository.
    Onboard { repo: RepoRef },
    /// Organization members.
    Members { org: String },
}

impl SyncJob {
    /// Window for `pulse prs` from its flags, defaulting the lower edge from config.
    pub(crate) fn window(
        config: &Config,
        days_back: Option<u32>,
        all: bool,
        skip_recent_days: u32,
    ) -> Result<SyncWindow, Box<dyn std::error::Error>> {
        let days_back = if all {
            None
        } else {
            Some(days_back.unwrap_or(config.sync.days_back))
        };
        Ok(SyncWindow::new(days_back, skip_recent_days)?)
    }
}

/// Handle a sync command.
pub(crate) async fn handle_sync(
    job: SyncJob,
    opts: &CommonSyncOptions,
    config: &Config,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(config, opts, cancel)?;
    tracing::debug!(?job, source = ?session.tokens.source(), "Running sync command");

    let report = match &job {
        SyncJob::PullRequests { repo, window } => {
            session.engine.full_sync(repo, *window, &session.tokens).await
        }
        SyncJob::Incremental { repo, since } => {
            session
                .engine
                .incremental_sync(repo, *since, &session.tokens)
                .await
        }
        SyncJob::Onboard { repo } => session.engine.onboard(repo, &session.tokens).await,
        SyncJob::Members { org } => session.engine.sync_members(org, &session.tokens).await,
    };

    session.finish(report)
}
