//! Pulse CLI - pull request and organization member ingestion from GitHub.

mod commands;
mod config;
mod progress;
mod shutdown;
mod sink;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use console::Term;
use pulse::RepoRef;
use pulse::sync::SourceStrategy;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::commands::limits::OutputFormat;
use crate::commands::sync::SyncJob;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(version)]
#[command(about = "Rate-limit aware pull request and member ingestion for GitHub")]
#[command(
    long_about = "Pulse pages through a repository's pull request history (with reviews, \
commits and comments) or an organization's members over the GitHub GraphQL API, \
waiting out rate limits and retrying timeouts. Records are written to stdout as \
JSON lines; the final report is written to stderr as JSON."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync pull requests created in the last 90 days:
        $ pulse prs rust-lang/cargo

    Backfill 90 to 30 days ago:
        $ pulse prs rust-lang/cargo --days-back 90 --skip-recent-days 30

    Pick up pull requests updated since a checkpoint:
        $ pulse incremental rust-lang/cargo --since 2026-01-01T00:00:00Z

    Onboard a repository (last 30 days, then 90 to 30 days ago):
        $ pulse onboard rust-lang/cargo > records.jsonl

    Sync organization members through REST:
        $ pulse members rust-lang --strategy rest

CONFIGURATION
    Pulse reads configuration from:
      1. ~/.config/pulse/config.toml (or $XDG_CONFIG_HOME/pulse/config.toml)
      2. ./pulse.toml
      3. Environment variables (PULSE_ prefix, e.g., PULSE_GITHUB__TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    PULSE_GITHUB__TOKEN              GitHub OAuth or personal access token
    GITHUB_TOKEN                     Used when no token is configured
    PULSE_GITHUB__APP_ID             GitHub App id
    PULSE_GITHUB__PRIVATE_KEY_PATH   GitHub App private key (PEM)
    PULSE_GITHUB__INSTALLATION_ID    Installation to sync as
    RUST_LOG                         Log filter (default: pulse=info,pulse_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync pull requests created inside a window
    Prs {
        /// Repository as owner/name
        repo: RepoRef,

        /// Only pull requests created within this many days (default from config)
        #[arg(short, long)]
        days_back: Option<u32>,

        /// Sync the entire history
        #[arg(short, long, conflicts_with = "days_back")]
        all: bool,

        /// Skip pull requests created within this many days
        #[arg(short, long, default_value_t = 0)]
        skip_recent_days: u32,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Sync pull requests updated since a checkpoint
    Incremental {
        /// Repository as owner/name
        repo: RepoRef,

        /// Checkpoint (RFC 3339); pull requests updated at or after it are synced
        #[arg(long)]
        since: DateTime<Utc>,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Onboard a repository: the last 30 days, then 90 to 30 days ago
    Onboard {
        /// Repository as owner/name
        repo: RepoRef,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Sync an organization's members
    Members {
        /// Organization login
        org: String,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
    /// Show the current rate limit budget
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        #[command(flatten)]
        sync_opts: CommonSyncOptions,
    },
}

/// Sync options shared by every command; each one overrides the config file.
#[derive(Debug, Clone, clap::Args)]
struct CommonSyncOptions {
    /// API to use (graphql or rest)
    #[arg(long)]
    strategy: Option<SourceStrategy>,

    /// Re-run a failed GraphQL sync once through REST
    #[arg(long)]
    rest_fallback: bool,

    /// Pull requests per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Skip the count query (progress totals become estimates)
    #[arg(long)]
    no_count: bool,

    /// Fail instead of waiting when the rate limit budget runs low
    #[arg(long)]
    no_wait: bool,

    /// GitHub App installation to sync as
    #[arg(long)]
    installation_id: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging)
    // Only initialize if not connected to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("pulse=info,pulse_cli=info"),
        };

        // stdout carries the JSON-lines records
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Set up graceful shutdown handler (Ctrl+C)
    let cancel = CancellationToken::new();
    shutdown::setup_shutdown_handler(cancel.clone());

    match cli.command {
        Commands::Prs {
            repo,
            days_back,
            all,
            skip_recent_days,
            sync_opts,
        } => {
            let window = SyncJob::window(&config, days_back, all, skip_recent_days)?;
            let job = SyncJob::PullRequests { repo, window };
            commands::sync::handle_sync(job, &sync_opts, &config, cancel).await?;
        }
        Commands::Incremental {
            repo,
            since,
            sync_opts,
        } => {
            let job = SyncJob::Incremental { repo, since };
            commands::sync::handle_sync(job, &sync_opts, &config, cancel).await?;
        }
        Commands::Onboard { repo, sync_opts } => {
            let job = SyncJob::Onboard { repo };
            commands::sync::handle_sync(job, &sync_opts, &config, cancel).await?;
        }
        Commands::Members { org, sync_opts } => {
            let job = SyncJob::Members { org };
            commands::sync::handle_sync(job, &sync_opts, &config, cancel).await?;
        }
        Commands::Limits { output, sync_opts } => {
            commands::limits::handle_limits(output, &sync_opts, &config, cancel).await?;
        }
    }

    Ok(())
}
