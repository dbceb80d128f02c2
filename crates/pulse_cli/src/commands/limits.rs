use chrono::{DateTime, Utc};
use clap::ValueEnum;
use pulse::api::RateLimitReading;
use tokio_util::sync::CancellationToken;

use crate::CommonSyncOptions;
use crate::commands::shared::Session;
use crate::config::Config;

/// Output format for rate limit display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Handle the limits command.
///
/// Issues one cheap call against the configured API and prints the budget it
/// reports.
pub(crate) async fn handle_limits(
    output: OutputFormat,
    opts: &CommonSyncOptions,
    config: &Config,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(config, opts, cancel)?;
    let reading = session.engine.rate_limit(&session.tokens).await?;
    let resource = session.engine.options().strategy.to_string();

    RateLimitDisplay::from_reading(&resource, &reading, Utc::now()).print(output)?;
    Ok(())
}

/// Rate limit information for display.
#[derive(Debug, Clone, serde::Serialize, tabled::Tabled)]
pub(crate) struct RateLimitDisplay {
    #[tabled(rename = "Resource")]
    #[serde(rename = "resource")]
    pub resource: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Usage %")]
    pub usage_percent: String,
    #[tabled(rename = "Resets At")]
    pub reset_at: String,
    #[tabled(rename = "Resets In")]
    pub reset_in: String,
}

impl RateLimitDisplay {
    pub(crate) fn from_reading(resource: &str, reading: &RateLimitReading, now: DateTime<Utc>) -> Self {
        let used = reading.limit.saturating_sub(reading.remaining);
        let usage_percent = if reading.limit > 0 {
            (f64::from(used) / f64::from(reading.limit)) * 100.0
        } else {
            0.0
        };
        let reset_duration = reading.reset_at.signed_duration_since(now);
        let reset_in = if reset_duration.num_seconds() > 0 {
            format_duration(reset_duration)
        } else {
            "now".to_string()
        };

        Self {
            resource: resource.to_string(),
            limit: reading.limit.to_string(),
            used: used.to_string(),
            remaining: reading.remaining.to_string(),
            usage_percent: format!("{:.1}%", usage_percent),
            reset_at: reading.reset_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            reset_in,
        }
    }

    pub(crate) fn print(self, format: OutputFormat) -> Result<(), serde_json::Error> {
        match format {
            OutputFormat::Table => {
                let mut table = tabled::Table::new(vec![self]);
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&self)?);
            }
        }
        Ok(())
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}
