//! Progress reporting for sync operations.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): Animated progress bars using indicatif
//! - Logging mode (non-TTY): Structured logging using tracing
//!
//! Interactive mode shows one bar per sync target; it starts as a spinner and
//! turns into a bar once the engine reports a total.

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use pulse::sync::{ProgressCallback, SyncProgress};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable description of a window edge pair, e.g. `90d..30d ago`.
pub(crate) fn describe_window(days_back: Option<u32>, skip_recent_days: u32) -> String {
    match (days_back, skip_recent_days) {
        (None, 0) => "all history".to_string(),
        (None, skip) => format!("older than {}d", skip),
        (Some(back), 0) => format!("last {}d", back),
        (Some(back), skip) => format!("{}d..{}d ago", back, skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(None, 0), "all history");
        assert_eq!(describe_window(Some(30), 0), "last 30d");
        assert_eq!(describe_window(Some(90), 30), "90d..30d ago");
        assert_eq!(describe_window(None, 7), "older than 7d");
    }

    #[test]
    fn test_callback_forwards_to_reporter() {
        let reporter = Arc::new(ProgressReporter::Logging(LoggingReporter::new()));
        let callback = reporter.as_callback();
        callback(SyncProgress::SyncComplete {
            target: "acme/widgets".into(),
            processed: 3,
            errors: 0,
        });
        reporter.finish();
    }
}
