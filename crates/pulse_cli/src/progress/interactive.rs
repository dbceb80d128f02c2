use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pulse::sync::SyncProgress;

use super::describe_window;

/// Per-target bar state.
struct TargetBar {
    bar: ProgressBar,
    /// Set once a total has been reported; the bar stops spinning.
    has_total: bool,
    done: bool,
}

#[derive(Default)]
struct ProgressState {
    bars: HashMap<String, TargetBar>,
    /// Failures already echoed above the bars.
    failures: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::SyncStarted { target, operation } => {
                let entry = state
                    .bars
                    .entry(target.clone())
                    .or_insert_with(|| self.spinner(&target));
                // Onboarding reuses the bar for its second phase.
                if entry.done {
                    *entry = self.spinner(&target);
                }
                entry.bar.set_message(format!("Starting {} sync...", operation));
            }

            SyncProgress::PhaseStarted {
                target,
                phase,
                days_back,
                skip_recent_days,
            } => {
                let entry = state
                    .bars
                    .entry(target.clone())
                    .or_insert_with(|| self.spinner(&target));
                if entry.done {
                    *entry = self.spinner(&target);
                }
                entry.bar.set_message(format!(
                    "Phase {} ({})",
                    phase,
                    describe_window(days_back, skip_recent_days)
                ));
            }

            SyncProgress::TotalEstimated {
                target,
                total,
                exact,
            } => {
                if let Some(entry) = state.bars.get_mut(&target) {
                    entry.bar.set_length(total);
                    if !entry.has_total {
                        entry.bar.set_style(Self::bar_style());
                        entry.bar.disable_steady_tick();
                        entry.has_total = true;
                    }
                    if !exact {
                        entry.bar.set_message("(estimated)");
                    }
                }
            }

            SyncProgress::FetchedPage {
                target,
                page,
                count: _,
                processed_so_far,
            } => {
                if let Some(entry) = state.bars.get(&target) {
                    let position = processed_so_far as u64;
                    if let Some(len) = entry.bar.length()
                        && entry.has_total
                        && position > len
                    {
                        entry.bar.set_length(position);
                    }
                    entry.bar.set_position(position);
                    entry
                        .bar
                        .set_message(format!("Page {} ({} records)", page, processed_so_far));
                }
            }

            SyncProgress::ItemFailed {
                target,
                item,
                error,
            } => {
                state.failures += 1;
                let _ = self.multi.println(format!(
                    "{} {} {}: {}",
                    style("✗").red(),
                    target,
                    item,
                    error
                ));
            }

            SyncProgress::RateLimitWait {
                operation: _,
                remaining,
                wait_secs,
            } => {
                for entry in state.bars.values().filter(|entry| !entry.done) {
                    entry.bar.set_message(format!(
                        "Rate limited ({} left), waiting {}s...",
                        remaining, wait_secs
                    ));
                }
            }

            SyncProgress::RetryBackoff {
                operation: _,
                attempt,
                retry_after_ms,
            } => {
                for entry in state.bars.values().filter(|entry| !entry.done) {
                    entry.bar.set_message(format!(
                        "Timed out (attempt {}), retrying in {}ms...",
                        attempt, retry_after_ms
                    ));
                }
            }

            SyncProgress::SyncComplete {
                target,
                processed,
                errors,
            } => {
                if let Some(entry) = state.bars.get_mut(&target) {
                    entry.done = true;
                    let msg = if errors > 0 {
                        format!("✓ {} records, {} errors", processed, errors)
                    } else {
                        format!("✓ {} records", processed)
                    };
                    entry.bar.finish_with_message(msg);
                }
            }

            _ => {}
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for entry in state.bars.values().filter(|entry| !entry.done) {
            entry.bar.finish_and_clear();
        }
        if state.failures > 0 {
            let _ = self.multi.println(format!(
                "{} {} records could not be written",
                style("!").yellow(),
                state.failures
            ));
        }
    }

    fn spinner(&self, target: &str) -> TargetBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_prefix(format!("{:20}", target));
        bar.enable_steady_tick(Duration::from_millis(100));
        TargetBar {
            bar,
            has_total: false,
            done: false,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> InteractiveReporter {
        InteractiveReporter {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn started(target: &str) -> SyncProgress {
        SyncProgress::SyncStarted {
            target: target.into(),
            operation: "full",
        }
    }

    #[test]
    fn test_total_turns_spinner_into_bar() {
        let reporter = hidden();
        reporter.handle(started("acme/widgets"));
        reporter.handle(SyncProgress::TotalEstimated {
            target: "acme/widgets".into(),
            total: 40,
            exact: true,
        });
        reporter.handle(SyncProgress::FetchedPage {
            target: "acme/widgets".into(),
            page: 1,
            count: 20,
            processed_so_far: 20,
        });

        let state = reporter.state.lock().unwrap();
        let entry = &state.bars["acme/widgets"];
        assert!(entry.has_total);
        assert_eq!(entry.bar.length(), Some(40));
        assert_eq!(entry.bar.position(), 20);
    }

    #[test]
    fn test_bar_grows_when_estimate_is_exceeded() {
        let reporter = hidden();
        reporter.handle(started("acme/widgets"));
        reporter.handle(SyncProgress::TotalEstimated {
            target: "acme/widgets".into(),
            total: 10,
            exact: false,
        });
        reporter.handle(SyncProgress::FetchedPage {
            target: "acme/widgets".into(),
            page: 2,
            count: 5,
            processed_so_far: 15,
        });

        let state = reporter.state.lock().unwrap();
        assert_eq!(state.bars["acme/widgets"].bar.length(), Some(15));
    }

    #[test]
    fn test_completion_marks_bar_done_and_counts_failures() {
        let reporter = hidden();
        reporter.handle(started("acme"));
        reporter.handle(SyncProgress::ItemFailed {
            target: "acme".into(),
            item: "alice".into(),
            error: "store offline".into(),
        });
        reporter.handle(SyncProgress::SyncComplete {
            target: "acme".into(),
            processed: 3,
            errors: 1,
        });

        let state = reporter.state.lock().unwrap();
        assert!(state.bars["acme"].done);
        assert_eq!(state.failures, 1);
    }

    #[test]
    fn test_second_phase_gets_a_fresh_bar() {
        let reporter = hidden();
        reporter.handle(started("acme/widgets"));
        reporter.handle(SyncProgress::SyncComplete {
            target: "acme/widgets".into(),
            processed: 2,
            errors: 0,
        });
        reporter.handle(SyncProgress::PhaseStarted {
            target: "acme/widgets".into(),
            phase: 2,
            days_back: Some(90),
            skip_recent_days: 30,
        });

        let state = reporter.state.lock().unwrap();
        assert!(!state.bars["acme/widgets"].done);
    }
}
