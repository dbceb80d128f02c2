use crate::api::RepoRef;
use crate::auth::TokenProvider;
use crate::sync::progress::{SyncProgress, emit};
use crate::sync::result::{SyncReport, SyncSummary};
use crate::sync::types::SyncWindow;

use super::{Operation, SyncEngine};

impl SyncEngine {
    /// Two-phase onboarding: the last 30 days first so recent activity shows
    /// up quickly, then 90 to 30 days ago.
    ///
    /// Both windows are resolved against one instant so they meet exactly.
    /// The second phase only runs when the first completed; the returned
    /// summary covers both.
    pub async fn onboard(&self, repo: &RepoRef, tokens: &TokenProvider) -> SyncReport {
        let now = self.clock.now();
        let mut summary = SyncSummary::default();

        for (phase, window) in [(1u8, SyncWindow::PHASE_ONE), (2, SyncWindow::PHASE_TWO)] {
            tracing::info!(
                sync_target = %repo,
                phase,
                days_back = ?window.days_back,
                skip_recent_days = window.skip_recent_days,
                "Starting onboarding phase"
            );
            emit(
                self.on_progress(),
                SyncProgress::PhaseStarted {
                    target: repo.to_string(),
                    phase,
                    days_back: window.days_back,
                    skip_recent_days: window.skip_recent_days,
                },
            );

            let bounds = match window.bounds(now) {
                Ok(bounds) => bounds,
                Err(e) => {
                    return SyncReport::Failed {
                        error: e.to_string(),
                        retryable: false,
                    };
                }
            };
            match self.execute(Operation::Full { repo, bounds }, tokens).await {
                SyncReport::Completed(phase_summary) => summary = summary.merged(phase_summary),
                SyncReport::Cancelled(phase_summary) => {
                    return SyncReport::Cancelled(summary.merged(phase_summary));
                }
                failed => return failed,
            }
        }

        SyncReport::Completed(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use crate::api::{ApiError, Page, RepoRef};
    use crate::auth::TokenProvider;
    use crate::clock::ManualClock;
    use crate::sync::engine::tests::{capture_events, engine_with};
    use crate::sync::sink::MemorySink;
    use crate::sync::testing::{ScriptedSource, SourceCall, page_with_more, pull_request};
    use crate::sync::{SyncOptions, SyncProgress, SyncReport};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn history() -> Vec<Page<crate::api::PullRequest>> {
        vec![
            page_with_more(
                vec![
                    pull_request(4, days_ago(2), days_ago(2)),
                    pull_request(3, days_ago(20), days_ago(20)),
                ],
                "c1",
            ),
            page_with_more(
                vec![
                    pull_request(2, days_ago(45), days_ago(45)),
                    pull_request(1, days_ago(120), days_ago(120)),
                ],
                "c2",
            ),
        ]
    }

    fn scripted_twice() -> ScriptedSource {
        // Each phase walks from the newest page again.
        history()
            .into_iter()
            .chain(history())
            .fold(ScriptedSource::new("graphql"), |source, page| {
                source.with_pull_page(page)
            })
    }

    #[tokio::test]
    async fn phases_cover_recent_then_older_history() {
        let source = Arc::new(scripted_twice());
        let sink = Arc::new(MemorySink::new());
        let (callback, events) = capture_events();
        let engine = engine_with(Arc::clone(&source), Arc::clone(&sink))
            .clock(Arc::new(ManualClock::new(now())))
            .options(SyncOptions {
                count_query: false,
                ..SyncOptions::default()
            })
            .progress(callback)
            .build()
            .unwrap();

        let report = engine
            .onboard(&RepoRef::new("acme", "widgets"), &TokenProvider::oauth("gho_test"))
            .await;

        // Phase one keeps #4 and #3 and stops on the second page; phase two keeps #2.
        assert_eq!(sink.forwarded_numbers(), vec![4, 3, 2]);
        let summary = report.summary().unwrap();
        assert!(report.is_completed());
        assert_eq!(summary.items_synced, 3);

        let phases: Vec<u8> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SyncProgress::PhaseStarted { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![1, 2]);
    }

    #[tokio::test]
    async fn phase_windows_share_one_boundary() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .clock(Arc::new(ManualClock::new(now())))
            .build()
            .unwrap();

        engine
            .onboard(&RepoRef::new("acme", "widgets"), &TokenProvider::oauth("gho_test"))
            .await;

        let ranges: Vec<_> = source
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceCall::Count(range) => Some(range),
                _ => None,
            })
            .collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start, Some(days_ago(30)));
        assert_eq!(ranges[0].end, None);
        assert_eq!(ranges[1].start, Some(days_ago(90)));
        assert_eq!(ranges[1].end, Some(days_ago(30)));
    }

    #[tokio::test]
    async fn failed_first_phase_skips_the_second() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_pull_error(ApiError::permission("pull_requests", "denied")),
        );
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .clock(Arc::new(ManualClock::new(now())))
            .options(SyncOptions {
                count_query: false,
                ..SyncOptions::default()
            })
            .build()
            .unwrap();

        let report = engine
            .onboard(&RepoRef::new("acme", "widgets"), &TokenProvider::oauth("gho_test"))
            .await;

        assert!(matches!(report, SyncReport::Failed { retryable: false, .. }));
        assert_eq!(source.page_requests(), 1);
    }
}
