use crate::api::{ApiSource, PrOrder, RepoRef};
use crate::auth::TokenProvider;
use crate::sync::paginate::Paginator;
use crate::sync::progress::ProgressTracker;
use crate::sync::result::SyncResult;
use crate::sync::types::WindowBounds;
use crate::sync::SyncError;

use super::SyncEngine;

impl SyncEngine {
    /// Walk pull requests newest-created first, keeping those inside `bounds`.
    pub(super) async fn run_full(
        &self,
        source: &dyn ApiSource,
        repo: &RepoRef,
        bounds: WindowBounds,
        tokens: &TokenProvider,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let target = repo.to_string();
        let ctx = self.call_context();
        let mut tracker = ProgressTracker::new();

        if self.options.count_query {
            let token = tokens.token().await?;
            match source
                .count_pull_requests(repo, bounds.as_range(), &token, ctx)
                .await
            {
                Ok(Some(total)) => self.raise_total(&target, &mut tracker, total, true),
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => tracing::debug!(
                    sync_target = %target,
                    error = %e,
                    "Count query failed, estimating from page totals"
                ),
            }
        }

        let page_size = self.options.page_size;
        let mut pages = Paginator::new(move |cursor: Option<String>| async move {
            let token = tokens.token().await?;
            let page = source
                .pull_request_page(
                    repo,
                    PrOrder::Created,
                    cursor.as_deref(),
                    page_size,
                    &token,
                    ctx,
                )
                .await?;
            Ok::<_, SyncError>(page)
        });

        loop {
            self.ensure_not_cancelled("pull_requests")?;
            let Some(page) = pages.next_page().await? else {
                break;
            };

            if tracker.total().is_none()
                && let Some(total) = page.total_count
            {
                self.raise_total(&target, &mut tracker, total, false);
            }

            let exhausted = !page.items.is_empty()
                && page
                    .items
                    .iter()
                    .all(|pr| bounds.is_before_start(pr.created_at));

            for pull_request in &page.items {
                if !bounds.contains(pull_request.created_at) {
                    result.record_skipped();
                    continue;
                }
                self.apply_pull_request(&target, repo, pull_request, result)
                    .await;
            }

            self.page_done(&target, pages.pages(), page.items.len(), &mut tracker, result);

            if exhausted {
                tracing::debug!(
                    sync_target = %target,
                    page = pages.pages(),
                    "Page is entirely older than the window, stopping"
                );
                pages.stop();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use crate::api::{ApiError, Page, PrOrder, RepoRef};
    use crate::auth::TokenProvider;
    use crate::clock::ManualClock;
    use crate::sync::engine::tests::{capture_events, engine_with};
    use crate::sync::sink::MemorySink;
    use crate::sync::testing::{ScriptedSource, SourceCall, page_with_more, pull_request};
    use crate::sync::{SyncOptions, SyncProgress, SyncReport, SyncWindow};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn repo() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    fn tokens() -> TokenProvider {
        TokenProvider::oauth("gho_test")
    }

    #[tokio::test]
    async fn windowed_sync_keeps_only_items_inside_both_edges() {
        // Newest first: two too recent, three inside (edges included), two too old.
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_pull_page(page_with_more(
                    vec![
                        pull_request(7, days_ago(1), days_ago(1)),
                        pull_request(6, days_ago(30) + Duration::seconds(1), days_ago(29)),
                        pull_request(5, days_ago(30), days_ago(30)),
                        pull_request(4, days_ago(60), days_ago(60)),
                    ],
                    "c1",
                ))
                .with_pull_page(page_with_more(
                    vec![
                        pull_request(3, days_ago(90), days_ago(90)),
                        pull_request(2, days_ago(90) - Duration::seconds(1), days_ago(90)),
                    ],
                    "c2",
                ))
                .with_pull_page(page_with_more(
                    vec![pull_request(1, days_ago(120), days_ago(120))],
                    "c3",
                )),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(Arc::clone(&source), Arc::clone(&sink))
            .clock(Arc::new(ManualClock::new(now())))
            .build()
            .unwrap();

        let report = engine
            .full_sync(&repo(), SyncWindow::new(Some(90), 30).unwrap(), &tokens())
            .await;

        assert_eq!(sink.forwarded_numbers(), vec![5, 4, 3]);
        let summary = report.summary().unwrap();
        assert!(report.is_completed());
        assert_eq!(summary.items_synced, 3);
        assert_eq!(summary.skipped, 4);
        assert_eq!(summary.sub_items.reviews, 3);
        // The third page is entirely too old and ends the walk.
        assert_eq!(source.page_requests(), 3);
    }

    #[tokio::test]
    async fn page_entirely_before_window_stops_pagination() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_pull_page(page_with_more(
                    vec![pull_request(2, days_ago(5), days_ago(5))],
                    "c1",
                ))
                .with_pull_page(page_with_more(
                    vec![pull_request(1, days_ago(45), days_ago(45))],
                    "c2",
                ))
                .with_pull_page(Page::last(vec![pull_request(0, days_ago(50), days_ago(50))])),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(Arc::clone(&source), Arc::clone(&sink))
            .clock(Arc::new(ManualClock::new(now())))
            .build()
            .unwrap();

        engine
            .full_sync(&repo(), SyncWindow::PHASE_ONE, &tokens())
            .await;

        assert_eq!(sink.forwarded_numbers(), vec![2]);
        assert_eq!(source.page_requests(), 2);
    }

    #[tokio::test]
    async fn count_query_seeds_an_exact_total() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_count(Ok(Some(42)))
                .with_pull_page(Page {
                    total_count: Some(500),
                    ..Page::last(vec![pull_request(1, days_ago(1), days_ago(1))])
                }),
        );
        let (callback, events) = capture_events();
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .clock(Arc::new(ManualClock::new(now())))
            .progress(callback)
            .build()
            .unwrap();

        engine
            .full_sync(&repo(), SyncWindow::PHASE_ONE, &tokens())
            .await;

        let totals: Vec<(u64, bool)> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SyncProgress::TotalEstimated { total, exact, .. } => Some((*total, *exact)),
                _ => None,
            })
            .collect();
        assert_eq!(totals, vec![(42, true)]);
        assert!(matches!(source.calls()[0], SourceCall::Count(range) if range.start == Some(days_ago(30)) && range.end.is_none()));
    }

    #[tokio::test]
    async fn failed_count_falls_back_to_an_estimate() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_count(Err(ApiError::api("count_pull_requests", "boom")))
                .with_pull_page(Page {
                    total_count: Some(500),
                    ..Page::last(vec![pull_request(1, days_ago(1), days_ago(1))])
                }),
        );
        let (callback, events) = capture_events();
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .clock(Arc::new(ManualClock::new(now())))
            .progress(callback)
            .build()
            .unwrap();

        let report = engine
            .full_sync(&repo(), SyncWindow::PHASE_ONE, &tokens())
            .await;

        assert!(report.is_completed());
        let estimated = events.lock().unwrap().iter().any(|event| {
            matches!(
                event,
                SyncProgress::TotalEstimated {
                    total: 500,
                    exact: false,
                    ..
                }
            )
        });
        assert!(estimated);
    }

    #[tokio::test]
    async fn count_query_can_be_disabled() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .options(SyncOptions {
                count_query: false,
                ..SyncOptions::default()
            })
            .build()
            .unwrap();

        engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        assert_eq!(
            source.calls(),
            vec![SourceCall::PullRequests {
                order: PrOrder::Created,
                cursor: None
            }]
        );
    }

    #[tokio::test]
    async fn sink_failures_are_recorded_and_the_sync_continues() {
        let source = Arc::new(ScriptedSource::new("graphql").with_pull_page(Page::last(vec![
            pull_request(3, days_ago(1), days_ago(1)),
            pull_request(2, days_ago(2), days_ago(2)),
            pull_request(1, days_ago(3), days_ago(3)),
        ])));
        let sink = Arc::new(MemorySink::new().failing_on(&[2]));
        let engine = engine_with(source, Arc::clone(&sink)).build().unwrap();

        let report = engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        let summary = report.summary().unwrap();
        assert!(report.is_completed());
        assert_eq!(summary.items_synced, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors, vec!["#2: rejected pull request #2".to_string()]);
        assert_eq!(sink.forwarded_numbers(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn permission_error_aborts_without_retrying() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_pull_page(page_with_more(
                    vec![pull_request(2, days_ago(1), days_ago(1))],
                    "c1",
                ))
                .with_pull_error(ApiError::permission("pull_requests", "Resource not accessible")),
        );
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(Arc::clone(&source), Arc::clone(&sink))
            .build()
            .unwrap();

        let report = engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        match report {
            SyncReport::Failed { error, retryable } => {
                assert!(!retryable);
                assert!(error.contains("Re-grant"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(sink.forwarded_numbers(), vec![2]);
    }

    #[tokio::test]
    async fn generic_failure_reruns_through_rest_when_enabled() {
        let graphql = Arc::new(
            ScriptedSource::new("graphql").with_pull_error(ApiError::api("pull_requests", "boom")),
        );
        let rest = Arc::new(ScriptedSource::new("rest").with_pull_page(Page::last(vec![
            pull_request(1, days_ago(1), days_ago(1)),
        ])));
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(Arc::clone(&graphql), Arc::clone(&sink))
            .rest(rest.clone())
            .options(SyncOptions {
                rest_fallback: true,
                count_query: false,
                ..SyncOptions::default()
            })
            .build()
            .unwrap();

        let report = engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        assert!(report.is_completed());
        assert_eq!(report.summary().unwrap().items_synced, 1);
        assert_eq!(rest.page_requests(), 1);
    }

    #[tokio::test]
    async fn rate_limit_failure_does_not_fall_back() {
        let graphql = Arc::new(ScriptedSource::new("graphql").with_pull_error(
            ApiError::RateLimited {
                operation: "pull_requests".into(),
                remaining: 12,
                reset_at: now(),
            },
        ));
        let rest = Arc::new(ScriptedSource::new("rest"));
        let engine = engine_with(graphql, Arc::new(MemorySink::new()))
            .rest(rest.clone())
            .options(SyncOptions {
                rest_fallback: true,
                count_query: false,
                ..SyncOptions::default()
            })
            .build()
            .unwrap();

        let report = engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        assert!(report.is_failed());
        assert_eq!(rest.page_requests(), 0);
    }

    #[tokio::test]
    async fn cancellation_returns_partial_counts() {
        let source = Arc::new(
            ScriptedSource::new("graphql")
                .with_pull_page(page_with_more(
                    vec![pull_request(2, days_ago(1), days_ago(1))],
                    "c1",
                ))
                .with_pull_page(Page::last(vec![pull_request(1, days_ago(2), days_ago(2))])),
        );
        let cancel = tokio_util::sync::CancellationToken::new();
        let trigger = cancel.clone();
        let callback: crate::sync::ProgressCallback = Box::new(move |event| {
            if matches!(event, SyncProgress::FetchedPage { page: 1, .. }) {
                trigger.cancel();
            }
        });
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .cancellation(cancel)
            .progress(Arc::new(callback))
            .options(SyncOptions {
                count_query: false,
                ..SyncOptions::default()
            })
            .build()
            .unwrap();

        let report = engine.full_sync(&repo(), SyncWindow::ALL, &tokens()).await;

        match report {
            SyncReport::Cancelled(summary) => assert_eq!(summary.items_synced, 1),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(source.page_requests(), 1);
    }

    #[tokio::test]
    async fn invalid_window_fails_without_calling_upstream() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .build()
            .unwrap();

        let report = engine
            .full_sync(
                &repo(),
                SyncWindow {
                    days_back: Some(30),
                    skip_recent_days: 30,
                },
                &tokens(),
            )
            .await;

        assert!(report.is_failed());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_window_fails_instead_of_panicking() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine_with(Arc::clone(&source), Arc::new(MemorySink::new()))
            .build()
            .unwrap();

        let report = engine
            .full_sync(
                &repo(),
                SyncWindow {
                    days_back: Some(u32::MAX),
                    skip_recent_days: 0,
                },
                &tokens(),
            )
            .await;

        assert!(report.is_failed());
        assert!(matches!(report, SyncReport::Failed { retryable: false, .. }));
        assert!(source.calls().is_empty());
    }
}
