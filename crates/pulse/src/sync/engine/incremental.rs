use chrono::{DateTime, Utc};

use crate::api::{ApiSource, PrOrder, RepoRef};
use crate::auth::TokenProvider;
use crate::sync::paginate::Paginator;
use crate::sync::progress::ProgressTracker;
use crate::sync::result::SyncResult;
use crate::sync::SyncError;

use super::SyncEngine;

impl SyncEngine {
    /// Walk pull requests most-recently-updated first until a whole page
    /// predates `since`.
    ///
    /// The true total is unknown up front. After each page the estimate is
    /// what has been processed plus, when more pages follow, as many items
    /// again as this page contributed. The tracker only ever raises it.
    pub(super) async fn run_incremental(
        &self,
        source: &dyn ApiSource,
        repo: &RepoRef,
        since: DateTime<Utc>,
        tokens: &TokenProvider,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let target = repo.to_string();
        let ctx = self.call_context();
        let mut tracker = ProgressTracker::new();

        let page_size = self.options.page_size;
        let mut pages = Paginator::new(move |cursor: Option<String>| async move {
            let token = tokens.token().await?;
            let page = source
                .pull_request_page(
                    repo,
                    PrOrder::Updated,
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

            let exhausted = !page.items.is_empty()
                && page.items.iter().all(|pr| pr.updated_at < since);

            let before = result.processed();
            for pull_request in &page.items {
                if pull_request.updated_at < since {
                    result.record_skipped();
                    continue;
                }
                self.apply_pull_request(&target, repo, pull_request, result)
                    .await;
            }
            let kept = result.processed() - before;

            let ahead = if page.has_more && !exhausted { kept } else { 0 };
            self.raise_total(
                &target,
                &mut tracker,
                (result.processed() + ahead) as u64,
                false,
            );
            self.page_done(&target, pages.pages(), page.items.len(), &mut tracker, result);

            if exhausted {
                tracing::debug!(
                    sync_target = %target,
                    page = pages.pages(),
                    since = %since,
                    "Page is entirely older than the checkpoint, stopping"
                );
                pages.stop();
            }
        }

        Ok(())
    }
}
