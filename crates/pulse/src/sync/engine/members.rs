use crate::api::ApiSource;
use crate::auth::TokenProvider;
use crate::sync::paginate::Paginator;
use crate::sync::progress::ProgressTracker;
use crate::sync::result::SyncResult;
use crate::sync::SyncError;

use super::SyncEngine;

impl SyncEngine {
    /// Walk every member page of `org`.
    pub(super) async fn run_members(
        &self,
        source: &dyn ApiSource,
        org: &str,
        tokens: &TokenProvider,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let ctx = self.call_context();
        let mut tracker = ProgressTracker::new();

        let page_size = self.options.member_page_size;
        let mut pages = Paginator::new(move |cursor: Option<String>| async move {
            let token = tokens.token().await?;
            let page = source
                .member_page(org, cursor.as_deref(), page_size, &token, ctx)
                .await?;
            Ok::<_, SyncError>(page)
        });

        loop {
            self.ensure_not_cancelled("members")?;
            let Some(page) = pages.next_page().await? else {
                break;
            };

            if let Some(total) = page.total_count {
                self.raise_total(org, &mut tracker, total, page.total_is_exact);
            }

            for member in &page.items {
                self.apply_member(org, member, result).await;
            }

            self.page_done(org, pages.pages(), page.items.len(), &mut tracker, result);
        }

        Ok(())
    }
}
