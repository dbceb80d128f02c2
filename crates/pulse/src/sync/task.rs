//! Task-queue boundary.
//!
//! A queue hands the library a target id and a task; the id is resolved to a
//! repository or organization with credentials, the task runs, and a
//! [`SyncReport`] comes back ready to serialize.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::RepoRef;
use crate::auth::Credentials;

use super::engine::SyncEngine;
use super::result::SyncReport;
use super::types::SyncWindow;
use super::SyncError;

/// The work requested for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncTask {
    Full { window: SyncWindow },
    Incremental { since: DateTime<Utc> },
    Onboard,
    Members,
}

/// What a target id refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    Repository(RepoRef),
    Organization(String),
}

/// A resolved sync target.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub kind: TargetKind,
    /// Inactive targets are skipped without touching the upstream.
    pub active: bool,
    pub credentials: Credentials,
}

/// Looks up targets by id.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, target_id: &str) -> Result<Option<SyncTarget>, SyncError>;
}

impl SyncEngine {
    /// Resolve `target_id` and run `task` against it.
    pub async fn run_task(
        &self,
        resolver: &dyn TargetResolver,
        target_id: &str,
        task: SyncTask,
    ) -> SyncReport {
        let target = match resolver.resolve(target_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                tracing::info!(target_id, "Target not found, skipping");
                return SyncReport::Skipped {
                    reason: "target not found".into(),
                };
            }
            Err(e) => {
                tracing::warn!(target_id, error = %e, "Target lookup failed");
                return SyncReport::Failed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                };
            }
        };

        if !target.active {
            tracing::info!(target_id, "Target is inactive, skipping");
            return SyncReport::Skipped {
                reason: "target is inactive".into(),
            };
        }

        let tokens = match self.token_provider(&target.credentials) {
            Ok(tokens) => tokens,
            Err(e) => {
                let e = SyncError::from(e);
                tracing::warn!(target_id, error = %e, "No usable credentials");
                return SyncReport::Failed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                };
            }
        };

        match (task, &target.kind) {
            (SyncTask::Full { window }, TargetKind::Repository(repo)) => {
                self.full_sync(repo, window, &tokens).await
            }
            (SyncTask::Incremental { since }, TargetKind::Repository(repo)) => {
                self.incremental_sync(repo, since, &tokens).await
            }
            (SyncTask::Onboard, TargetKind::Repository(repo)) => {
                self.onboard(repo, &tokens).await
            }
            (SyncTask::Members, TargetKind::Organization(org)) => {
                self.sync_members(org, &tokens).await
            }
            (task, kind) => {
                tracing::warn!(target_id, ?task, ?kind, "Task does not apply to target");
                SyncReport::Failed {
                    error: format!("{task:?} does not apply to target {target_id}"),
                    retryable: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::api::Page;
    use crate::auth::{DeactivationReason, InstallationStatus, TokenCache};
    use crate::auth::testing::{CountingTokenFetcher, StaticInstallationStore};
    use crate::sync::sink::MemorySink;
    use crate::sync::testing::{ScriptedSource, member};

    struct MapResolver(HashMap<String, SyncTarget>);

    #[async_trait]
    impl TargetResolver for MapResolver {
        async fn resolve(&self, target_id: &str) -> Result<Option<SyncTarget>, SyncError> {
            if target_id == "broken" {
                return Err(SyncError::Target("database unavailable".into()));
            }
            Ok(self.0.get(target_id).cloned())
        }
    }

    fn oauth() -> Credentials {
        Credentials {
            installation_id: None,
            oauth_token: Some("gho_test".into()),
        }
    }

    fn resolver() -> MapResolver {
        let mut targets = HashMap::new();
        targets.insert(
            "org-1".to_string(),
            SyncTarget {
                kind: TargetKind::Organization("acme".into()),
                active: true,
                credentials: oauth(),
            },
        );
        targets.insert(
            "repo-1".to_string(),
            SyncTarget {
                kind: TargetKind::Repository(RepoRef::new("acme", "widgets")),
                active: false,
                credentials: oauth(),
            },
        );
        targets.insert(
            "repo-2".to_string(),
            SyncTarget {
                kind: TargetKind::Repository(RepoRef::new("acme", "gadgets")),
                active: true,
                credentials: Credentials {
                    installation_id: Some(7),
                    oauth_token: None,
                },
            },
        );
        MapResolver(targets)
    }

    fn engine(source: Arc<ScriptedSource>) -> SyncEngine {
        let store = StaticInstallationStore::active(&[]);
        store.set(
            7,
            InstallationStatus::Suspended {
                suspended_at: Utc::now(),
            },
        );
        SyncEngine::builder()
            .graphql(source)
            .sink(Arc::new(MemorySink::new()))
            .token_cache(Arc::new(TokenCache::new(
                Arc::new(store),
                Arc::new(CountingTokenFetcher::non_expiring()),
            )))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn missing_target_is_skipped() {
        let engine = engine(Arc::new(ScriptedSource::new("graphql")));
        let report = engine
            .run_task(&resolver(), "nope", SyncTask::Members)
            .await;
        assert_eq!(
            report,
            SyncReport::Skipped {
                reason: "target not found".into()
            }
        );
    }

    #[tokio::test]
    async fn inactive_target_is_skipped_without_upstream_calls() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine(Arc::clone(&source));
        let report = engine
            .run_task(&resolver(), "repo-1", SyncTask::Onboard)
            .await;
        assert_eq!(
            report,
            SyncReport::Skipped {
                reason: "target is inactive".into()
            }
        );
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn members_task_runs_against_organization() {
        let source = Arc::new(
            ScriptedSource::new("graphql").with_member_page(Page::last(vec![member(1, "alice")])),
        );
        let engine = engine(source);
        let report = engine
            .run_task(&resolver(), "org-1", SyncTask::Members)
            .await;
        assert_eq!(report.summary().unwrap().items_synced, 1);
    }

    #[tokio::test]
    async fn mismatched_task_fails_permanently() {
        let engine = engine(Arc::new(ScriptedSource::new("graphql")));
        let report = engine
            .run_task(&resolver(), "org-1", SyncTask::Onboard)
            .await;
        assert!(matches!(report, SyncReport::Failed { retryable: false, .. }));
    }

    #[tokio::test]
    async fn lookup_failure_is_retryable() {
        let engine = engine(Arc::new(ScriptedSource::new("graphql")));
        let report = engine
            .run_task(&resolver(), "broken", SyncTask::Members)
            .await;
        assert!(matches!(report, SyncReport::Failed { retryable: true, .. }));
    }

    #[tokio::test]
    async fn suspended_installation_fails_with_guidance() {
        let source = Arc::new(ScriptedSource::new("graphql"));
        let engine = engine(Arc::clone(&source));
        let report = engine
            .run_task(
                &resolver(),
                "repo-2",
                SyncTask::Full {
                    window: SyncWindow::ALL,
                },
            )
            .await;

        match report {
            SyncReport::Failed { error, retryable } => {
                assert!(!retryable);
                assert_eq!(
                    error,
                    crate::auth::TokenError::Deactivated {
                        reason: DeactivationReason::Suspended
                    }
                    .to_string()
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(source.page_requests(), 0);
    }

    #[test]
    fn tasks_deserialize_from_queue_payloads() {
        let task: SyncTask = serde_json::from_value(serde_json::json!({
            "kind": "full",
            "window": {"days_back": 90, "skip_recent_days": 30}
        }))
        .unwrap();
        assert_eq!(
            task,
            SyncTask::Full {
                window: SyncWindow::PHASE_TWO
            }
        );
    }
}
