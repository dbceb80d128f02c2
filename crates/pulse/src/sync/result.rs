//! Result accumulation and the final report.

use serde::ser::{Serialize, Serializer};

use crate::api::PullRequest;

use super::ApplyOutcome;

/// Counts of nested activity synced along with pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SubItemCounts {
    #[serde(rename = "reviews_synced")]
    pub reviews: usize,
    #[serde(rename = "commits_synced")]
    pub commits: usize,
    #[serde(rename = "comments_synced")]
    pub comments: usize,
}

impl SubItemCounts {
    fn add(&mut self, other: Self) {
        self.reviews += other.reviews;
        self.commits += other.commits;
        self.comments += other.comments;
    }
}

/// Mutable tally owned by one sync operation.
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Records the sink accepted.
    pub items_synced: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records fetched but outside the window or checkpoint.
    pub skipped: usize,
    pub sub_items: SubItemCounts,
    /// Pages fetched.
    pub pages: u32,
    /// Errors encountered (non-fatal).
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one applied record.
    pub fn record(&mut self, outcome: ApplyOutcome) {
        self.items_synced += 1;
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Updated => self.updated += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Tally an applied pull request and its nested activity.
    pub fn record_pull_request(&mut self, pull_request: &PullRequest, outcome: ApplyOutcome) {
        self.record(outcome);
        self.sub_items.add(SubItemCounts {
            reviews: pull_request.reviews.len(),
            commits: pull_request.commits.len(),
            comments: pull_request.comments.len(),
        });
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records the sink has seen, accepted or not.
    pub fn processed(&self) -> usize {
        self.items_synced + self.errors.len()
    }

    /// Immutable snapshot of the tally.
    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            items_synced: self.items_synced,
            created: self.created,
            updated: self.updated,
            unchanged: self.unchanged,
            skipped: self.skipped,
            sub_items: self.sub_items,
            errors: self.errors.clone(),
        }
    }
}

/// Snapshot of a [`SyncResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncSummary {
    pub items_synced: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    #[serde(flatten)]
    pub sub_items: SubItemCounts,
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// Combine two summaries, e.g. the phases of an onboarding run.
    #[must_use]
    pub fn merged(mut self, other: SyncSummary) -> Self {
        self.items_synced += other.items_synced;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.sub_items.add(other.sub_items);
        self.errors.extend(other.errors);
        self
    }
}

/// Final outcome of a sync operation, as handed to the task queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReport {
    /// Ran to the end; `errors` may still list per-item failures.
    Completed(SyncSummary),
    /// Stopped by cancellation; counts cover what was done before.
    Cancelled(SyncSummary),
    /// Aborted. The message is safe to show to users.
    Failed { error: String, retryable: bool },
    /// Nothing to do for this target.
    Skipped { reason: String },
}

impl SyncReport {
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            Self::Completed(summary) | Self::Cancelled(summary) => Some(summary),
            Self::Failed { .. } | Self::Skipped { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(serde::Serialize)]
struct CancelledRepr<'a> {
    #[serde(flatten)]
    summary: &'a SyncSummary,
    cancelled: bool,
}

#[derive(serde::Serialize)]
struct FailedRepr<'a> {
    error: &'a str,
    retryable: bool,
}

#[derive(serde::Serialize)]
struct SkippedRepr<'a> {
    skipped: bool,
    reason: &'a str,
}

impl Serialize for SyncReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Completed(summary) => summary.serialize(serializer),
            Self::Cancelled(summary) => CancelledRepr {
                summary,
                cancelled: true,
            }
            .serialize(serializer),
            Self::Failed { error, retryable } => FailedRepr {
                error,
                retryable: *retryable,
            }
            .serialize(serializer),
            Self::Skipped { reason } => SkippedRepr {
                skipped: true,
                reason,
            }
            .serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_tallies_outcomes() {
        let mut result = SyncResult::new();
        result.record(ApplyOutcome::Created);
        result.record(ApplyOutcome::Updated);
        result.record(ApplyOutcome::Unchanged);
        result.record_skipped();
        result.record_error("#7: rejected");

        assert_eq!(result.items_synced, 3);
        assert_eq!(result.processed(), 4);
        let summary = result.summary();
        assert_eq!(
            (summary.created, summary.updated, summary.unchanged),
            (1, 1, 1)
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, vec!["#7: rejected".to_string()]);
    }

    #[test]
    fn completed_report_serializes_flat_counts() {
        let mut result = SyncResult::new();
        result.record(ApplyOutcome::Created);
        result.sub_items.reviews = 2;

        let value = serde_json::to_value(SyncReport::Completed(result.summary())).unwrap();
        assert_eq!(value["items_synced"], 1);
        assert_eq!(value["reviews_synced"], 2);
        assert_eq!(value["errors"], json!([]));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failed_and_skipped_reports_use_task_queue_shapes() {
        let failed = SyncReport::Failed {
            error: "pull_requests: permission denied".into(),
            retryable: false,
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"error": "pull_requests: permission denied", "retryable": false})
        );

        let skipped = SyncReport::Skipped {
            reason: "target is inactive".into(),
        };
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({"skipped": true, "reason": "target is inactive"})
        );
    }

    #[test]
    fn cancelled_report_keeps_partial_counts() {
        let mut result = SyncResult::new();
        result.record(ApplyOutcome::Created);
        let value = serde_json::to_value(SyncReport::Cancelled(result.summary())).unwrap();
        assert_eq!(value["cancelled"], true);
        assert_eq!(value["items_synced"], 1);
    }

    #[test]
    fn merged_summaries_add_up() {
        let mut first = SyncResult::new();
        first.record(ApplyOutcome::Created);
        first.record_error("a");
        let mut second = SyncResult::new();
        second.record(ApplyOutcome::Updated);
        second.record_error("b");

        let merged = first.summary().merged(second.summary());
        assert_eq!(merged.items_synced, 2);
        assert_eq!(merged.errors, vec!["a".to_string(), "b".to_string()]);
    }
}
