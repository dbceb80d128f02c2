//! Where synced records go.
//!
//! The engine hands each kept record to a [`RecordSink`]. A sink failure only
//! affects that record: it is recorded in the result and the sync moves on.

use async_trait::async_trait;
use thiserror::Error;

use crate::api::{Member, PullRequest, RepoRef};

/// What applying a record did to the caller's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

/// A record could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Caller-supplied persistence for synced records.
///
/// Applying the same record twice must be harmless; onboarding phases and
/// REST re-runs can both deliver a record more than once.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn apply_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: &PullRequest,
    ) -> Result<ApplyOutcome, SinkError>;

    async fn apply_member(&self, org: &str, member: &Member) -> Result<ApplyOutcome, SinkError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemorySink;

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MemoryState {
        pull_requests: HashMap<(String, u64), PullRequest>,
        members: HashMap<(String, u64), Member>,
        forwarded_numbers: Vec<u64>,
        forwarded_logins: Vec<String>,
    }

    /// Keeps records in memory and remembers the order they arrived in.
    #[derive(Default)]
    pub struct MemorySink {
        state: Mutex<MemoryState>,
        failing_numbers: HashSet<u64>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject pull requests with these numbers.
        #[must_use]
        pub fn failing_on(mut self, numbers: &[u64]) -> Self {
            self.failing_numbers.extend(numbers);
            self
        }

        /// Pull request numbers in the order they were applied (failures included).
        pub fn forwarded_numbers(&self) -> Vec<u64> {
            self.state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .forwarded_numbers
                .clone()
        }

        /// Member logins in the order they were applied.
        pub fn forwarded_logins(&self) -> Vec<String> {
            self.state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .forwarded_logins
                .clone()
        }

        pub fn stored_pull_requests(&self) -> usize {
            self.state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pull_requests
                .len()
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn apply_pull_request(
            &self,
            repo: &RepoRef,
            pull_request: &PullRequest,
        ) -> Result<ApplyOutcome, SinkError> {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.forwarded_numbers.push(pull_request.number);
            if self.failing_numbers.contains(&pull_request.number) {
                return Err(SinkError::new(format!(
                    "rejected pull request #{}\nconstraint: pull_requests_pkey",
                    pull_request.number
                )));
            }

            let key = (repo.to_string(), pull_request.number);
            Ok(match state.pull_requests.insert(key, pull_request.clone()) {
                None => ApplyOutcome::Created,
                Some(previous) if previous == *pull_request => ApplyOutcome::Unchanged,
                Some(_) => ApplyOutcome::Updated,
            })
        }

        async fn apply_member(
            &self,
            org: &str,
            member: &Member,
        ) -> Result<ApplyOutcome, SinkError> {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.forwarded_logins.push(member.login.clone());

            let key = (org.to_string(), member.id);
            Ok(match state.members.insert(key, member.clone()) {
                None => ApplyOutcome::Created,
                Some(previous) if previous == *member => ApplyOutcome::Unchanged,
                Some(_) => ApplyOutcome::Updated,
            })
        }
    }
}
