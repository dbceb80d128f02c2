//! Scripted upstream and record fixtures for sync tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{
    ApiError, ApiSource, CallContext, DateRange, Member, MemberRole, Page, PrOrder, PullRequest,
    PullRequestState, RateLimitReading, RepoRef, Review,
};

/// A call observed by [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    PullRequests {
        order: PrOrder,
        cursor: Option<String>,
    },
    Count(DateRange),
    Members {
        cursor: Option<String>,
    },
    RateLimit,
}

/// An [`ApiSource`] that replays queued pages and records what was asked.
///
/// Once a queue runs dry it serves empty final pages.
pub struct ScriptedSource {
    name: &'static str,
    pull_pages: Mutex<VecDeque<Result<Page<PullRequest>, ApiError>>>,
    member_pages: Mutex<VecDeque<Result<Page<Member>, ApiError>>>,
    count: Mutex<Result<Option<u64>, ApiError>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl ScriptedSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pull_pages: Mutex::new(VecDeque::new()),
            member_pages: Mutex::new(VecDeque::new()),
            count: Mutex::new(Ok(None)),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_pull_page(self, page: Page<PullRequest>) -> Self {
        lock(&self.pull_pages).push_back(Ok(page));
        self
    }

    #[must_use]
    pub fn with_pull_error(self, error: ApiError) -> Self {
        lock(&self.pull_pages).push_back(Err(error));
        self
    }

    #[must_use]
    pub fn with_member_page(self, page: Page<Member>) -> Self {
        lock(&self.member_pages).push_back(Ok(page));
        self
    }

    #[must_use]
    pub fn with_member_error(self, error: ApiError) -> Self {
        lock(&self.member_pages).push_back(Err(error));
        self
    }

    #[must_use]
    pub fn with_count(self, count: Result<Option<u64>, ApiError>) -> Self {
        *lock(&self.count) = count;
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        lock(&self.calls).clone()
    }

    /// Number of page requests (pull requests and members).
    pub fn page_requests(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    SourceCall::PullRequests { .. } | SourceCall::Members { .. }
                )
            })
            .count()
    }

    fn record(&self, call: SourceCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl ApiSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn pull_request_page(
        &self,
        _repo: &RepoRef,
        order: PrOrder,
        cursor: Option<&str>,
        _page_size: u32,
        _token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<PullRequest>, ApiError> {
        self.record(SourceCall::PullRequests {
            order,
            cursor: cursor.map(str::to_string),
        });
        if ctx.cancel.is_cancelled() {
            return Err(ApiError::cancelled("pull_requests"));
        }
        lock(&self.pull_pages)
            .pop_front()
            .unwrap_or_else(|| Ok(Page::last(Vec::new())))
    }

    async fn count_pull_requests(
        &self,
        _repo: &RepoRef,
        range: DateRange,
        _token: &str,
        _ctx: CallContext<'_>,
    ) -> Result<Option<u64>, ApiError> {
        self.record(SourceCall::Count(range));
        lock(&self.count).clone()
    }

    async fn member_page(
        &self,
        _org: &str,
        cursor: Option<&str>,
        _page_size: u32,
        _token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<Member>, ApiError> {
        self.record(SourceCall::Members {
            cursor: cursor.map(str::to_string),
        });
        if ctx.cancel.is_cancelled() {
            return Err(ApiError::cancelled("members"));
        }
        lock(&self.member_pages)
            .pop_front()
            .unwrap_or_else(|| Ok(Page::last(Vec::new())))
    }

    async fn rate_limit(
        &self,
        _token: &str,
        _ctx: CallContext<'_>,
    ) -> Result<RateLimitReading, ApiError> {
        self.record(SourceCall::RateLimit);
        Ok(RateLimitReading {
            limit: 5000,
            remaining: 5000,
            reset_at: Utc::now(),
            cost: Some(1),
        })
    }
}

/// A page with a successor at `cursor`.
pub fn page_with_more<T>(items: Vec<T>, cursor: &str) -> Page<T> {
    Page {
        items,
        has_more: true,
        next_cursor: Some(cursor.to_string()),
        total_count: None,
        total_is_exact: false,
    }
}

/// A merged pull request with one review, created and updated at the given times.
pub fn pull_request(
    number: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> PullRequest {
    PullRequest {
        id: 1000 + number,
        number,
        title: format!("Change #{number}"),
        state: PullRequestState::Merged,
        draft: false,
        author: Some("octocat".into()),
        created_at,
        updated_at,
        merged_at: Some(updated_at),
        closed_at: Some(updated_at),
        additions: 10,
        deletions: 2,
        reviews: vec![Review {
            id: 5000 + number,
            author: Some("hubot".into()),
            state: "APPROVED".into(),
            submitted_at: Some(updated_at),
        }],
        commits: Vec::new(),
        comments: Vec::new(),
    }
}

pub fn member(id: u64, login: &str) -> Member {
    Member {
        id,
        login: login.to_string(),
        name: None,
        role: MemberRole::Member,
    }
}
