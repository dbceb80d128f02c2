use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::sync::ProgressCallback;

use super::{ApiError, RateLimitReading};

/// A repository addressed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/name, got '{s}'")),
        }
    }
}

/// One page of results from a paginated listing.
///
/// `has_more` is authoritative; `next_cursor` is only meaningful when it is
/// true.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    /// Unfiltered total reported by the upstream, if any.
    pub total_count: Option<u64>,
    /// False when `total_count` is derived from page arithmetic and may
    /// overcount.
    pub total_is_exact: bool,
}

impl<T> Page<T> {
    /// A final page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: false,
            next_cursor: None,
            total_count: None,
            total_is_exact: false,
        }
    }
}

/// Sort order for pull request listings, always newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrOrder {
    Created,
    Updated,
}

/// Inclusive creation-date bounds for a count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub author: Option<String>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A pull request with its nested activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Upstream database id.
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: PullRequestState,
    pub draft: bool,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

/// An organization member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub role: MemberRole,
}

/// Per-call plumbing threaded from the owning task down to each request.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub cancel: &'a CancellationToken,
    pub on_progress: Option<&'a ProgressCallback>,
}

impl<'a> CallContext<'a> {
    pub fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            cancel,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }
}

/// An upstream that can list pull requests and organization members.
///
/// Implementations pace themselves against the rate-limit budget and retry
/// transient failures internally; every error they return is final for the
/// current operation.
#[async_trait]
pub trait ApiSource: Send + Sync {
    /// Short name used in logs (`graphql`, `rest`).
    fn name(&self) -> &'static str;

    /// Fetch one page of pull requests, newest first by `order`.
    async fn pull_request_page(
        &self,
        repo: &RepoRef,
        order: PrOrder,
        cursor: Option<&str>,
        page_size: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<PullRequest>, ApiError>;

    /// Count pull requests created inside `range`.
    ///
    /// Returns `Ok(None)` when the upstream has no cheap way to count.
    async fn count_pull_requests(
        &self,
        repo: &RepoRef,
        range: DateRange,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Option<u64>, ApiError>;

    /// Fetch one page of organization members.
    async fn member_page(
        &self,
        org: &str,
        cursor: Option<&str>,
        page_size: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<Member>, ApiError>;

    /// Read the current rate-limit budget.
    async fn rate_limit(
        &self,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<RateLimitReading, ApiError>;
}
