//! GitHub wire types and their conversion into API records.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{
    Comment, Commit, Member, MemberRole, Page, PullRequest, PullRequestState, RateLimitReading,
    Review,
};

use super::error::GraphQlError;

/// Top-level GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

// ---------- Pull requests ----------

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestsData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepositoryNode {
    pub pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestConnection {
    pub total_count: u64,
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestNode {
    pub database_id: Option<u64>,
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub is_draft: bool,
    pub author: Option<Actor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub reviews: Nodes<ReviewNode>,
    #[serde(default)]
    pub commits: Nodes<CommitEdge>,
    #[serde(default)]
    pub comments: Nodes<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewNode {
    pub database_id: Option<u64>,
    pub author: Option<Actor>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitEdge {
    pub commit: CommitNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommitNode {
    pub oid: String,
    pub message: String,
    pub committed_date: Option<DateTime<Utc>>,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitAuthor {
    pub user: Option<Actor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentNode {
    pub database_id: Option<u64>,
    pub author: Option<Actor>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn pull_request_state(state: &str, merged: bool) -> PullRequestState {
    if merged || state.eq_ignore_ascii_case("merged") {
        PullRequestState::Merged
    } else if state.eq_ignore_ascii_case("closed") {
        PullRequestState::Closed
    } else {
        PullRequestState::Open
    }
}

impl From<PullRequestNode> for PullRequest {
    fn from(node: PullRequestNode) -> Self {
        Self {
            id: node.database_id.unwrap_or_default(),
            number: node.number,
            title: node.title,
            state: pull_request_state(&node.state, node.merged_at.is_some()),
            draft: node.is_draft,
            author: node.author.map(|a| a.login),
            created_at: node.created_at,
            updated_at: node.updated_at,
            merged_at: node.merged_at,
            closed_at: node.closed_at,
            additions: node.additions,
            deletions: node.deletions,
            reviews: node
                .reviews
                .nodes
                .into_iter()
                .map(|r| Review {
                    id: r.database_id.unwrap_or_default(),
                    author: r.author.map(|a| a.login),
                    state: r.state,
                    submitted_at: r.submitted_at,
                })
                .collect(),
            commits: node
                .commits
                .nodes
                .into_iter()
                .map(|c| Commit {
                    sha: c.commit.oid,
                    message: c.commit.message,
                    author: c.commit.author.and_then(|a| a.user).map(|u| u.login),
                    committed_at: c.commit.committed_date,
                })
                .collect(),
            comments: node
                .comments
                .nodes
                .into_iter()
                .map(|c| Comment {
                    id: c.database_id.unwrap_or_default(),
                    author: c.author.map(|a| a.login),
                    body: c.body,
                    created_at: c.created_at,
                })
                .collect(),
        }
    }
}

impl PullRequestConnection {
    pub(crate) fn into_page(self) -> Page<PullRequest> {
        let has_more = self.page_info.has_next_page;
        Page {
            items: self.nodes.into_iter().map(PullRequest::from).collect(),
            has_more,
            next_cursor: if has_more {
                self.page_info.end_cursor
            } else {
                None
            },
            total_count: Some(self.total_count),
            total_is_exact: true,
        }
    }
}

// ---------- Search count ----------

#[derive(Debug, Deserialize)]
pub(crate) struct CountData {
    pub search: SearchCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchCount {
    pub issue_count: u64,
}

// ---------- Members ----------

#[derive(Debug, Deserialize)]
pub(crate) struct MembersData {
    pub organization: Option<OrganizationNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrganizationNode {
    pub members_with_role: MemberConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberConnection {
    pub total_count: u64,
    pub page_info: PageInfo,
    #[serde(default)]
    pub edges: Vec<MemberEdge>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberEdge {
    pub role: String,
    pub node: MemberNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberNode {
    pub database_id: Option<u64>,
    pub login: String,
    pub name: Option<String>,
}

pub(crate) fn member_role(role: &str) -> MemberRole {
    if role.eq_ignore_ascii_case("admin") {
        MemberRole::Admin
    } else {
        MemberRole::Member
    }
}

impl MemberConnection {
    pub(crate) fn into_page(self) -> Page<Member> {
        let has_more = self.page_info.has_next_page;
        Page {
            items: self
                .edges
                .into_iter()
                .map(|edge| Member {
                    id: edge.node.database_id.unwrap_or_default(),
                    login: edge.node.login,
                    name: edge.node.name.filter(|n| !n.is_empty()),
                    role: member_role(&edge.role),
                })
                .collect(),
            has_more,
            next_cursor: if has_more {
                self.page_info.end_cursor
            } else {
                None
            },
            total_count: Some(self.total_count),
            total_is_exact: true,
        }
    }
}

// ---------- REST ----------

#[derive(Debug, Deserialize)]
pub(crate) struct RestUser {
    pub id: u64,
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestPull {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub user: Option<RestUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<RestPull> for PullRequest {
    fn from(pull: RestPull) -> Self {
        Self {
            id: pull.id,
            number: pull.number,
            title: pull.title,
            state: pull_request_state(&pull.state, pull.merged_at.is_some()),
            draft: pull.draft,
            author: pull.user.map(|u| u.login),
            created_at: pull.created_at,
            updated_at: pull.updated_at,
            merged_at: pull.merged_at,
            closed_at: pull.closed_at,
            additions: 0,
            deletions: 0,
            reviews: Vec::new(),
            commits: Vec::new(),
            comments: Vec::new(),
        }
    }
}

impl From<RestUser> for Member {
    fn from(user: RestUser) -> Self {
        Self {
            id: user.id,
            login: user.login,
            name: None,
            role: MemberRole::Member,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestRateLimit {
    pub resources: RestRateResources,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestRateResources {
    pub core: RestRateResource,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestRateResource {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

impl RestRateResource {
    pub(crate) fn into_reading(self) -> RateLimitReading {
        RateLimitReading {
            limit: self.limit,
            remaining: self.remaining,
            reset_at: DateTime::from_timestamp(self.reset, 0).unwrap_or_default(),
            cost: None,
        }
    }
}
