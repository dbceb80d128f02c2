//! GraphQL documents sent to the GitHub v4 API.
//!
//! Every document selects `rateLimit` so each response carries the budget
//! reading the rate-limit guard needs.

pub(crate) const PULL_REQUESTS: &str = r#"
query PullRequests($owner: String!, $name: String!, $first: Int!, $after: String, $orderBy: IssueOrderField!) {
  rateLimit { limit cost remaining resetAt }
  repository(owner: $owner, name: $name) {
    pullRequests(first: $first, after: $after, orderBy: {field: $orderBy, direction: DESC}) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        databaseId
        number
        title
        state
        isDraft
        author { login }
        createdAt
        updatedAt
        mergedAt
        closedAt
        additions
        deletions
        reviews(first: 25) {
          nodes { databaseId author { login } state submittedAt }
        }
        commits(first: 25) {
          nodes { commit { oid message committedDate author { user { login } } } }
        }
        comments(first: 25) {
          nodes { databaseId author { login } body createdAt }
        }
      }
    }
  }
}
"#;

pub(crate) const COUNT_PULL_REQUESTS: &str = r#"
query CountPullRequests($query: String!) {
  rateLimit { limit cost remaining resetAt }
  search(query: $query, type: ISSUE, first: 0) { issueCount }
}
"#;

pub(crate) const ORG_MEMBERS: &str = r#"
query OrgMembers($login: String!, $first: Int!, $after: String) {
  rateLimit { limit cost remaining resetAt }
  organization(login: $login) {
    membersWithRole(first: $first, after: $after) {
      totalCount
      pageInfo { hasNextPage endCursor }
      edges {
        role
        node { databaseId login name }
      }
    }
  }
}
"#;

pub(crate) const RATE_LIMIT: &str = r#"
query RateLimit {
  rateLimit { limit cost remaining resetAt }
}
"#;
