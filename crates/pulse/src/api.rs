//! Upstream-agnostic API surface.
//!
//! The sync engine talks to an [`ApiSource`] and never to a concrete client.
//! Both the GraphQL client and the REST fallback implement it, return the
//! same records, and fail with the same [`ApiError`] taxonomy.

mod errors;
mod rate_limit;
mod types;

pub use errors::{ApiError, short_error_message};
pub use rate_limit::{
    DEFAULT_MAX_WAIT, DEFAULT_THRESHOLD, RateLimitGuard, RateLimitPolicy, RateLimitReading,
};
pub use types::{
    ApiSource, CallContext, Comment, Commit, DateRange, Member, MemberRole, Page, PrOrder,
    PullRequest, PullRequestState, RepoRef, Review,
};
