//! GitHub GraphQL client.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::api::{
    ApiError, ApiSource, CallContext, DateRange, Member, Page, PrOrder, PullRequest,
    RateLimitGuard, RateLimitReading, RepoRef,
};
use crate::clock::Clock;
use crate::http::{HttpRequest, HttpTransport};
use crate::retry::RetryConfig;

use super::error::classify_graphql_errors;
use super::queries;
use super::request::RequestExecutor;
use super::types::{CountData, GraphQlEnvelope, MembersData, PullRequestsData};

/// Largest page GitHub serves for connection fields.
const MAX_PAGE_SIZE: u32 = 100;

/// Executes queries against a single GraphQL endpoint.
#[derive(Clone)]
pub struct GraphQlClient {
    endpoint: String,
    exec: RequestExecutor,
}

impl GraphQlClient {
    pub fn new(http: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            exec: RequestExecutor::new(http),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.exec.set_retry(retry);
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, guard: RateLimitGuard) -> Self {
        self.exec.set_guard(guard);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.exec.set_clock(clock);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<(GraphQlEnvelope, Option<RateLimitReading>), ApiError> {
        let body = json!({ "query": query, "variables": variables });
        let request = HttpRequest::post_json(&self.endpoint, &body)
            .map_err(|e| ApiError::api(operation, e.to_string()))?;

        let resp = self.exec.send(operation, request, token, ctx).await?;
        let mut envelope: GraphQlEnvelope = resp.json().map_err(|e| {
            tracing::debug!(operation, error = %e, "Undecodable GraphQL envelope");
            ApiError::api(operation, "malformed GraphQL response")
        })?;

        // Partial responses still carry the budget next to their errors.
        let reading = envelope
            .data
            .as_mut()
            .and_then(|data| data.get_mut("rateLimit"))
            .map(Value::take)
            .and_then(|v| serde_json::from_value::<RateLimitReading>(v).ok());

        Ok((envelope, reading))
    }

    /// Run one query and decode its `data`.
    ///
    /// Timeouts are retried; the rate-limit guard sees the reading before the
    /// result is returned, including for responses that carry errors.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let (envelope, reading) = self.fetch(operation, query, variables, token, ctx).await?;
        let settled = self
            .exec
            .settle(operation, started, reading.as_ref(), ctx)
            .await;

        if !envelope.errors.is_empty() {
            if let Err(e) = settled
                && e.is_cancelled()
            {
                return Err(e);
            }
            let reset_at = reading
                .as_ref()
                .map_or_else(|| self.exec.now(), |r| r.reset_at);
            return Err(classify_graphql_errors(operation, &envelope.errors, reset_at));
        }
        settled?;

        let data = envelope
            .data
            .ok_or_else(|| ApiError::api(operation, "GraphQL response without data"))?;
        serde_json::from_value(data).map_err(|e| {
            tracing::debug!(operation, error = %e, "Unexpected GraphQL data shape");
            ApiError::api(operation, "unexpected GraphQL data shape")
        })
    }
}

/// Search qualifier counting a repository's pull requests created in `range`.
pub(crate) fn count_search_query(repo: &RepoRef, range: DateRange) -> String {
    const FMT: &str = "%Y-%m-%dT%H:%M:%SZ";
    let mut query = format!("repo:{repo} is:pr");
    match (range.start, range.end) {
        (Some(start), Some(end)) => {
            query.push_str(&format!(" created:{}..{}", start.format(FMT), end.format(FMT)));
        }
        (Some(start), None) => query.push_str(&format!(" created:>={}", start.format(FMT))),
        (None, Some(end)) => query.push_str(&format!(" created:<={}", end.format(FMT))),
        (None, None) => {}
    }
    query
}

fn order_field(order: PrOrder) -> &'static str {
    match order {
        PrOrder::Created => "CREATED_AT",
        PrOrder::Updated => "UPDATED_AT",
    }
}

#[async_trait]
impl ApiSource for GraphQlClient {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn pull_request_page(
        &self,
        repo: &RepoRef,
        order: PrOrder,
        cursor: Option<&str>,
        page_size: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<PullRequest>, ApiError> {
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "first": page_size.clamp(1, MAX_PAGE_SIZE),
            "after": cursor,
            "orderBy": order_field(order),
        });
        let data: PullRequestsData = self
            .execute("pull_requests", queries::PULL_REQUESTS, variables, token, ctx)
            .await?;

        data.repository
            .map(|r| r.pull_requests.into_page())
            .ok_or_else(|| ApiError::api("pull_requests", "repository not found"))
    }

    async fn count_pull_requests(
        &self,
        repo: &RepoRef,
        range: DateRange,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Option<u64>, ApiError> {
        let variables = json!({ "query": count_search_query(repo, range) });
        let data: CountData = self
            .execute(
                "count_pull_requests",
                queries::COUNT_PULL_REQUESTS,
                variables,
                token,
                ctx,
            )
            .await?;
        Ok(Some(data.search.issue_count))
    }

    async fn member_page(
        &self,
        org: &str,
        cursor: Option<&str>,
        page_size: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<Member>, ApiError> {
        let variables = json!({
            "login": org,
            "first": page_size.clamp(1, MAX_PAGE_SIZE),
            "after": cursor,
        });
        let data: MembersData = self
            .execute("org_members", queries::ORG_MEMBERS, variables, token, ctx)
            .await?;

        data.organization
            .map(|o| o.members_with_role.into_page())
            .ok_or_else(|| ApiError::api("org_members", "organization not found"))
    }

    async fn rate_limit(
        &self,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<RateLimitReading, ApiError> {
        let (envelope, reading) = self
            .fetch("rate_limit", queries::RATE_LIMIT, json!({}), token, ctx)
            .await?;
        match reading {
            Some(reading) => Ok(reading),
            None if !envelope.errors.is_empty() => Err(classify_graphql_errors(
                "rate_limit",
                &envelope.errors,
                self.exec.now(),
            )),
            None => Err(ApiError::api("rate_limit", "response carried no rateLimit")),
        }
    }
}
