//! GitHub REST v3 fallback client.
//!
//! Page numbers travel through the engine as the opaque cursor, so the sync
//! code drives REST exactly like GraphQL. Budget readings come from the
//! `x-ratelimit-*` headers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;

use crate::api::{
    ApiError, ApiSource, CallContext, DateRange, Member, Page, PrOrder, PullRequest,
    RateLimitGuard, RateLimitReading, RepoRef,
};
use crate::clock::Clock;
use crate::http::{HttpHeaders, HttpRequest, HttpTransport, header_get};
use crate::retry::RetryConfig;

use super::request::RequestExecutor;
use super::types::{RestPull, RestRateLimit, RestUser};

const MAX_PER_PAGE: u32 = 100;

/// Pagination hints from a `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// The last page number (from rel="last" link).
    pub last_page: Option<u32>,
    /// The next page number (from rel="next" link).
    pub next_page: Option<u32>,
}

/// Parse the Link header to extract pagination info.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repos/o/r/pulls?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel_type)) = (url, rel)
            && let Some(page_num) = page_param(url)
        {
            match rel_type {
                "last" => info.last_page = Some(page_num),
                "next" => info.next_page = Some(page_num),
                _ => {}
            }
        }
    }

    info
}

fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}

/// Extract a rate-limit reading from `x-ratelimit-*` response headers.
pub fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitReading> {
    let limit = header_get(headers, "x-ratelimit-limit")?.parse().ok()?;
    let remaining = header_get(headers, "x-ratelimit-remaining")?.parse().ok()?;
    let reset_epoch: i64 = header_get(headers, "x-ratelimit-reset")?.parse().ok()?;
    Some(RateLimitReading {
        limit,
        remaining,
        reset_at: DateTime::from_timestamp(reset_epoch, 0)?,
        cost: None,
    })
}

/// Lists pull requests and members through the REST API.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    exec: RequestExecutor,
}

impl RestClient {
    pub fn new(http: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
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

    async fn get_page<W, T>(
        &self,
        operation: &str,
        url: String,
        per_page: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<T>, ApiError>
    where
        W: serde::de::DeserializeOwned,
        T: From<W>,
    {
        let started = Instant::now();
        let resp = self
            .exec
            .send(operation, HttpRequest::get(url), token, ctx)
            .await?;
        let reading = parse_rate_limit_headers(&resp.headers);
        self.exec
            .settle(operation, started, reading.as_ref(), ctx)
            .await?;

        let items: Vec<W> = resp.json().map_err(|e| {
            tracing::debug!(operation, error = %e, "Unexpected REST payload");
            ApiError::api(operation, "unexpected REST payload")
        })?;

        let links = resp
            .header("link")
            .map(parse_link_header)
            .unwrap_or_default();

        Ok(Page {
            items: items.into_iter().map(T::from).collect(),
            has_more: links.next_page.is_some(),
            next_cursor: links.next_page.map(|p| p.to_string()),
            total_count: links
                .last_page
                .map(|last| u64::from(last) * u64::from(per_page)),
            // Whole pages only; the last one is usually partial.
            total_is_exact: false,
        })
    }
}

fn page_number(operation: &str, cursor: Option<&str>) -> Result<u32, ApiError> {
    match cursor {
        None => Ok(1),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::api(operation, "invalid page cursor")),
    }
}

#[async_trait]
impl ApiSource for RestClient {
    fn name(&self) -> &'static str {
        "rest"
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
        let page = page_number("pull_requests", cursor)?;
        let per_page = page_size.clamp(1, MAX_PER_PAGE);
        let sort = match order {
            PrOrder::Created => "created",
            PrOrder::Updated => "updated",
        };
        let url = format!(
            "{}/repos/{}/{}/pulls?state=all&sort={sort}&direction=desc&per_page={per_page}&page={page}",
            self.base_url, repo.owner, repo.name
        );
        self.get_page::<RestPull, _>("pull_requests", url, per_page, token, ctx)
            .await
    }

    async fn count_pull_requests(
        &self,
        _repo: &RepoRef,
        _range: DateRange,
        _token: &str,
        _ctx: CallContext<'_>,
    ) -> Result<Option<u64>, ApiError> {
        Ok(None)
    }

    async fn member_page(
        &self,
        org: &str,
        cursor: Option<&str>,
        page_size: u32,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<Page<Member>, ApiError> {
        let page = page_number("org_members", cursor)?;
        let per_page = page_size.clamp(1, MAX_PER_PAGE);
        let url = format!(
            "{}/orgs/{org}/members?per_page={per_page}&page={page}",
            self.base_url
        );
        self.get_page::<RestUser, _>("org_members", url, per_page, token, ctx)
            .await
    }

    async fn rate_limit(
        &self,
        token: &str,
        ctx: CallContext<'_>,
    ) -> Result<RateLimitReading, ApiError> {
        let url = format!("{}/rate_limit", self.base_url);
        let resp = self
            .exec
            .send("rate_limit", HttpRequest::get(url), token, ctx)
            .await?;
        let body: RestRateLimit = resp
            .json()
            .map_err(|_| ApiError::api("rate_limit", "unexpected REST payload"))?;
        Ok(body.resources.core.into_reading())
    }
}
