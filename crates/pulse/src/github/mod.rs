//! GitHub adapters.
//!
//! # Module Structure
//!
//! - [`graphql`] - GraphQL v4 client, the primary [`ApiSource`](crate::api::ApiSource)
//! - [`rest`] - REST v3 fallback client
//! - [`app`] - GitHub App JWTs, installation tokens and installation status
//! - `error` - status and GraphQL error classification
//!
//! Both clients share one request path: timeouts are retried with backoff,
//! other failures are classified once, and every response's rate-limit
//! reading is checked before the result is returned.

mod app;
mod error;
mod graphql;
mod queries;
mod request;
mod rest;
mod types;

pub use app::{AppCredentials, AppInstallationStore, AppTokenFetcher};
pub use error::{GraphQlError, classify_graphql_errors, classify_status};
pub use graphql::GraphQlClient;
pub use rest::{LinkPagination, RestClient, parse_link_header, parse_rate_limit_headers};

/// Public REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Public GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
