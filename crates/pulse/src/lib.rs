//! Pulse - pull request history and organization membership ingestion.
//!
//! This library pages through GitHub's GraphQL API (with a REST fallback),
//! keeps within the points budget, retries timeouts, and hands every record
//! to a caller-supplied sink.
//!
//! # Features
//!
//! - `test-support` - exports in-memory collaborators (`MockTransport`,
//!   `ManualClock`, scripted sources and sinks) for integration tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pulse::github::{DEFAULT_GRAPHQL_URL, GraphQlClient};
//! use pulse::http::ReqwestTransport;
//! use pulse::sync::{SyncEngine, SyncWindow};
//!
//! let http = Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(30))?);
//! let engine = SyncEngine::builder()
//!     .graphql(Arc::new(GraphQlClient::new(http, DEFAULT_GRAPHQL_URL)))
//!     .sink(Arc::new(sink))
//!     .build()?;
//!
//! let tokens = engine.token_provider(&credentials)?;
//! let report = engine.full_sync(&repo, SyncWindow::new(Some(90), 30)?, &tokens).await;
//! ```

pub mod api;
pub mod auth;
pub mod clock;
pub mod github;
pub mod http;
pub mod retry;
pub mod sync;

pub use api::{ApiError, ApiSource, RepoRef};
pub use auth::{Credentials, TokenCache, TokenError, TokenProvider};
pub use sync::{SyncEngine, SyncError, SyncReport};
