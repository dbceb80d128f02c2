//! Pull request and member syncing.
//!
//! # Module Structure
//!
//! - `types` - [`SyncOptions`], [`SyncWindow`] and constants
//! - `engine` - [`SyncEngine`]: full, incremental, onboarding and member syncs
//! - [`Paginator`] - cursor walking driven by `has_more`
//! - [`RecordSink`] - where synced records go
//! - [`SyncResult`] / [`SyncReport`] - tallies and the final report
//! - [`SyncProgress`] - progress events, [`emit()`] and [`ProgressTracker`]
//! - [`run_task`](SyncEngine::run_task) - the task-queue boundary
//!
//! # Example
//!
//! ```ignore
//! use pulse::sync::{SyncEngine, SyncOptions, SyncWindow};
//!
//! let engine = SyncEngine::builder()
//!     .graphql(Arc::new(GraphQlClient::new(http, DEFAULT_GRAPHQL_URL)))
//!     .sink(Arc::new(my_sink))
//!     .options(SyncOptions::default())
//!     .build()?;
//!
//! let tokens = TokenProvider::oauth(token);
//! let report = engine.onboard(&"acme/widgets".parse()?, &tokens).await;
//! println!("{}", serde_json::to_string(&report)?);
//! ```

mod engine;
mod error;
mod paginate;
mod progress;
mod result;
mod sink;
mod task;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::SyncError;
pub use paginate::Paginator;
pub use progress::{ProgressCallback, ProgressTracker, SyncProgress, emit};
pub use result::{SubItemCounts, SyncReport, SyncResult, SyncSummary};
pub use sink::{ApplyOutcome, RecordSink, SinkError};
pub use task::{SyncTarget, SyncTask, TargetKind, TargetResolver};
pub use types::{
    DEFAULT_MEMBER_PAGE_SIZE, DEFAULT_PAGE_SIZE, MAX_WINDOW_DAYS, SourceStrategy, SyncOptions, SyncWindow,
    WindowBounds,
};

#[cfg(any(test, feature = "test-support"))]
pub use sink::MemorySink;
