//! Progress reporting types for sync operations.
//!
//! Events are emitted by the engine, the retry driver and the rate-limit
//! guard, and consumed by whatever front end is attached (progress bars,
//! structured logs, or nothing at all).

/// Progress events emitted during sync operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A sync operation started for a target.
    SyncStarted {
        /// Repository (`owner/name`) or organization login.
        target: String,
        /// Operation label (`full`, `incremental`, `members`).
        operation: &'static str,
    },

    /// An onboarding phase started.
    PhaseStarted {
        /// Repository being onboarded.
        target: String,
        /// Phase number (1-indexed).
        phase: u8,
        /// Lower edge of the window, in days before now.
        days_back: Option<u32>,
        /// Upper edge of the window, in days before now.
        skip_recent_days: u32,
    },

    /// The progress denominator was set or raised.
    TotalEstimated {
        /// Target being synced.
        target: String,
        /// Expected number of items.
        total: u64,
        /// False when the figure is a heuristic or an unfiltered count.
        exact: bool,
    },

    /// Fetched and processed one page.
    FetchedPage {
        /// Target being synced.
        target: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of items on this page.
        count: usize,
        /// Running total of items processed so far.
        processed_so_far: usize,
    },

    /// One item could not be applied; the sync continues.
    ItemFailed {
        /// Target being synced.
        target: String,
        /// Short item label, e.g. `#42` or a login.
        item: String,
        /// Error message.
        error: String,
    },

    /// Waiting for the rate-limit budget to reset.
    RateLimitWait {
        /// Operation that observed the low budget.
        operation: String,
        /// Points remaining when the wait began.
        remaining: u32,
        /// How long the wait lasts, in seconds.
        wait_secs: u64,
    },

    /// Backing off before retrying a timed-out call.
    RetryBackoff {
        /// Operation being retried.
        operation: String,
        /// Attempt that just failed (1-indexed).
        attempt: u32,
        /// Delay before the next attempt, in milliseconds.
        retry_after_ms: u64,
    },

    /// A sync operation finished (successfully or not).
    SyncComplete {
        /// Target that finished.
        target: String,
        /// Items processed.
        processed: usize,
        /// Non-fatal errors recorded.
        errors: usize,
    },
}

/// Callback for receiving progress updates.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Helper to emit progress if callback is present.
#[inline]
pub fn emit(callback: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}

/// Tracks the progress denominator so it is only ever revised upward.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker {
    total: Option<u64>,
    exact: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current denominator, if one has been reported.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Offer a new total.
    ///
    /// Returns the value to report when it raises the denominator, `None`
    /// when the offer would shrink or repeat what callers already saw.
    pub fn raise(&mut self, candidate: u64, exact: bool) -> Option<u64> {
        match self.total {
            Some(current) if candidate <= current => None,
            _ => {
                self.total = Some(candidate);
                self.exact = exact;
                Some(candidate)
            }
        }
    }

    /// Make sure the denominator covers `processed` items.
    pub fn cover(&mut self, processed: u64) -> Option<u64> {
        let exact = self.exact;
        self.raise(processed, exact)
    }
}
