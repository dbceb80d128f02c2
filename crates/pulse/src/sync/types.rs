//! Sync options, windows and constants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::DateRange;

use super::SyncError;

/// Default pull requests per page. Nested reviews, commits and comments make
/// pull request pages expensive in points, so this stays below the maximum.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default members per page.
pub const DEFAULT_MEMBER_PAGE_SIZE: u32 = 100;

/// Widest window edge accepted, in days (about a century).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Which upstream API serves a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStrategy {
    #[default]
    GraphQl,
    Rest,
}

impl fmt::Display for SourceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphQl => write!(f, "graphql"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for SourceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "graphql" => Ok(Self::GraphQl),
            "rest" => Ok(Self::Rest),
            other => Err(format!("unknown strategy '{other}' (expected graphql or rest)")),
        }
    }
}

/// Options shared by every sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Pull requests per page.
    pub page_size: u32,
    /// Members per page.
    pub member_page_size: u32,
    /// Issue a count query to seed an exact progress total.
    pub count_query: bool,
    /// Which API to use.
    pub strategy: SourceStrategy,
    /// Re-run a failed GraphQL sync once through REST.
    pub rest_fallback: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            member_page_size: DEFAULT_MEMBER_PAGE_SIZE,
            count_query: true,
            strategy: SourceStrategy::GraphQl,
            rest_fallback: false,
        }
    }
}

/// A date window relative to "now", in whole days.
///
/// Covers `[now - days_back, now - skip_recent_days]`, with no lower edge when
/// `days_back` is `None` and no upper edge when `skip_recent_days` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub days_back: Option<u32>,
    #[serde(default)]
    pub skip_recent_days: u32,
}

impl SyncWindow {
    /// Entire history.
    pub const ALL: Self = Self {
        days_back: None,
        skip_recent_days: 0,
    };

    /// Fast onboarding preview: the last 30 days.
    pub const PHASE_ONE: Self = Self {
        days_back: Some(30),
        skip_recent_days: 0,
    };

    /// Onboarding backfill: 90 to 30 days ago.
    pub const PHASE_TWO: Self = Self {
        days_back: Some(90),
        skip_recent_days: 30,
    };

    pub fn new(days_back: Option<u32>, skip_recent_days: u32) -> Result<Self, SyncError> {
        let window = Self {
            days_back,
            skip_recent_days,
        };
        window.validate()?;
        Ok(window)
    }

    /// Reject windows whose upper edge is at or before their lower edge, or
    /// whose edges reach past [`MAX_WINDOW_DAYS`].
    pub fn validate(&self) -> Result<(), SyncError> {
        let widest = self.days_back.unwrap_or(0).max(self.skip_recent_days);
        if widest > MAX_WINDOW_DAYS {
            return Err(SyncError::WindowOutOfRange { days: widest });
        }
        match self.days_back {
            Some(days_back) if self.skip_recent_days >= days_back => {
                Err(SyncError::InvalidWindow {
                    days_back,
                    skip_recent_days: self.skip_recent_days,
                })
            }
            _ => Ok(()),
        }
    }

    /// Resolve the window against `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> Result<WindowBounds, SyncError> {
        let days_before = |days: u32| {
            now.checked_sub_signed(Duration::days(i64::from(days)))
                .ok_or(SyncError::WindowOutOfRange { days })
        };

        Ok(WindowBounds {
            start: self.days_back.map(days_before).transpose()?,
            end: match self.skip_recent_days {
                0 => None,
                days => Some(days_before(days)?),
            },
        })
    }
}

/// A resolved window with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowBounds {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }

    /// True when `at` is strictly older than the lower edge.
    pub fn is_before_start(&self, at: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| at < start)
    }

    pub fn as_range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn default_options() {
        let options = SyncOptions::default();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.strategy, SourceStrategy::GraphQl);
        assert!(options.count_query);
        assert!(!options.rest_fallback);
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("GraphQL".parse::<SourceStrategy>().unwrap(), SourceStrategy::GraphQl);
        assert_eq!("rest".parse::<SourceStrategy>().unwrap(), SourceStrategy::Rest);
        assert!("soap".parse::<SourceStrategy>().is_err());
    }

    #[test]
    fn phase_two_bounds_are_inclusive_on_both_edges() {
        let bounds = SyncWindow::PHASE_TWO.bounds(now()).unwrap();
        let start = now() - Duration::days(90);
        let end = now() - Duration::days(30);

        assert!(bounds.contains(start));
        assert!(bounds.contains(end));
        assert!(!bounds.contains(start - Duration::seconds(1)));
        assert!(!bounds.contains(end + Duration::seconds(1)));
        assert!(bounds.is_before_start(start - Duration::seconds(1)));
        assert!(!bounds.is_before_start(end + Duration::days(1)));
    }

    #[test]
    fn zero_skip_leaves_upper_edge_open() {
        let bounds = SyncWindow::PHASE_ONE.bounds(now()).unwrap();
        assert_eq!(bounds.end, None);
        assert!(bounds.contains(now() + Duration::days(1)));
    }

    #[test]
    fn unbounded_window_contains_everything() {
        let bounds = SyncWindow::ALL.bounds(now()).unwrap();
        assert!(bounds.contains(now() - Duration::days(10_000)));
        assert!(!bounds.is_before_start(now() - Duration::days(10_000)));
    }

    #[test]
    fn skip_must_be_smaller_than_days_back() {
        assert!(SyncWindow::new(Some(30), 30).is_err());
        assert!(SyncWindow::new(Some(30), 45).is_err());
        assert!(SyncWindow::new(Some(90), 30).is_ok());
        assert!(SyncWindow::new(None, 30).is_ok());
    }

    #[test]
    fn windows_reaching_past_the_limit_are_rejected() {
        assert!(SyncWindow::new(Some(MAX_WINDOW_DAYS), 0).is_ok());
        assert!(matches!(
            SyncWindow::new(Some(u32::MAX), 0),
            Err(SyncError::WindowOutOfRange { days: u32::MAX })
        ));
        assert!(matches!(
            SyncWindow::new(None, MAX_WINDOW_DAYS + 1),
            Err(SyncError::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn unchecked_window_resolves_to_an_error_instead_of_overflowing() {
        let window = SyncWindow {
            days_back: Some(u32::MAX),
            skip_recent_days: 0,
        };
        let err = window.bounds(now()).unwrap_err();
        assert!(matches!(err, SyncError::WindowOutOfRange { days: u32::MAX }));
    }
}
