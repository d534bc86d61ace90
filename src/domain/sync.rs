//! Sync window planning.
//!
//! A sync window scopes one mailbox scan in time. Planning is a pure
//! function of the user's stored cursor and any caller-supplied range:
//! an explicit range wins, then the cursor, then an unbounded first run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How the bounds of a window were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Caller supplied both bounds explicitly.
    Manual,
    /// Lower bound derived from the last completed run.
    Incremental,
    /// First-ever run; the whole mailbox history.
    Full,
}

/// The date range used to scope one mailbox scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    /// Inclusive lower bound, if any.
    pub start: Option<NaiveDate>,
    /// Exclusive upper bound, if any.
    pub end: Option<NaiveDate>,
    /// How this window was chosen.
    pub mode: SyncMode,
}

impl SyncWindow {
    /// Plans the window for a run.
    ///
    /// An explicit `(start, end)` range always produces a [`SyncMode::Manual`]
    /// window with those bounds verbatim, regardless of any stored cursor.
    /// Otherwise a stored cursor produces an open-ended incremental window,
    /// and a missing cursor an unbounded full scan.
    pub fn plan(
        last_sync: Option<DateTime<Utc>>,
        manual_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Self {
        match (manual_range, last_sync) {
            (Some((start, end)), _) => Self {
                start: Some(start),
                end: Some(end),
                mode: SyncMode::Manual,
            },
            (None, Some(since)) => Self {
                start: Some(since.date_naive()),
                end: None,
                mode: SyncMode::Incremental,
            },
            (None, None) => Self {
                start: None,
                end: None,
                mode: SyncMode::Full,
            },
        }
    }

    /// Whether this run may advance the user's sync cursor afterwards.
    ///
    /// Manual historical fetches must not perturb the incremental cursor.
    pub fn advances_cursor(&self) -> bool {
        self.mode != SyncMode::Manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_cursor_and_no_range_plans_full_scan() {
        let window = SyncWindow::plan(None, None);
        assert_eq!(window.mode, SyncMode::Full);
        assert!(window.start.is_none());
        assert!(window.end.is_none());
        assert!(window.advances_cursor());
    }

    #[test]
    fn cursor_without_range_plans_incremental() {
        let last = Utc.with_ymd_and_hms(2025, 1, 1, 14, 30, 0).unwrap();
        let window = SyncWindow::plan(Some(last), None);

        assert_eq!(window.mode, SyncMode::Incremental);
        assert_eq!(window.start, Some(date(2025, 1, 1)));
        assert!(window.end.is_none());
        assert!(window.advances_cursor());
    }

    #[test]
    fn explicit_range_wins_over_cursor() {
        let last = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let window = SyncWindow::plan(Some(last), Some((date(2024, 1, 1), date(2024, 12, 31))));

        assert_eq!(window.mode, SyncMode::Manual);
        assert_eq!(window.start, Some(date(2024, 1, 1)));
        assert_eq!(window.end, Some(date(2024, 12, 31)));
        assert!(!window.advances_cursor());
    }

    #[test]
    fn manual_bounds_pass_through_verbatim() {
        // Ordering is the caller's responsibility; bounds are not re-validated.
        let window = SyncWindow::plan(None, Some((date(2025, 12, 31), date(2025, 1, 1))));
        assert_eq!(window.start, Some(date(2025, 12, 31)));
        assert_eq!(window.end, Some(date(2025, 1, 1)));
    }
}
