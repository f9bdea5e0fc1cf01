// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting and validation windows.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Today's calendar date. UTC is the canonical zone for all date-window
/// checks; activity documents carry no timezone of their own.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whether `today` falls within `[start, end]` inclusive.
pub fn within_window(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    today >= start && today <= end
}
