//! Calendar-month arithmetic used by the budget and report jobs.
//!
//! All ranges are half-open, `[start, end)`, in UTC. A month range therefore
//! covers every instant of its last day rather than stopping at midnight.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};

use crate::error::{JobError, Result};

/// A half-open UTC time range covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthRange {
    /// The range for the given year and month (1-12).
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| JobError::Validation(format!("Invalid month {}-{}", year, month)))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| JobError::Validation(format!("Month {}-{} out of range", year, month)))?;

        Ok(Self {
            start: Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN)),
            end: Utc.from_utc_datetime(&next.and_time(chrono::NaiveTime::MIN)),
        })
    }

    /// The month containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Result<Self> {
        Self::new(now.year(), now.month())
    }

    /// The calendar month before the one containing `now`.
    pub fn previous(now: DateTime<Utc>) -> Result<Self> {
        let (year, month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        Self::new(year, month)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Human readable label, e.g. "January 2025".
    pub fn label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

/// True when `last` falls in a different calendar month (or year) than `now`.
pub fn is_new_month(last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last.month() != now.month() || last.year() != now.year()
}
