// Calendar Month Window

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::{DomainError, Result};

/// Half-open calendar month `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    pub fn of(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            DomainError::ValidationError(format!("invalid month {}-{:02}", year, month))
        })?;
        Ok(Self::starting_at(start))
    }

    /// Month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self::starting_at(date.with_day(1).unwrap_or(date))
    }

    fn starting_at(start: NaiveDate) -> Self {
        let (year, month) = if start.month() == 12 {
            (start.year() + 1, 1)
        } else {
            (start.year(), start.month() + 1)
        };
        let end = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(start + Duration::days(31));
        Self { start, end }
    }

    pub fn next(&self) -> Self {
        Self::starting_at(self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    pub fn month(&self) -> u32 {
        self.start.month()
    }

    pub fn last_day(&self) -> u32 {
        (self.end - Duration::days(1)).day()
    }

    /// `day` of this month, clamped to the month's length
    pub fn clamp_day(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.last_day());
        self.start.with_day(day).unwrap_or(self.start)
    }

    /// Compact form used in invoice numbers (e.g. `202602`)
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year(), self.month())
    }

    /// Human form used in ledger descriptions (e.g. `February 2026`)
    pub fn long_name(&self) -> String {
        self.start.format("%B %Y").to_string()
    }
}

/// `YYYY-MM`
impl fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}
