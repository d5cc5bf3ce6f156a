//! Trigger specification for recurring jobs
//!
//! A trigger is a structured subset of cron: a fixed minute and hour, an optional
//! day-of-month, and an enabled flag. Fire times are resolved in a fixed timezone.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::{DomainError, Result};

/// Upper bound on days scanned when resolving the next fire
const MAX_SCAN_DAYS: i64 = 366 * 2;

/// When a recurring job fires (wall-clock time in the scheduler timezone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub minute: u32,
    pub hour: u32,

    /// None = every day
    #[serde(default)]
    pub day_of_month: Option<u32>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TriggerSpec {
    /// Fire every day at `hour:minute`
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            minute,
            hour,
            day_of_month: None,
            enabled: true,
        }
    }

    /// Fire on `day_of_month` of every month at `hour:minute`
    ///
    /// Months shorter than `day_of_month` are skipped, like cron.
    pub fn monthly(day_of_month: u32, hour: u32, minute: u32) -> Self {
        Self {
            minute,
            hour,
            day_of_month: Some(day_of_month),
            enabled: true,
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    /// Reject out-of-range fields (checked at registration time)
    pub fn validate(&self) -> Result<()> {
        if self.minute > 59 {
            return Err(DomainError::InvalidTrigger(format!(
                "minute {} out of range 0-59",
                self.minute
            )));
        }
        if self.hour > 23 {
            return Err(DomainError::InvalidTrigger(format!(
                "hour {} out of range 0-23",
                self.hour
            )));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(DomainError::InvalidTrigger(format!(
                    "day_of_month {} out of range 1-31",
                    day
                )));
            }
        }
        Ok(())
    }

    /// Resolve the first fire time strictly after `after`
    ///
    /// Returns None for disabled triggers. Local times that do not exist in `tz`
    /// (DST gaps) are skipped.
    pub fn next_fire_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }

        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        let start = after.with_timezone(&tz).date_naive();

        for offset in 0..MAX_SCAN_DAYS {
            let date = start + Duration::days(offset);
            if let Some(day) = self.day_of_month {
                if date.day() != day {
                    continue;
                }
            }

            let Some(local) = tz.from_local_datetime(&date.and_time(time)).earliest() else {
                continue;
            };

            let candidate = local.with_timezone(&Utc);
            if candidate > after {
                return Some(candidate);
            }
        }

        None
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = self
            .day_of_month
            .map(|d| d.to_string())
            .unwrap_or_else(|| "*".to_string());
        write!(f, "{} {} {} * *", self.minute, self.hour, day)?;
        if !self.enabled {
            write!(f, " (disabled)")?;
        }
        Ok(())
    }
}
