//! Clock - wall-clock time in the scheduler's fixed timezone

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::domain::TriggerSpec;
use crate::port::TimeProvider;

#[derive(Clone)]
pub struct Clock {
    time_provider: Arc<dyn TimeProvider>,
    tz: Tz,
}

impl Clock {
    pub fn new(time_provider: Arc<dyn TimeProvider>, tz: Tz) -> Self {
        Self { time_provider, tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time_provider.now()
    }

    pub fn now_millis(&self) -> i64 {
        self.time_provider.now_millis()
    }

    /// Calendar date of `at` in the scheduler timezone
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(self.now())
    }

    pub fn next_fire(&self, trigger: &TriggerSpec, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        trigger.next_fire_after(after, self.tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::TimeZone;

    #[test]
    fn test_today_uses_fixed_timezone() {
        // 20:30 UTC on the 10th is already the 11th in Karachi
        let time = Arc::new(FixedTimeProvider::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 20, 30, 0).unwrap(),
        ));
        let clock = Clock::new(time, chrono_tz::Asia::Karachi);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());

        let utc_clock = Clock::new(
            Arc::new(FixedTimeProvider::new(
                Utc.with_ymd_and_hms(2026, 3, 10, 20, 30, 0).unwrap(),
            )),
            chrono_tz::UTC,
        );
        assert_eq!(utc_clock.today(), NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
    }
}
