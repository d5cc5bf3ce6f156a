// Wall-clock source; jobs and the scheduler never call Utc::now directly

use chrono::{DateTime, Utc};

pub trait TimeProvider: Send + Sync {
    /// Unix epoch milliseconds
    fn now_millis(&self) -> i64;

    /// Current instant as a UTC timestamp
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_default()
    }
}

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually driven clock
    pub struct FixedTimeProvider {
        millis: AtomicI64,
    }

    impl FixedTimeProvider {
        pub fn new(at: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(at.timestamp_millis()),
            }
        }

        pub fn set(&self, at: DateTime<Utc>) {
            self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
        }

        pub fn advance(&self, by: chrono::Duration) {
            self.millis
                .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl TimeProvider for FixedTimeProvider {
        fn now_millis(&self) -> i64 {
            self.millis.load(Ordering::SeqCst)
        }
    }
}
