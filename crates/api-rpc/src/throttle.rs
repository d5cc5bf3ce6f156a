//! Request throttle for the enqueue endpoint (token bucket)
//!
//! Independent of the per-tenant daily send quota: this only caps how fast
//! callers can push work into the queue.

use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

pub struct Throttle {
    bucket: Mutex<Bucket>,
    capacity: f64,
    refill_per_sec: f64,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Throttle {
    /// Allow bursts of `capacity` requests, refilled at `refill_per_sec`
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: f64::from(capacity),
                refilled_at: Instant::now(),
            }),
            capacity: f64::from(capacity),
            refill_per_sec: f64::from(refill_per_sec),
        }
    }

    /// Take one token; false when the bucket is empty
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(200, 100)
    }
}
