// Daily Send Quota

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::notification::TenantId;

/// One row per tenant per date; `0 <= sent_count <= daily_limit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitQuota {
    pub tenant_id: TenantId,
    pub quota_date: NaiveDate,
    pub sent_count: u32,
    pub daily_limit: u32,
}

impl RateLimitQuota {
    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.sent_count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_never_negative() {
        let mut q = RateLimitQuota {
            tenant_id: "t1".to_string(),
            quota_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            sent_count: 48,
            daily_limit: 50,
        };
        assert_eq!(q.remaining(), 2);
        q.sent_count = 50;
        assert!(q.is_exhausted());
        q.daily_limit = 10;
        assert_eq!(q.remaining(), 0);
    }
}
