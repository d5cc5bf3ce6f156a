// Daily quota reset

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::QuotaResetSummary;
use crate::application::scheduler::{JobContext, JobHandler, JobSummary};
use crate::error::Result;
use crate::port::RateLimiter;

pub struct QuotaResetJob {
    limiter: Arc<dyn RateLimiter>,
}

impl QuotaResetJob {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl JobHandler for QuotaResetJob {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary> {
        let tenants_reset = self.limiter.reset_daily(ctx.today).await?;
        info!(date = %ctx.today, tenants_reset, "Daily quotas reset");
        Ok(JobSummary::QuotaReset(QuotaResetSummary { tenants_reset }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::shutdown_channel;
    use crate::port::notification_queue::mocks::InMemoryOutbox;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[tokio::test]
    async fn test_resets_todays_counters() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
        let outbox = InMemoryOutbox::new().with_limit("t1", 50).with_limit("t2", 10);
        outbox.set_sent_count("t1", today, 50);

        let (_tx, shutdown) = shutdown_channel();
        let ctx = JobContext {
            job_id: "quota_reset".to_string(),
            fired_at: Utc.with_ymd_and_hms(2026, 3, 10, 19, 0, 0).unwrap(),
            today,
            shutdown,
        };

        let summary = QuotaResetJob::new(Arc::new(outbox.clone()))
            .run(ctx)
            .await
            .unwrap();
        assert_eq!(summary, JobSummary::QuotaReset(QuotaResetSummary { tenants_reset: 2 }));
        assert_eq!(outbox.remaining_quota("t1", today).await.unwrap(), 50);
    }
}
