//! RPC Method Handlers

use crate::error::{throttled, to_rpc_error};
use crate::throttle::Throttle;
use crate::types::{
    EnqueueResponse, JobInfo, JobsRequest, JobsResponse, QuotaRequest, QuotaResponse,
    RunJobRequest, RunJobResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use netbill_core::application::{Clock, JobScheduler, NotificationService};
use netbill_core::domain::NewNotification;
use netbill_core::error::AppError;
use netbill_core::port::{EnqueueOutcome, RateLimiter};
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    scheduler: Arc<JobScheduler>,
    notifications: Arc<NotificationService>,
    limiter: Arc<dyn RateLimiter>,
    clock: Clock,
    throttle: Throttle,
}

impl RpcHandler {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        notifications: Arc<NotificationService>,
        limiter: Arc<dyn RateLimiter>,
        clock: Clock,
    ) -> Self {
        Self {
            scheduler,
            notifications,
            limiter,
            clock,
            throttle: Throttle::default(),
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// admin.jobs.v1
    pub async fn jobs(&self, _params: JobsRequest) -> Result<JobsResponse, ErrorObjectOwned> {
        let jobs = self.scheduler.jobs().into_iter().map(JobInfo::from).collect();
        Ok(JobsResponse { jobs })
    }

    /// admin.run_job.v1
    pub async fn run_job(&self, params: RunJobRequest) -> Result<RunJobResponse, ErrorObjectOwned> {
        info!(job_id = %params.job_id, "Manual run requested");
        let outcome = self
            .scheduler
            .run_now(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(RunJobResponse {
            job_id: params.job_id,
            outcome,
        })
    }

    /// admin.quota.v1
    pub async fn quota(&self, params: QuotaRequest) -> Result<QuotaResponse, ErrorObjectOwned> {
        let date = params.date.unwrap_or_else(|| self.clock.today());
        let quota = self
            .limiter
            .quota(&params.tenant_id, date)
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(format!("tenant {}", params.tenant_id)))
            })?;

        Ok(QuotaResponse {
            remaining: quota.remaining(),
            tenant_id: quota.tenant_id,
            date: quota.quota_date,
            sent_count: quota.sent_count,
            daily_limit: quota.daily_limit,
        })
    }

    /// notifications.enqueue.v1
    pub async fn enqueue(
        &self,
        params: NewNotification,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        if !self.throttle.try_acquire() {
            return Err(throttled());
        }

        let outcome = self
            .notifications
            .enqueue(params)
            .await
            .map_err(to_rpc_error)?;

        Ok(match outcome {
            EnqueueOutcome::Enqueued(id) => EnqueueResponse {
                message_id: Some(id),
                duplicate: false,
            },
            EnqueueOutcome::Duplicate => EnqueueResponse {
                message_id: None,
                duplicate: true,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use chrono::{NaiveDate, TimeZone, Utc};
    use netbill_core::application::jobs::QuotaResetJob;
    use netbill_core::application::{JobSummary, RunOutcome, SchedulerConfig};
    use netbill_core::domain::{MessageType, TriggerSpec};
    use netbill_core::port::id_provider::mocks::SequentialIdProvider;
    use netbill_core::port::job_run_store::mocks::InMemoryRunStore;
    use netbill_core::port::notification_queue::mocks::InMemoryOutbox;
    use netbill_core::port::time_provider::mocks::FixedTimeProvider;

    fn handler(outbox: &InMemoryOutbox) -> RpcHandler {
        let time = Arc::new(FixedTimeProvider::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 20, 30, 0).unwrap(),
        ));
        let clock = Clock::new(time.clone(), chrono_tz::Asia::Karachi);
        let limiter: Arc<dyn RateLimiter> = Arc::new(outbox.clone());

        let scheduler = Arc::new(JobScheduler::new(
            clock.clone(),
            SchedulerConfig::default(),
            Arc::new(InMemoryRunStore::default()),
        ));
        scheduler
            .register(
                "quota_reset",
                TriggerSpec::daily(0, 0),
                Arc::new(QuotaResetJob::new(limiter.clone())),
            )
            .unwrap();

        let notifications = Arc::new(NotificationService::new(
            Arc::new(outbox.clone()),
            Arc::new(SequentialIdProvider::default()),
            time,
        ));
        RpcHandler::new(scheduler, notifications, limiter, clock)
    }

    #[tokio::test]
    async fn test_jobs_lists_registered() {
        let h = handler(&InMemoryOutbox::new());
        let resp = h.jobs(JobsRequest::default()).await.unwrap();
        assert_eq!(resp.jobs.len(), 1);
        assert_eq!(resp.jobs[0].job_id, "quota_reset");
        assert_eq!(resp.jobs[0].schedule, "0 0 * * *");
    }

    #[tokio::test]
    async fn test_run_job_reports_summary() {
        let outbox = InMemoryOutbox::new().with_limit("t1", 50);
        let h = handler(&outbox);

        let resp = h
            .run_job(RunJobRequest {
                job_id: "quota_reset".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(
            resp.outcome,
            RunOutcome::Completed {
                summary: JobSummary::QuotaReset(_)
            }
        ));

        let err = h
            .run_job(RunJobRequest {
                job_id: "nope".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_quota_defaults_to_local_today() {
        let outbox = InMemoryOutbox::new().with_limit("t1", 50);
        let h = handler(&outbox);
        // 20:30 UTC is already the next day in Karachi
        let today = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
        assert!(outbox.increment_sent("t1", today).await.unwrap());

        let resp = h
            .quota(QuotaRequest {
                tenant_id: "t1".to_string(),
                date: None,
            })
            .await
            .unwrap();
        assert_eq!(resp.date, today);
        assert_eq!(resp.sent_count, 1);
        assert_eq!(resp.remaining, 49);

        let err = h
            .quota(QuotaRequest {
                tenant_id: "unknown".to_string(),
                date: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_enqueue_duplicate_and_validation() {
        let outbox = InMemoryOutbox::new();
        let h = handler(&outbox);

        let mut req =
            NewNotification::text("t1", "+92300", "due soon", MessageType::DeadlineAlert, 5);
        req.related_invoice_id = Some("inv-1".to_string());

        let first = h.enqueue(req.clone()).await.unwrap();
        assert!(!first.duplicate);
        assert!(first.message_id.is_some());

        let second = h.enqueue(req).await.unwrap();
        assert!(second.duplicate);
        assert_eq!(outbox.messages().len(), 1);

        let blank = NewNotification::text("t1", "", "x", MessageType::General, 5);
        let err = h.enqueue(blank).await.unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_throttled() {
        let h = handler(&InMemoryOutbox::new()).with_throttle(Throttle::new(1, 1));
        let req = NewNotification::text("t1", "+92300", "hi", MessageType::General, 5);

        h.enqueue(req.clone()).await.unwrap();
        let err = h.enqueue(req).await.unwrap_err();
        assert_eq!(err.code(), code::THROTTLED);
    }
}
