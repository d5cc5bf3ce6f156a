//! Composition root: adapters, jobs and the admin surface wired together

use anyhow::{Context, Result};
use netbill_api_rpc::RpcHandler;
use netbill_core::application::jobs::{
    self, DeadlineAlertJob, DispatchJob, InvoiceGenerationJob, QuotaResetJob, SalaryAccrualJob,
};
use netbill_core::application::{Clock, JobHandler, JobScheduler, NotificationService};
use netbill_core::port::id_provider::UuidProvider;
use netbill_core::port::time_provider::SystemTimeProvider;
use netbill_core::port::{IdProvider, RateLimiter, TimeProvider};
use netbill_infra_sqlite::{
    SqliteBillingRepository, SqliteJobRunStore, SqliteNotificationQueue, SqlitePayrollRepository,
    SqliteTenantConfigRepository,
};
use netbill_infra_transport::HttpTransportFactory;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::settings::Settings;

pub struct App {
    pub scheduler: Arc<JobScheduler>,
    pub rpc_handler: RpcHandler,
}

impl App {
    /// Build every job over `pool` and register it on a fresh scheduler
    pub fn build(settings: &Settings, pool: SqlitePool) -> Result<Self> {
        Self::build_with(settings, pool, Arc::new(SystemTimeProvider))
    }

    pub fn build_with(
        settings: &Settings,
        pool: SqlitePool,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let clock = Clock::new(time_provider.clone(), settings.tz()?);
        let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

        let tenants = Arc::new(SqliteTenantConfigRepository::new(pool.clone()));
        let billing = Arc::new(SqliteBillingRepository::new(pool.clone()));
        let payroll = Arc::new(SqlitePayrollRepository::new(pool.clone()));
        let outbox = Arc::new(SqliteNotificationQueue::new(pool.clone()));
        let run_store = Arc::new(SqliteJobRunStore::new(pool));
        let limiter: Arc<dyn RateLimiter> = outbox.clone();

        let transports = Arc::new(
            HttpTransportFactory::new(settings.transport.timeout())
                .context("failed to build HTTP transport")?,
        );

        let notifications = Arc::new(NotificationService::new(
            outbox.clone(),
            id_provider.clone(),
            time_provider.clone(),
        ));

        let mut handlers: HashMap<&'static str, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(
            jobs::INVOICE_GENERATION,
            Arc::new(InvoiceGenerationJob::new(
                billing.clone(),
                billing.clone(),
                tenants.clone(),
                notifications.clone(),
                id_provider.clone(),
                time_provider.clone(),
                settings.billing.cycle,
            )),
        );
        handlers.insert(
            jobs::SALARY_ACCRUAL,
            Arc::new(SalaryAccrualJob::new(
                payroll.clone(),
                payroll,
                id_provider,
                time_provider.clone(),
            )),
        );
        handlers.insert(
            jobs::DISPATCH,
            Arc::new(DispatchJob::new(
                tenants.clone(),
                outbox.clone(),
                limiter.clone(),
                outbox,
                transports,
                time_provider,
            )),
        );
        handlers.insert(
            jobs::DEADLINE_ALERTS,
            Arc::new(DeadlineAlertJob::new(tenants, billing, notifications.clone())),
        );
        handlers.insert(jobs::QUOTA_RESET, Arc::new(QuotaResetJob::new(limiter.clone())));

        let scheduler = Arc::new(JobScheduler::new(
            clock.clone(),
            settings.scheduler.scheduler_config(),
            run_store,
        ));
        for (job_id, trigger) in settings.jobs.entries() {
            let handler = handlers
                .remove(job_id)
                .with_context(|| format!("no handler for job {}", job_id))?;
            scheduler
                .register(job_id, *trigger, handler)
                .with_context(|| format!("invalid schedule for job {}", job_id))?;
        }

        info!(
            tz = %clock.tz(),
            cycle = ?settings.billing.cycle,
            "Jobs registered"
        );

        let rpc_handler = RpcHandler::new(scheduler.clone(), notifications, limiter, clock);
        Ok(Self {
            scheduler,
            rpc_handler,
        })
    }
}
