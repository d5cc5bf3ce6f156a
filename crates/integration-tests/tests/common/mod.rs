//! Shared wiring for end-to-end tests: every job over in-memory SQLite

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Karachi;
use netbill_core::application::jobs::{
    self, BillingCycle, DeadlineAlertJob, DispatchJob, InvoiceGenerationJob, QuotaResetJob,
    SalaryAccrualJob,
};
use netbill_core::application::{
    Clock, JobScheduler, JobSummary, NotificationService, RunOutcome, SchedulerConfig,
};
use netbill_core::domain::{TenantConfig, TriggerSpec};
use netbill_core::port::id_provider::UuidProvider;
use netbill_core::port::time_provider::mocks::FixedTimeProvider;
use netbill_core::port::{IdProvider, RateLimiter, TimeProvider};
use netbill_infra_sqlite::{
    create_pool, run_migrations, SqliteBillingRepository, SqliteJobRunStore,
    SqliteNotificationQueue, SqlitePayrollRepository, SqliteTenantConfigRepository,
};
use netbill_infra_transport::HttpTransportFactory;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Wall-clock time in Karachi as UTC
pub fn pkt(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Karachi
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub async fn migrated_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Database file shared by a multi-connection pool; the directory lives as long as the guard
pub async fn file_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("netbill.db").display());
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (dir, pool)
}

pub struct Harness {
    pub pool: SqlitePool,
    pub time: Arc<FixedTimeProvider>,
    pub scheduler: Arc<JobScheduler>,
    pub notifications: Arc<NotificationService>,
    pub outbox: Arc<SqliteNotificationQueue>,
    pub tenants: Arc<SqliteTenantConfigRepository>,
    pub run_store: Arc<SqliteJobRunStore>,
}

impl Harness {
    pub async fn new(now: DateTime<Utc>, cycle: BillingCycle) -> Self {
        Self::with_pool(migrated_pool().await, now, cycle, Duration::from_millis(10))
    }

    /// Every job registered with the production default triggers
    pub fn with_pool(
        pool: SqlitePool,
        now: DateTime<Utc>,
        cycle: BillingCycle,
        tick_interval: Duration,
    ) -> Self {
        let time = Arc::new(FixedTimeProvider::new(now));
        let time_provider: Arc<dyn TimeProvider> = time.clone();
        let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);
        let clock = Clock::new(time_provider.clone(), Karachi);

        let tenants = Arc::new(SqliteTenantConfigRepository::new(pool.clone()));
        let billing = Arc::new(SqliteBillingRepository::new(pool.clone()));
        let payroll = Arc::new(SqlitePayrollRepository::new(pool.clone()));
        let outbox = Arc::new(SqliteNotificationQueue::new(pool.clone()));
        let run_store = Arc::new(SqliteJobRunStore::new(pool.clone()));
        let limiter: Arc<dyn RateLimiter> = outbox.clone();
        let notifications = Arc::new(NotificationService::new(
            outbox.clone(),
            id_provider.clone(),
            time_provider.clone(),
        ));
        let transports = Arc::new(HttpTransportFactory::new(Duration::from_secs(5)).unwrap());

        let scheduler = Arc::new(JobScheduler::new(
            clock,
            SchedulerConfig {
                tick_interval,
                worker_pool_size: 4,
            },
            run_store.clone(),
        ));

        scheduler
            .register(
                jobs::INVOICE_GENERATION,
                TriggerSpec::monthly(25, 1, 0),
                Arc::new(InvoiceGenerationJob::new(
                    billing.clone(),
                    billing.clone(),
                    tenants.clone(),
                    notifications.clone(),
                    id_provider.clone(),
                    time_provider.clone(),
                    cycle,
                )),
            )
            .unwrap();
        scheduler
            .register(
                jobs::SALARY_ACCRUAL,
                TriggerSpec::monthly(1, 0, 1),
                Arc::new(SalaryAccrualJob::new(
                    payroll.clone(),
                    payroll,
                    id_provider,
                    time_provider.clone(),
                )),
            )
            .unwrap();
        scheduler
            .register(
                jobs::DISPATCH,
                TriggerSpec::daily(20, 14),
                Arc::new(DispatchJob::new(
                    tenants.clone(),
                    outbox.clone(),
                    limiter.clone(),
                    outbox.clone(),
                    transports,
                    time_provider,
                )),
            )
            .unwrap();
        scheduler
            .register(
                jobs::DEADLINE_ALERTS,
                TriggerSpec::daily(9, 0),
                Arc::new(DeadlineAlertJob::new(
                    tenants.clone(),
                    billing,
                    notifications.clone(),
                )),
            )
            .unwrap();
        scheduler
            .register(
                jobs::QUOTA_RESET,
                TriggerSpec::daily(0, 0),
                Arc::new(QuotaResetJob::new(limiter)),
            )
            .unwrap();

        Self {
            pool,
            time,
            scheduler,
            notifications,
            outbox,
            tenants,
            run_store,
        }
    }

    pub fn set_now(&self, at: DateTime<Utc>) {
        self.time.set(at);
    }

    /// Fire `job_id` now and return its summary, panicking on any other outcome
    pub async fn run(&self, job_id: &str) -> JobSummary {
        match self.scheduler.run_now(job_id).await.unwrap() {
            RunOutcome::Completed { summary } => summary,
            other => panic!("{} did not complete: {:?}", job_id, other),
        }
    }

    pub async fn seed_tenant(&self, config: TenantConfig) {
        self.tenants.upsert(&config).await.unwrap();
    }

    pub async fn seed_plan(&self, id: &str, price: &str) {
        sqlx::query("INSERT INTO service_plans (id, name, price) VALUES (?, ?, ?)")
            .bind(id)
            .bind(format!("Plan {}", id))
            .bind(price)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn seed_customer(
        &self,
        id: &str,
        tenant_id: &str,
        plan_id: &str,
        anchor_day: u32,
        discount: Option<&str>,
    ) {
        sqlx::query(
            "INSERT INTO customers \
             (id, tenant_id, first_name, phone, service_plan_id, anchor_day, discount_amount) \
             VALUES (?, ?, 'Ali', ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(format!("+92-{}", id))
        .bind(plan_id)
        .bind(i64::from(anchor_day))
        .bind(discount)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn seed_employee(&self, id: &str, role: &str, salary: Option<&str>) {
        sqlx::query(
            "INSERT INTO employees (id, tenant_id, first_name, role, salary) \
             VALUES (?, 't1', 'Sara', ?, ?)",
        )
        .bind(id)
        .bind(role)
        .bind(salary)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }
}

/// Tenant with every automation switched on and the given endpoint
pub fn tenant(tenant_id: &str, daily_limit: u32, api_base_url: Option<String>) -> TenantConfig {
    let mut config = TenantConfig::new(tenant_id);
    config.auto_send_invoices = true;
    config.auto_send_deadline_alerts = true;
    config.daily_send_limit = daily_limit;
    config.api_base_url = api_base_url;
    config.api_token = Some("token".to_string());
    config
}
