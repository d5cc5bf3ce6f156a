// Deadline alerts for invoices coming due

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::AlertSummary;
use crate::application::notification::NotificationService;
use crate::application::scheduler::{JobContext, JobHandler, JobSummary};
use crate::domain::{DueInvoice, MessageType, NewNotification, TenantConfig};
use crate::error::{AppError, Result};
use crate::port::{EnqueueOutcome, InvoiceRepository, TenantConfigRepository};

pub struct DeadlineAlertJob {
    tenants: Arc<dyn TenantConfigRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    notifications: Arc<NotificationService>,
}

impl DeadlineAlertJob {
    pub fn new(
        tenants: Arc<dyn TenantConfigRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            tenants,
            invoices,
            notifications,
        }
    }

    pub async fn check(&self, ctx: &JobContext) -> Result<AlertSummary> {
        let tenants = self.tenants.list_tenants().await?;
        let mut summary = AlertSummary::default();

        for tenant in tenants.iter().filter(|t| t.auto_send_deadline_alerts) {
            if ctx.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let due_date = ctx.today + Duration::days(i64::from(tenant.deadline_alert_days_before));
            let invoices = match self
                .invoices
                .list_open_invoices_due_on(&tenant.tenant_id, due_date)
                .await
            {
                Ok(invoices) => invoices,
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        tenant_id = %tenant.tenant_id,
                        error = %e,
                        "Failed to list due invoices"
                    );
                    continue;
                }
            };

            info!(
                tenant_id = %tenant.tenant_id,
                due_date = %due_date,
                invoices = invoices.len(),
                "Checking deadline alerts"
            );

            for invoice in &invoices {
                if ctx.is_cancelled() {
                    summary.interrupted = true;
                    break;
                }

                match self.alert(tenant, invoice).await {
                    Ok(true) => summary.enqueued += 1,
                    Ok(false) => {
                        summary.skipped += 1;
                        debug!(invoice_number = %invoice.invoice_number, "Alert already queued");
                    }
                    Err(e) => {
                        summary.errors += 1;
                        error!(
                            invoice_id = %invoice.invoice_id,
                            error = %e,
                            "Failed to enqueue deadline alert"
                        );
                    }
                }
            }
        }

        info!(
            job_id = %ctx.job_id,
            enqueued = summary.enqueued,
            skipped = summary.skipped,
            errors = summary.errors,
            "Deadline alerts finished"
        );
        Ok(summary)
    }

    /// Returns false when an alert for the invoice already exists
    async fn alert(&self, tenant: &TenantConfig, invoice: &DueInvoice) -> Result<bool> {
        if self
            .notifications
            .queue()
            .exists_for_invoice(&invoice.invoice_id, MessageType::DeadlineAlert)
            .await?
        {
            return Ok(false);
        }

        let phone = invoice
            .customer_phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "customer {} has no phone number",
                    invoice.customer_id
                ))
            })?;

        let req = NewNotification::text(
            tenant.tenant_id.clone(),
            phone,
            invoice.deadline_alert_text(),
            MessageType::DeadlineAlert,
            tenant.default_alert_priority,
        )
        .for_invoice(invoice.invoice_id.clone())
        .for_customer(invoice.customer_id.clone());

        Ok(matches!(
            self.notifications.enqueue(req).await?,
            EnqueueOutcome::Enqueued(_)
        ))
    }
}

#[async_trait]
impl JobHandler for DeadlineAlertJob {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary> {
        self.check(&ctx).await.map(JobSummary::DeadlineAlerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::shutdown_channel;
    use crate::port::billing_repository::MockInvoiceRepository;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::notification_queue::mocks::InMemoryOutbox;
    use crate::port::tenant_repository::mocks::StaticTenants;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn due(id: &str, phone: Option<&str>) -> DueInvoice {
        DueInvoice {
            invoice_id: id.to_string(),
            invoice_number: format!("INV-202603-{}", id.to_uppercase()),
            tenant_id: "t1".to_string(),
            customer_id: format!("cust-{}", id),
            customer_first_name: "Hina".to_string(),
            customer_phone: phone.map(str::to_string),
            total: Decimal::from(900),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 13).unwrap(),
        }
    }

    fn ctx() -> JobContext {
        let (_tx, shutdown) = shutdown_channel();
        JobContext {
            job_id: "deadline_alerts".to_string(),
            fired_at: Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap(),
            today: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            shutdown,
        }
    }

    fn job(
        invoices: MockInvoiceRepository,
        outbox: InMemoryOutbox,
        tenants: Vec<TenantConfig>,
    ) -> DeadlineAlertJob {
        let notifications = Arc::new(NotificationService::new(
            Arc::new(outbox),
            Arc::new(SequentialIdProvider::default()),
            Arc::new(FixedTimeProvider::new(
                Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap(),
            )),
        ));
        DeadlineAlertJob::new(Arc::new(StaticTenants(tenants)), Arc::new(invoices), notifications)
    }

    fn alerting_tenant() -> TenantConfig {
        TenantConfig {
            auto_send_deadline_alerts: true,
            deadline_alert_days_before: 3,
            default_alert_priority: 20,
            ..TenantConfig::new("t1")
        }
    }

    #[tokio::test]
    async fn test_enqueues_once_per_invoice() {
        let mut invoices = MockInvoiceRepository::new();
        invoices
            .expect_list_open_invoices_due_on()
            .returning(|tenant, date| {
                assert_eq!(tenant, "t1");
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 13).unwrap());
                Ok(vec![due("a1", Some("+92301")), due("b2", Some("+92302"))])
            });

        let outbox = InMemoryOutbox::new();
        let job = job(invoices, outbox.clone(), vec![alerting_tenant()]);

        let first = job.check(&ctx()).await.unwrap();
        assert_eq!(first.enqueued, 2);

        let second = job.check(&ctx()).await.unwrap();
        assert_eq!(second.enqueued, 0);
        assert_eq!(second.skipped, 2);

        let messages = outbox.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].priority, 20);
        assert_eq!(
            messages[0].content,
            "Dear Hina, your invoice #INV-202603-A1 for Rs.900 is due on 2026-03-13. Please make payment before the due date."
        );
    }

    #[tokio::test]
    async fn test_missing_phone_is_an_error() {
        let mut invoices = MockInvoiceRepository::new();
        invoices
            .expect_list_open_invoices_due_on()
            .returning(|_, _| Ok(vec![due("a1", None), due("b2", Some("+92302"))]));

        let job = job(invoices, InMemoryOutbox::new(), vec![alerting_tenant()]);
        let summary = job.check(&ctx()).await.unwrap();
        assert_eq!(summary.enqueued, 1);
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn test_tenants_without_alerts_are_ignored() {
        let mut invoices = MockInvoiceRepository::new();
        invoices.expect_list_open_invoices_due_on().never();

        let job = job(invoices, InMemoryOutbox::new(), vec![TenantConfig::new("quiet")]);
        let summary = job.check(&ctx()).await.unwrap();
        assert_eq!(summary, AlertSummary::default());
    }
}
