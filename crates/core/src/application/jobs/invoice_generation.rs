//! Invoice generation
//!
//! Creates one subscription invoice per customer per billing month. Two rules
//! pick the target month and the candidates:
//! - `AdvanceMonth`: bill every anchored customer for the month after today
//!   (runs once a month, ahead of the period).
//! - `AnchorDay`: bill customers whose anchor day is today for the current month
//!   (runs daily).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::InvoiceSummary;
use crate::application::notification::NotificationService;
use crate::application::scheduler::{JobContext, JobHandler, JobSummary};
use crate::domain::billing::anchor_days_due;
use crate::domain::{
    Customer, Invoice, InvoiceDraft, InvoiceType, MessageType, MonthWindow, NewNotification,
    TenantConfig,
};
use crate::error::{AppError, Result};
use crate::port::{
    CustomerRepository, EnqueueOutcome, IdProvider, InvoiceRepository, TenantConfigRepository,
    TimeProvider,
};

const INVOICE_NUMBER_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    AdvanceMonth,
    AnchorDay,
}

impl FromStr for BillingCycle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "advance_month" => Ok(BillingCycle::AdvanceMonth),
            "anchor_day" => Ok(BillingCycle::AnchorDay),
            other => Err(AppError::Config(format!("unknown billing cycle: {}", other))),
        }
    }
}

pub struct InvoiceGenerationJob {
    customers: Arc<dyn CustomerRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    tenants: Arc<dyn TenantConfigRepository>,
    notifications: Arc<NotificationService>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    cycle: BillingCycle,
}

enum Billed {
    Created(Invoice),
    AlreadyBilled,
}

impl InvoiceGenerationJob {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        tenants: Arc<dyn TenantConfigRepository>,
        notifications: Arc<NotificationService>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        cycle: BillingCycle,
    ) -> Self {
        Self {
            customers,
            invoices,
            tenants,
            notifications,
            id_provider,
            time_provider,
            cycle,
        }
    }

    pub async fn generate(&self, ctx: &JobContext) -> Result<InvoiceSummary> {
        let current = MonthWindow::containing(ctx.today);
        let (target, anchors): (MonthWindow, Vec<u32>) = match self.cycle {
            BillingCycle::AdvanceMonth => (current.next(), (1..=31).collect()),
            BillingCycle::AnchorDay => (current, anchor_days_due(ctx.today)),
        };

        let customers = self.customers.list_active_customers_with_anchor(&anchors).await?;
        let tenants: HashMap<String, TenantConfig> = self
            .tenants
            .list_tenants()
            .await?
            .into_iter()
            .map(|t| (t.tenant_id.clone(), t))
            .collect();

        info!(
            job_id = %ctx.job_id,
            target_month = %target,
            cycle = ?self.cycle,
            candidates = customers.len(),
            "Generating invoices"
        );

        let mut summary = InvoiceSummary::default();
        for customer in &customers {
            if ctx.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            match self.bill_customer(customer, target).await {
                Ok(Billed::Created(invoice)) => {
                    summary.generated += 1;
                    info!(
                        customer_id = %customer.id,
                        invoice_number = %invoice.invoice_number,
                        total = %invoice.total,
                        "Invoice generated"
                    );
                    if let Some(tenant) = tenants.get(&customer.tenant_id) {
                        if self.send_notice(tenant, customer, &invoice).await {
                            summary.notices += 1;
                        }
                    }
                }
                Ok(Billed::AlreadyBilled) => {
                    summary.skipped += 1;
                    debug!(
                        customer_id = %customer.id,
                        target_month = %target,
                        "Invoice already exists"
                    );
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(customer_id = %customer.id, error = %e, "Failed to generate invoice");
                }
            }
        }

        info!(
            job_id = %ctx.job_id,
            generated = summary.generated,
            skipped = summary.skipped,
            errors = summary.errors,
            "Invoice generation finished"
        );
        Ok(summary)
    }

    async fn bill_customer(&self, customer: &Customer, target: MonthWindow) -> Result<Billed> {
        let existing = self
            .invoices
            .find_invoice(&customer.id, InvoiceType::Subscription, target)
            .await?;
        if existing.is_some() {
            return Ok(Billed::AlreadyBilled);
        }

        let plan = self
            .customers
            .find_service_plan(&customer.service_plan_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("service plan {}", customer.service_plan_id))
            })?;

        // Invoice numbers carry 32 random bits; a collision gets a fresh id
        for attempt in 1..=INVOICE_NUMBER_ATTEMPTS {
            let draft = InvoiceDraft::subscription(
                self.id_provider.generate_id(),
                self.time_provider.now_millis(),
                customer,
                &plan,
                target,
            );

            // None: a concurrent run inserted the same month meanwhile
            match self.invoices.create_invoice(&draft).await {
                Ok(Some(invoice)) => return Ok(Billed::Created(invoice)),
                Ok(None) => return Ok(Billed::AlreadyBilled),
                Err(AppError::Conflict(reason)) => warn!(
                    customer_id = %customer.id,
                    invoice_number = %draft.invoice_number,
                    attempt,
                    reason = %reason,
                    "Invoice number taken, retrying with a new id"
                ),
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "no free invoice number for customer {} after {} attempts",
            customer.id, INVOICE_NUMBER_ATTEMPTS
        )))
    }

    /// Queue the invoice notice; failures never undo the invoice
    async fn send_notice(
        &self,
        tenant: &TenantConfig,
        customer: &Customer,
        invoice: &Invoice,
    ) -> bool {
        if !tenant.auto_send_invoices {
            return false;
        }
        let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            debug!(customer_id = %customer.id, "No phone number, invoice notice not sent");
            return false;
        };

        let req = NewNotification::text(
            tenant.tenant_id.clone(),
            phone,
            invoice.notice_text(&customer.first_name),
            MessageType::InvoiceNotice,
            tenant.invoice_notice_priority,
        )
        .for_invoice(invoice.id.clone())
        .for_customer(customer.id.clone());

        match self.notifications.enqueue(req).await {
            Ok(EnqueueOutcome::Enqueued(_)) => true,
            Ok(EnqueueOutcome::Duplicate) => false,
            Err(e) => {
                warn!(invoice_id = %invoice.id, error = %e, "Failed to enqueue invoice notice");
                false
            }
        }
    }
}

#[async_trait]
impl JobHandler for InvoiceGenerationJob {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary> {
        self.generate(&ctx).await.map(JobSummary::Invoices)
    }
}
