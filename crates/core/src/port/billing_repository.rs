// Billing Repository Ports (customers, plans, invoices)

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    Customer, DueInvoice, Invoice, InvoiceDraft, InvoiceType, MonthWindow, ServicePlan,
};
use crate::error::Result;

/// Read access to customers and their service plans
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Active customers whose billing anchor day is one of `anchor_days`
    async fn list_active_customers_with_anchor(&self, anchor_days: &[u32]) -> Result<Vec<Customer>>;

    async fn find_service_plan(&self, plan_id: &str) -> Result<Option<ServicePlan>>;
}

/// Invoice persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Invoice of `invoice_type` whose billing start falls inside `window`
    async fn find_invoice(
        &self,
        customer_id: &str,
        invoice_type: InvoiceType,
        window: MonthWindow,
    ) -> Result<Option<Invoice>>;

    /// Insert unless a subscription invoice already exists for the same
    /// customer and billing month
    ///
    /// Returns None when the insert lost to an existing row.
    async fn create_invoice(&self, draft: &InvoiceDraft) -> Result<Option<Invoice>>;

    /// Active open invoices of `tenant_id` due exactly on `due_date`
    async fn list_open_invoices_due_on(
        &self,
        tenant_id: &str,
        due_date: NaiveDate,
    ) -> Result<Vec<DueInvoice>>;
}
