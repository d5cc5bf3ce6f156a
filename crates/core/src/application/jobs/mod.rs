//! Recurring jobs
//!
//! Every job iterates its targets one by one. A failing target is logged and
//! counted; the rest of the batch still runs. Jobs stop between targets once
//! shutdown is requested.

pub mod deadline_alert;
pub mod dispatch;
pub mod invoice_generation;
pub mod quota_reset;
pub mod salary_accrual;

pub use deadline_alert::DeadlineAlertJob;
pub use dispatch::DispatchJob;
pub use invoice_generation::{BillingCycle, InvoiceGenerationJob};
pub use quota_reset::QuotaResetJob;
pub use salary_accrual::SalaryAccrualJob;

use serde::Serialize;

/// Stable job ids used for registration and the admin surface
pub const INVOICE_GENERATION: &str = "invoice_generation";
pub const SALARY_ACCRUAL: &str = "salary_accrual";
pub const DISPATCH: &str = "dispatch";
pub const DEADLINE_ALERTS: &str = "deadline_alerts";
pub const QUOTA_RESET: &str = "quota_reset";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub generated: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Invoice notices enqueued for generated invoices
    pub notices: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccrualSummary {
    pub accrued: u64,
    pub skipped: u64,
    pub errors: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub enqueued: u64,
    pub skipped: u64,
    pub errors: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantDispatch {
    pub tenant_id: String,
    pub sent: u64,
    pub failed: u64,
    /// Quota ran out before or during the batch
    pub quota_exhausted: bool,
    /// Tenant-level failure (no transport, store unavailable)
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub tenants: Vec<TenantDispatch>,
    pub interrupted: bool,
}

impl DispatchSummary {
    pub fn sent(&self) -> u64 {
        self.tenants.iter().map(|t| t.sent).sum()
    }

    pub fn failed(&self) -> u64 {
        self.tenants.iter().map(|t| t.failed).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotaResetSummary {
    pub tenants_reset: u64,
}
