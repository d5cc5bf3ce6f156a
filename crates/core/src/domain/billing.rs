// Billing Domain Model (customers, plans, invoices)

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};
use crate::domain::notification::TenantId;
use crate::domain::period::MonthWindow;

/// Days between billing start and due date
pub const PAYMENT_TERM_DAYS: i64 = 7;

/// Active customer snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub service_plan_id: String,

    /// Billing anchor day-of-month (1-31)
    pub anchor_day: u32,

    pub discount_amount: Option<Decimal>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Subscription,
    OneTime,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Subscription => "subscription",
            InvoiceType::OneTime => "one_time",
        }
    }
}

impl FromStr for InvoiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subscription" => Ok(InvoiceType::Subscription),
            "one_time" => Ok(InvoiceType::OneTime),
            other => Err(DomainError::ValidationError(format!(
                "unknown invoice type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Statuses that still expect a payment
    pub const OPEN: [InvoiceStatus; 3] = [
        InvoiceStatus::Pending,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown invoice status: {}",
                other
            ))),
        }
    }
}

/// Subtotal, discount and total of one invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAmounts {
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub total: Decimal,
}

impl InvoiceAmounts {
    /// Derive amounts from a plan price and a flat discount
    ///
    /// The percentage is clamped to [0, 100]. The total uses the unrounded
    /// percentage; both are rounded to 2 places afterwards.
    pub fn compute(price: Decimal, discount_amount: Option<Decimal>) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        let pct = match discount_amount {
            Some(discount) if !price.is_zero() && !discount.is_zero() => {
                (discount / price * hundred).clamp(Decimal::ZERO, hundred)
            }
            _ => Decimal::ZERO,
        };
        let total = price - price * pct / hundred;

        Self {
            subtotal: price.round_dp(2),
            discount_percentage: pct.round_dp(2),
            total: total.round_dp(2),
        }
    }
}

/// Invoice ready to be inserted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub id: String,
    pub invoice_number: String,
    pub tenant_id: TenantId,
    pub customer_id: String,
    pub billing_start: NaiveDate,
    pub billing_end: NaiveDate,
    pub due_date: NaiveDate,
    pub amounts: InvoiceAmounts,
    pub invoice_type: InvoiceType,
    pub notes: String,
    pub created_at: i64,
}

impl InvoiceDraft {
    /// Subscription invoice for `customer` covering the anchor period inside `target`
    pub fn subscription(
        id: impl Into<String>,
        created_at: i64,
        customer: &Customer,
        plan: &ServicePlan,
        target: MonthWindow,
    ) -> Self {
        let id = id.into();
        let billing_start = target.clamp_day(customer.anchor_day);
        let billing_end = target.next().clamp_day(customer.anchor_day) - Duration::days(1);

        Self {
            invoice_number: invoice_number(&target, &id),
            id,
            tenant_id: customer.tenant_id.clone(),
            customer_id: customer.id.clone(),
            billing_start,
            billing_end,
            due_date: billing_start + Duration::days(PAYMENT_TERM_DAYS),
            amounts: InvoiceAmounts::compute(plan.price, customer.discount_amount),
            invoice_type: InvoiceType::Subscription,
            notes: format!("Automatically generated invoice for {} plan", plan.name),
            created_at,
        }
    }
}

/// `INV-YYYYMM-XXXXXXXX` from the target month and the first 8 hex digits of the id
pub fn invoice_number(target: &MonthWindow, id: &str) -> String {
    let suffix: String = id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("INV-{}-{}", target.compact(), suffix)
}

/// Persisted invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub tenant_id: TenantId,
    pub customer_id: String,
    pub billing_start: NaiveDate,
    pub billing_end: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub total: Decimal,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub is_active: bool,
}

impl From<InvoiceDraft> for Invoice {
    fn from(draft: InvoiceDraft) -> Self {
        Self {
            id: draft.id,
            invoice_number: draft.invoice_number,
            tenant_id: draft.tenant_id,
            customer_id: draft.customer_id,
            billing_start: draft.billing_start,
            billing_end: draft.billing_end,
            due_date: draft.due_date,
            subtotal: draft.amounts.subtotal,
            discount_percentage: draft.amounts.discount_percentage,
            total: draft.amounts.total,
            invoice_type: draft.invoice_type,
            status: InvoiceStatus::Pending,
            notes: Some(draft.notes),
            is_active: true,
        }
    }
}

impl Invoice {
    /// Text of the notice sent when the invoice is generated
    pub fn notice_text(&self, first_name: &str) -> String {
        format!(
            "Dear {}, your invoice #{} for Rs.{} has been generated. Please pay by {}.",
            first_name,
            self.invoice_number,
            self.total,
            self.due_date.format("%Y-%m-%d")
        )
    }
}

/// Open invoice joined with the contact details needed for an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueInvoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub tenant_id: TenantId,
    pub customer_id: String,
    pub customer_first_name: String,
    pub customer_phone: Option<String>,
    pub total: Decimal,
    pub due_date: NaiveDate,
}

impl DueInvoice {
    pub fn deadline_alert_text(&self) -> String {
        format!(
            "Dear {}, your invoice #{} for Rs.{} is due on {}. Please make payment before the due date.",
            self.customer_first_name,
            self.invoice_number,
            self.total,
            self.due_date.format("%Y-%m-%d")
        )
    }
}

/// Anchor days that bill on `today` under the anchor-day rule
///
/// On the last day of a month, anchors past the month's length are included.
pub fn anchor_days_due(today: NaiveDate) -> Vec<u32> {
    let month = MonthWindow::containing(today);
    if today.day() == month.last_day() {
        (today.day()..=31).collect()
    } else {
        vec![today.day()]
    }
}
