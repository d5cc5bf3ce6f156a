// Domain Layer - Pure business logic and entities

pub mod billing;
pub mod error;
pub mod notification;
pub mod payroll;
pub mod period;
pub mod quota;
pub mod schedule;
pub mod tenant;
pub mod trigger;

// Re-exports
pub use billing::{
    Customer, DueInvoice, Invoice, InvoiceAmounts, InvoiceDraft, InvoiceStatus, InvoiceType,
    ServicePlan,
};
pub use error::DomainError;
pub use notification::{
    MediaKind, MessageId, MessageStatus, MessageType, NewNotification, NotificationMessage,
    Priority, TenantId,
};
pub use payroll::{Employee, LedgerEntry, Role, TransactionType};
pub use period::MonthWindow;
pub use quota::RateLimitQuota;
pub use schedule::{JobId, JobState, ScheduledJob};
pub use tenant::TenantConfig;
pub use trigger::TriggerSpec;
