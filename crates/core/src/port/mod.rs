// Port Layer - Interfaces for external dependencies

pub mod billing_repository;
pub mod id_provider; // For deterministic testing
pub mod job_run_store;
pub mod notification_queue;
pub mod payroll_repository;
pub mod tenant_repository;
pub mod time_provider;
pub mod transaction;
pub mod transport;

// Re-exports
pub use billing_repository::{CustomerRepository, InvoiceRepository};
pub use id_provider::IdProvider;
pub use job_run_store::JobRunStore;
pub use notification_queue::{EnqueueOutcome, NotificationQueue, RateLimiter};
pub use payroll_repository::{EmployeeRepository, LedgerRepository};
pub use tenant_repository::TenantConfigRepository;
pub use time_provider::TimeProvider;
pub use transaction::{DeliveryTransaction, Transaction, TransactionalDelivery};
pub use transport::{DeliveryOutcome, MessageTransport, MessageTransportFactory, TransportError};
