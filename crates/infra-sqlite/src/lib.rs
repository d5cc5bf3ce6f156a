// netbill Infrastructure - SQLite Adapter
// Implements: billing, payroll and tenant repositories, NotificationQueue,
// RateLimiter, TransactionalDelivery and JobRunStore

mod billing_repository;
mod connection;
mod error;
mod job_run_store;
mod migration;
mod notification_queue;
mod payroll_repository;
mod tenant_repository;
mod transaction;

pub use billing_repository::SqliteBillingRepository;
pub use connection::create_pool;
pub use job_run_store::SqliteJobRunStore;
pub use migration::run_migrations;
pub use notification_queue::SqliteNotificationQueue;
pub use payroll_repository::SqlitePayrollRepository;
pub use tenant_repository::SqliteTenantConfigRepository;
pub use transaction::SqliteDeliveryTransaction;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
