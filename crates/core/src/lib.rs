// netbill core: billing and payroll rules, the job scheduler and the notification queue
// Storage, HTTP and RPC are reached only through the traits in `port`

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
