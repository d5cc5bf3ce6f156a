//! JSON-RPC API Layer
//!
//! Localhost admin surface for the netbill scheduler: job inspection,
//! manual runs, quota lookups and ad-hoc notification enqueue.

pub mod error;
pub mod handler;
pub mod server;
pub mod throttle;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
