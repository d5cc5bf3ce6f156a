//! JSON-RPC Server
//!
//! Plain HTTP JSON-RPC 2.0 bound to localhost by default.

use crate::handler::RpcHandler;
use crate::types::{JobsRequest, QuotaRequest, RunJobRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use netbill_core::domain::NewNotification;
use netbill_core::error::{AppError, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Method table
    pub fn module(&self) -> Result<RpcModule<()>> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("admin.jobs.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobsRequest = params.parse().unwrap_or_default();
                    handler.jobs(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.run_job.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RunJobRequest = params.parse()?;
                    handler.run_job(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.quota.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: QuotaRequest = params.parse()?;
                    handler.quota(req).await
                }
            })
            .map_err(register_error)?;

        let handler = self.handler.clone();
        module
            .register_async_method("notifications.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: NewNotification = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(register_error)?;

        Ok(module)
    }

    /// Bind and start serving; returns the bound address and the stop handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let module = self.module()?;

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| {
                AppError::Config(format!("Failed to bind RPC server on {}: {}", addr, e))
            })?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let handle = server.start(module);
        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, handle))
    }
}

fn register_error(err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("RPC method registration failed: {}", err))
}
