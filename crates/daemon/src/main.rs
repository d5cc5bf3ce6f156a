//! netbill scheduler daemon
//!
//! Runs the recurring billing, payroll and notification jobs and serves the
//! localhost admin RPC until Ctrl+C.

mod app;
mod logging;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use tracing::{info, warn};

use netbill_api_rpc::RpcServer;
use netbill_infra_sqlite::{create_pool, run_migrations};

use crate::app::App;
use crate::settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = Settings::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&settings.log)?;

    info!(version = VERSION, tz = %settings.timezone, "netbill scheduler starting");

    // 2. Database
    info!(url = %settings.database.url, "Initializing database");
    let pool = create_pool(&settings.database.url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("migration failed")?;

    // 3. Jobs
    let App {
        scheduler,
        rpc_handler,
    } = App::build(&settings, pool.clone())?;
    scheduler.start().await.context("scheduler start failed")?;

    // 4. Admin RPC
    let rpc_handle = if settings.rpc.enabled {
        let server = RpcServer::new(settings.rpc.server_config(), rpc_handler);
        let (addr, handle) = server.start().await.context("RPC server start failed")?;
        info!(addr = %addr, "Admin RPC listening");
        Some(handle)
    } else {
        info!("Admin RPC disabled");
        None
    };

    info!("System ready. Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // 5. Graceful shutdown: stop intake first, then drain running jobs
    if let Some(handle) = rpc_handle {
        if let Err(e) = handle.stop() {
            warn!(error = %e, "RPC server already stopped");
        }
    }

    let report = scheduler.shutdown(settings.scheduler.shutdown_grace()).await;
    info!(
        completed = report.completed,
        aborted = report.aborted,
        "Scheduler stopped"
    );

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}
