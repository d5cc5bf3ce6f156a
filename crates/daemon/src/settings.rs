//! Daemon configuration
//!
//! Layered with the `config` crate, later sources win:
//! built-in defaults, then `netbill.toml` (or the file named by
//! `NETBILL_CONFIG`), then `NETBILL__SECTION__KEY` environment variables.

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use netbill_api_rpc::RpcServerConfig;
use netbill_core::application::jobs::{self, BillingCycle};
use netbill_core::application::scheduler::constants::{
    DEFAULT_SHUTDOWN_GRACE, DEFAULT_TICK_INTERVAL, DEFAULT_WORKER_POOL_SIZE,
};
use netbill_core::application::SchedulerConfig;
use netbill_core::domain::TriggerSpec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "NETBILL_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "netbill.toml";
const ENV_PREFIX: &str = "NETBILL";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    /// IANA zone all triggers and "today" are evaluated in
    pub timezone: String,
    pub log: LogSettings,
    pub rpc: RpcSettings,
    pub scheduler: SchedulerSettings,
    pub billing: BillingSettings,
    pub transport: TransportSettings,
    pub jobs: JobTriggers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// EnvFilter directives; `RUST_LOG` takes precedence when set
    pub filter: String,
    /// Daily rolling files are written here when set, stdout otherwise
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl RpcSettings {
    pub fn server_config(&self) -> RpcServerConfig {
        RpcServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub tick_interval_ms: u64,
    pub worker_pool_size: usize,
    pub shutdown_grace_secs: u64,
}

impl SchedulerSettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            worker_pool_size: self.worker_pool_size,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingSettings {
    pub cycle: BillingCycle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    pub timeout_secs: u64,
}

impl TransportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobTriggers {
    pub invoice_generation: TriggerSpec,
    pub salary_accrual: TriggerSpec,
    pub dispatch: TriggerSpec,
    pub deadline_alerts: TriggerSpec,
    pub quota_reset: TriggerSpec,
}

impl JobTriggers {
    /// (job id, trigger) pairs in registration order
    pub fn entries(&self) -> [(&'static str, &TriggerSpec); 5] {
        [
            (jobs::QUOTA_RESET, &self.quota_reset),
            (jobs::DISPATCH, &self.dispatch),
            (jobs::DEADLINE_ALERTS, &self.deadline_alerts),
            (jobs::INVOICE_GENERATION, &self.invoice_generation),
            (jobs::SALARY_ACCRUAL, &self.salary_accrual),
        ]
    }
}

impl Settings {
    /// Defaults, config file, then environment
    pub fn load() -> Result<Self> {
        let (path, required) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let settings = defaults()?
            .add_source(File::from(path.as_path()).required(required))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|e| anyhow!("invalid timezone {:?}: {}", self.timezone, e))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = Config::builder()
        .set_default("database.url", "sqlite://netbill.db")?
        .set_default("timezone", "Asia/Karachi")?
        .set_default("log.format", "pretty")?
        .set_default("log.filter", "netbill=info")?
        .set_default("rpc.enabled", true)?
        .set_default("rpc.host", "127.0.0.1")?
        .set_default("rpc.port", 9527)?
        .set_default(
            "scheduler.tick_interval_ms",
            u64::try_from(DEFAULT_TICK_INTERVAL.as_millis()).unwrap_or(1000),
        )?
        .set_default("scheduler.worker_pool_size", DEFAULT_WORKER_POOL_SIZE as u64)?
        .set_default("scheduler.shutdown_grace_secs", DEFAULT_SHUTDOWN_GRACE.as_secs())?
        .set_default("billing.cycle", "advance_month")?
        .set_default("transport.timeout_secs", 30)?;

    let triggers: [(&str, u32, u32, Option<u32>); 5] = [
        (jobs::DISPATCH, 20, 14, None),
        (jobs::DEADLINE_ALERTS, 9, 0, None),
        (jobs::QUOTA_RESET, 0, 0, None),
        (jobs::INVOICE_GENERATION, 1, 0, Some(25)),
        (jobs::SALARY_ACCRUAL, 0, 1, Some(1)),
    ];

    triggers
        .into_iter()
        .try_fold(
            builder,
            |builder, (job, hour, minute, day)| -> std::result::Result<_, ConfigError> {
                let builder = builder
                    .set_default(format!("jobs.{}.hour", job), hour)?
                    .set_default(format!("jobs.{}.minute", job), minute)?
                    .set_default(format!("jobs.{}.enabled", job), true)?;
                match day {
                    Some(day) => builder.set_default(format!("jobs.{}.day_of_month", job), day),
                    None => Ok(builder),
                }
            },
        )
}
