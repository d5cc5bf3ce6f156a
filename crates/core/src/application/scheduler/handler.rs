// Job handler contract

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::shutdown::ShutdownToken;
use crate::application::jobs::{
    AccrualSummary, AlertSummary, DispatchSummary, InvoiceSummary, QuotaResetSummary,
};
use crate::domain::JobId;
use crate::error::Result;

/// Per-execution context handed to a handler
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub fired_at: DateTime<Utc>,
    /// `fired_at` as a calendar date in the scheduler timezone
    pub today: NaiveDate,
    pub shutdown: ShutdownToken,
}

impl JobContext {
    /// True once shutdown was requested; batch jobs stop after the current target
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_shutdown()
    }
}

/// Unit of recurring work
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, ctx: JobContext) -> Result<JobSummary>;
}

/// What a completed run reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSummary {
    Invoices(InvoiceSummary),
    Salaries(AccrualSummary),
    Dispatch(DispatchSummary),
    DeadlineAlerts(AlertSummary),
    QuotaReset(QuotaResetSummary),
}

/// Result of one fire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { summary: JobSummary },
    Failed { error: String },
    Panicked { message: String },
    /// Previous execution of the same job was still running
    Skipped,
    /// Aborted by shutdown
    Cancelled,
}
