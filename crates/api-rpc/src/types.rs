//! RPC Request/Response Types

use chrono::{DateTime, NaiveDate, Utc};
use netbill_core::application::RunOutcome;
use netbill_core::domain::{JobState, ScheduledJob, TriggerSpec};
use serde::{Deserialize, Serialize};

/// admin.jobs.v1 - List registered jobs
#[derive(Debug, Default, Deserialize)]
pub struct JobsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub job_id: String,
    /// Cron-like rendering, e.g. "14 20 * * *"
    pub schedule: String,
    pub trigger: TriggerSpec,
    pub state: JobState,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl From<ScheduledJob> for JobInfo {
    fn from(job: ScheduledJob) -> Self {
        Self {
            schedule: job.trigger.to_string(),
            job_id: job.id,
            trigger: job.trigger,
            state: job.state,
            last_run: job.last_run,
            next_run: job.next_run,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobInfo>,
}

/// admin.run_job.v1 - Fire a job immediately and wait for it
#[derive(Debug, Deserialize)]
pub struct RunJobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunJobResponse {
    pub job_id: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// admin.quota.v1 - Daily send quota of a tenant
#[derive(Debug, Deserialize)]
pub struct QuotaRequest {
    pub tenant_id: String,
    /// Defaults to today in the scheduler timezone
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaResponse {
    pub tenant_id: String,
    pub date: NaiveDate,
    pub sent_count: u32,
    pub daily_limit: u32,
    pub remaining: u32,
}

/// notifications.enqueue.v1 takes a `NewNotification` as params
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResponse {
    pub message_id: Option<String>,
    pub duplicate: bool,
}
