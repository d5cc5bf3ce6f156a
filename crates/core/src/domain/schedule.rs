// Scheduled Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::trigger::TriggerSpec;

/// Job identifier (stable name, e.g. "invoice_generation")
pub type JobId = String;

/// Lifecycle of a registered job
///
/// `Idle -> Running -> Idle`, `Idle -> Disabled` on shutdown. Disabled is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Idle,
    Running,
    Disabled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "IDLE"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// Registry entry owned by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub trigger: TriggerSpec,
    pub state: JobState,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    pub fn new(id: impl Into<String>, trigger: TriggerSpec) -> Self {
        Self {
            id: id.into(),
            trigger,
            state: JobState::Idle,
            last_run: None,
            next_run: None,
        }
    }

    /// Transition to Running
    pub fn begin(&mut self) -> Result<()> {
        if self.state != JobState::Idle {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        Ok(())
    }

    /// Transition back to Idle after an execution, recording when it fired
    ///
    /// A job disabled while running stays Disabled.
    pub fn finish(&mut self, fired_at: DateTime<Utc>) {
        self.last_run = Some(fired_at);
        if self.state == JobState::Running {
            self.state = JobState::Idle;
        }
    }

    /// Transition to the terminal Disabled state
    pub fn disable(&mut self) {
        self.state = JobState::Disabled;
        self.next_run = None;
    }

    pub fn is_disabled(&self) -> bool {
        self.state == JobState::Disabled
    }

    /// True when the scheduled fire time has passed
    ///
    /// A Running job can be due; the scheduler then skips that fire.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state != JobState::Disabled && self.next_run.is_some_and(|next| next <= now)
    }
}
