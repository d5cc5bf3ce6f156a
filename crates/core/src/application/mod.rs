// Application Layer - Use Cases and Recurring Jobs

pub mod clock;
pub mod jobs;
pub mod notification;
pub mod scheduler;

// Re-exports
pub use clock::Clock;
pub use notification::NotificationService;
pub use scheduler::{
    shutdown_channel, JobContext, JobHandler, JobScheduler, JobSummary, RunOutcome,
    SchedulerConfig, ShutdownReport, ShutdownSender, ShutdownToken,
};
