// Scheduler defaults, overridable through daemon settings
use std::time::Duration;

/// How often the tick loop evaluates triggers (1s)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Jobs allowed to execute at the same time
pub const DEFAULT_WORKER_POOL_SIZE: usize = 4;

/// Grace period for in-flight jobs on shutdown (30s)
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
