//! JobScheduler - fires registered jobs on their triggers
//!
//! - One execution per job id at a time: a fire arriving while the previous
//!   run is still in flight is skipped, never queued.
//! - Distinct jobs run concurrently, bounded by the worker pool.
//! - Handler errors and panics are contained to the run that raised them.

pub mod constants;
mod handler;
mod panic_guard;
mod shutdown;

pub use handler::{JobContext, JobHandler, JobSummary, RunOutcome};
pub use panic_guard::{execute_guarded_async, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::clock::Clock;
use crate::domain::{JobId, JobState, ScheduledJob, TriggerSpec};
use crate::error::{AppError, Result};
use crate::port::JobRunStore;
use constants::*;

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub worker_pool_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
        }
    }
}

/// What `shutdown` observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// In-flight runs that finished inside the grace period
    pub completed: usize,
    /// Runs aborted after the grace period
    pub aborted: usize,
}

struct JobSlot {
    handler: Arc<dyn JobHandler>,
    /// Held for the whole execution
    run_lock: Arc<tokio::sync::Mutex<()>>,
    job: Mutex<ScheduledJob>,
}

impl JobSlot {
    fn job(&self) -> MutexGuard<'_, ScheduledJob> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct JobScheduler {
    clock: Clock,
    config: SchedulerConfig,
    run_store: Arc<dyn JobRunStore>,
    slots: Mutex<BTreeMap<JobId, Arc<JobSlot>>>,
    permits: Arc<Semaphore>,
    started: AtomicBool,
    shutdown_tx: ShutdownSender,
    shutdown_token: ShutdownToken,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    runs: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(clock: Clock, config: SchedulerConfig, run_store: Arc<dyn JobRunStore>) -> Self {
        let (shutdown_tx, shutdown_token) = shutdown_channel();
        let pool_size = config.worker_pool_size.max(1);
        Self {
            clock,
            config,
            run_store,
            slots: Mutex::new(BTreeMap::new()),
            permits: Arc::new(Semaphore::new(pool_size)),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_token,
            tick_task: Mutex::new(None),
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Add a job; only allowed before `start`
    pub fn register(
        &self,
        job_id: impl Into<String>,
        trigger: TriggerSpec,
        handler: Arc<dyn JobHandler>,
    ) -> Result<()> {
        let job_id = job_id.into();
        if self.started.load(Ordering::SeqCst) {
            return Err(AppError::InvalidState(format!(
                "cannot register {} after the scheduler started",
                job_id
            )));
        }
        trigger.validate()?;

        let mut slots = lock(&self.slots);
        if slots.contains_key(&job_id) {
            return Err(AppError::Conflict(format!("job {} already registered", job_id)));
        }

        info!(job_id = %job_id, trigger = %trigger, "Job registered");
        slots.insert(
            job_id.clone(),
            Arc::new(JobSlot {
                handler,
                run_lock: Arc::new(tokio::sync::Mutex::new(())),
                job: Mutex::new(ScheduledJob::new(job_id, trigger)),
            }),
        );
        Ok(())
    }

    /// Restore run markers, compute first fire times and spawn the tick loop
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AppError::InvalidState("scheduler already started".to_string()));
        }

        let markers: BTreeMap<JobId, DateTime<Utc>> = match self.run_store.list().await {
            Ok(markers) => markers.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load job run markers");
                BTreeMap::new()
            }
        };

        let now = self.clock.now();
        for slot in self.slots() {
            let mut job = slot.job();
            job.last_run = markers.get(&job.id).copied();
            job.next_run = self.clock.next_fire(&job.trigger, now);
            info!(
                job_id = %job.id,
                next_run = ?job.next_run,
                last_run = ?job.last_run,
                "Job scheduled"
            );
        }

        let this = Arc::clone(self);
        let shutdown = self.shutdown_token.clone();
        let handle = tokio::spawn(async move { this.tick_loop(shutdown).await });
        *lock(&self.tick_task) = Some(handle);

        info!(
            jobs = self.slots().len(),
            tz = %self.clock.tz(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Snapshots of every registered job
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.slots().iter().map(|slot| slot.job().clone()).collect()
    }

    /// Fire `job_id` now and wait for the outcome
    ///
    /// Follows the same overlap rule as scheduled fires.
    pub async fn run_now(self: &Arc<Self>, job_id: &str) -> Result<RunOutcome> {
        match self.launch_manual(job_id)? {
            Some(rx) => Ok(rx.await.unwrap_or(RunOutcome::Cancelled)),
            None => Ok(RunOutcome::Skipped),
        }
    }

    fn launch_manual(
        self: &Arc<Self>,
        job_id: &str,
    ) -> Result<Option<oneshot::Receiver<RunOutcome>>> {
        if self.shutdown_token.is_shutdown() {
            return Err(AppError::InvalidState("scheduler is shutting down".to_string()));
        }

        let slot = lock(&self.slots)
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;

        if slot.job().is_disabled() {
            return Err(AppError::InvalidState(format!("job {} is disabled", job_id)));
        }

        let (tx, rx) = oneshot::channel();
        if !self.launch(&slot, self.clock.now(), Some(tx)) {
            return Ok(None);
        }
        Ok(Some(rx))
    }

    /// Stop firing, wait up to `grace` for in-flight runs, then abort them
    ///
    /// Every job ends Disabled.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        info!(grace_ms = grace.as_millis() as u64, "Scheduler shutting down");
        self.shutdown_tx.shutdown();

        let tick = lock(&self.tick_task).take();
        if let Some(tick) = tick {
            let _ = tick.await;
        }

        for slot in self.slots() {
            let mut job = slot.job();
            if job.state == JobState::Idle {
                job.disable();
            }
        }

        let runs: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.runs));
        let deadline = tokio::time::Instant::now() + grace;
        let mut report = ShutdownReport::default();

        for mut run in runs {
            if run.is_finished() {
                let _ = run.await;
                continue;
            }
            match tokio::time::timeout_at(deadline, &mut run).await {
                Ok(_) => report.completed += 1,
                Err(_) => {
                    run.abort();
                    let _ = run.await;
                    report.aborted += 1;
                }
            }
        }

        for slot in self.slots() {
            slot.job().disable();
        }

        if report.aborted > 0 {
            warn!(
                completed = report.completed,
                aborted = report.aborted,
                "Jobs aborted after grace period"
            );
        }
        info!(completed = report.completed, "Scheduler stopped");
        report
    }

    fn slots(&self) -> Vec<Arc<JobSlot>> {
        lock(&self.slots).values().cloned().collect()
    }

    async fn tick_loop(self: Arc<Self>, mut shutdown: ShutdownToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.wait() => {
                    debug!("Tick loop interrupted by shutdown");
                    break;
                }
            }
        }
    }

    /// Fire every due job; missed periods collapse into one fire
    fn tick(self: &Arc<Self>) {
        if self.shutdown_token.is_shutdown() {
            return;
        }
        let now = self.clock.now();

        for slot in self.slots() {
            let fire = {
                let mut job = slot.job();
                if !job.is_due(now) {
                    continue;
                }
                job.next_run = self.clock.next_fire(&job.trigger, now);
                job.id.clone()
            };

            if !self.launch(&slot, now, None) {
                warn!(
                    job_id = %fire,
                    fired_at = %now,
                    "Previous execution still running, skipping fire"
                );
            }
        }
    }

    /// Spawn one execution; false when the job is already running or disabled
    fn launch(
        self: &Arc<Self>,
        slot: &Arc<JobSlot>,
        fired_at: DateTime<Utc>,
        reply: Option<oneshot::Sender<RunOutcome>>,
    ) -> bool {
        let Ok(run_guard) = Arc::clone(&slot.run_lock).try_lock_owned() else {
            return false;
        };

        let job_id = {
            let mut job = slot.job();
            if job.begin().is_err() {
                return false;
            }
            job.id.clone()
        };

        let this = Arc::clone(self);
        let slot = Arc::clone(slot);
        let handle = tokio::spawn(async move {
            let outcome = this.execute(&slot, job_id, fired_at, run_guard).await;
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        });

        let mut runs = lock(&self.runs);
        runs.retain(|run| !run.is_finished());
        runs.push(handle);
        true
    }

    async fn execute(
        &self,
        slot: &JobSlot,
        job_id: JobId,
        fired_at: DateTime<Utc>,
        _run_guard: OwnedMutexGuard<()>,
    ) -> RunOutcome {
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            slot.job().finish(fired_at);
            return RunOutcome::Cancelled;
        };

        let ctx = JobContext {
            job_id: job_id.clone(),
            fired_at,
            today: self.clock.date_of(fired_at),
            shutdown: self.shutdown_token.clone(),
        };

        info!(job_id = %job_id, fired_at = %fired_at, "Job started");
        let started = Instant::now();

        let outcome = match execute_guarded_async(slot.handler.run(ctx)).await {
            PanicGuardResult::Success(Ok(summary)) => {
                info!(
                    job_id = %job_id,
                    fired_at = %fired_at,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    summary = ?summary,
                    "Job completed"
                );
                if let Err(e) = self.run_store.record_success(&job_id, fired_at).await {
                    warn!(job_id = %job_id, error = %e, "Failed to persist run marker");
                }
                RunOutcome::Completed { summary }
            }
            PanicGuardResult::Success(Err(e)) => {
                error!(job_id = %job_id, fired_at = %fired_at, error = %e, "Job failed");
                RunOutcome::Failed {
                    error: e.to_string(),
                }
            }
            PanicGuardResult::Panicked(message) => {
                error!(
                    job_id = %job_id,
                    fired_at = %fired_at,
                    panic_msg = %message,
                    "Job panicked"
                );
                RunOutcome::Panicked { message }
            }
        };

        let mut job = slot.job();
        job.finish(fired_at);
        if self.shutdown_token.is_shutdown() {
            job.disable();
        }
        outcome
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::jobs::QuotaResetSummary;
    use crate::port::job_run_store::mocks::InMemoryRunStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Counts runs; optionally parks until released
    struct RecordingHandler {
        runs: AtomicUsize,
        gate: Option<Arc<Notify>>,
        panic: bool,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                runs: AtomicUsize::new(0),
                gate: None,
                panic: false,
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn panicking() -> Self {
            Self {
                panic: true,
                ..Self::new()
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn run(&self, _ctx: JobContext) -> Result<JobSummary> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("handler exploded");
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(JobSummary::QuotaReset(QuotaResetSummary { tenants_reset: 0 }))
        }
    }

    fn scheduler_at(now: DateTime<Utc>) -> (Arc<JobScheduler>, Arc<FixedTimeProvider>) {
        let time = Arc::new(FixedTimeProvider::new(now));
        let clock = Clock::new(time.clone(), chrono_tz::UTC);
        let config = SchedulerConfig {
            tick_interval: Duration::from_millis(10),
            worker_pool_size: 4,
        };
        let scheduler = Arc::new(JobScheduler::new(
            clock,
            config,
            Arc::new(InMemoryRunStore::default()),
        ));
        (scheduler, time)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 8, 59, 0).unwrap()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn state_of(scheduler: &JobScheduler, id: &str) -> JobState {
        scheduler
            .jobs()
            .into_iter()
            .find(|j| j.id == id)
            .map(|j| j.state)
            .unwrap()
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_triggers() {
        let (scheduler, _) = scheduler_at(t0());
        let handler = Arc::new(RecordingHandler::new());

        scheduler
            .register("dispatch", TriggerSpec::daily(9, 0), handler.clone())
            .unwrap();
        assert!(matches!(
            scheduler.register("dispatch", TriggerSpec::daily(10, 0), handler.clone()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            scheduler.register("broken", TriggerSpec::daily(25, 0), handler),
            Err(AppError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn test_register_after_start_fails() {
        let (scheduler, _) = scheduler_at(t0());
        scheduler.start().await.unwrap();
        let result =
            scheduler.register("late", TriggerSpec::daily(9, 0), Arc::new(RecordingHandler::new()));
        assert!(matches!(result, Err(AppError::InvalidState(_))));
        assert!(scheduler.start().await.is_err(), "second start must fail");
        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_fires_when_trigger_time_passes() {
        let (scheduler, time) = scheduler_at(t0());
        let handler = Arc::new(RecordingHandler::new());
        scheduler
            .register("deadline_alerts", TriggerSpec::daily(9, 0), handler.clone())
            .unwrap();
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.runs(), 0, "not due yet");

        time.advance(chrono::Duration::minutes(2));
        wait_until(|| handler.runs() == 1).await;

        // Stays at one fire; next_run moved to tomorrow
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.runs(), 1);
        let job = &scheduler.jobs()[0];
        assert_eq!(
            job.next_run,
            Some(Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap())
        );

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_missed_periods_collapse_into_one_fire() {
        let (scheduler, time) = scheduler_at(t0());
        let handler = Arc::new(RecordingHandler::new());
        scheduler
            .register("quota_reset", TriggerSpec::daily(9, 0), handler.clone())
            .unwrap();
        scheduler.start().await.unwrap();

        // Jump three days ahead
        time.advance(chrono::Duration::days(3));
        wait_until(|| handler.runs() == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.runs(), 1);

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_overlapping_fire_is_skipped() {
        let (scheduler, _) = scheduler_at(t0());
        let gate = Arc::new(Notify::new());
        let handler = Arc::new(RecordingHandler::gated(gate.clone()));
        scheduler
            .register("invoice_generation", TriggerSpec::monthly(25, 1, 0), handler.clone())
            .unwrap();
        scheduler.start().await.unwrap();

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_now("invoice_generation").await })
        };
        wait_until(|| handler.runs() == 1).await;
        assert_eq!(state_of(&scheduler, "invoice_generation"), JobState::Running);

        let second = scheduler.run_now("invoice_generation").await.unwrap();
        assert_eq!(second, RunOutcome::Skipped);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, RunOutcome::Completed { .. }));
        assert_eq!(handler.runs(), 1);
        assert_eq!(state_of(&scheduler, "invoice_generation"), JobState::Idle);

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_distinct_jobs_run_concurrently() {
        let (scheduler, _) = scheduler_at(t0());
        let gate_a = Arc::new(Notify::new());
        let gate_b = Arc::new(Notify::new());
        let a = Arc::new(RecordingHandler::gated(gate_a.clone()));
        let b = Arc::new(RecordingHandler::gated(gate_b.clone()));
        scheduler.register("a", TriggerSpec::daily(9, 0), a.clone()).unwrap();
        scheduler.register("b", TriggerSpec::daily(9, 0), b.clone()).unwrap();
        scheduler.start().await.unwrap();

        let run_a = {
            let s = scheduler.clone();
            tokio::spawn(async move { s.run_now("a").await })
        };
        let run_b = {
            let s = scheduler.clone();
            tokio::spawn(async move { s.run_now("b").await })
        };

        // Both entered their handler while the other is still parked
        wait_until(|| a.runs() == 1 && b.runs() == 1).await;
        assert_eq!(state_of(&scheduler, "a"), JobState::Running);
        assert_eq!(state_of(&scheduler, "b"), JobState::Running);

        gate_a.notify_one();
        gate_b.notify_one();
        assert!(matches!(run_a.await.unwrap().unwrap(), RunOutcome::Completed { .. }));
        assert!(matches!(run_b.await.unwrap().unwrap(), RunOutcome::Completed { .. }));

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let (scheduler, _) = scheduler_at(t0());
        let bad = Arc::new(RecordingHandler::panicking());
        let good = Arc::new(RecordingHandler::new());
        scheduler.register("bad", TriggerSpec::daily(9, 0), bad.clone()).unwrap();
        scheduler.register("good", TriggerSpec::daily(9, 0), good.clone()).unwrap();
        scheduler.start().await.unwrap();

        let outcome = scheduler.run_now("bad").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Panicked {
                message: "handler exploded".to_string()
            }
        );
        assert_eq!(state_of(&scheduler, "bad"), JobState::Idle);

        // Same job and other jobs keep working
        assert!(matches!(scheduler.run_now("bad").await.unwrap(), RunOutcome::Panicked { .. }));
        assert!(matches!(scheduler.run_now("good").await.unwrap(), RunOutcome::Completed { .. }));

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_successful_run_records_marker() {
        let store = Arc::new(InMemoryRunStore::default());
        let time = Arc::new(FixedTimeProvider::new(t0()));
        let scheduler = Arc::new(JobScheduler::new(
            Clock::new(time, chrono_tz::UTC),
            SchedulerConfig::default(),
            store.clone(),
        ));
        scheduler
            .register(
                "salary_accrual",
                TriggerSpec::monthly(1, 0, 1),
                Arc::new(RecordingHandler::new()),
            )
            .unwrap();
        scheduler.start().await.unwrap();

        scheduler.run_now("salary_accrual").await.unwrap();
        assert_eq!(store.last_success("salary_accrual").await.unwrap(), Some(t0()));
        assert_eq!(scheduler.jobs()[0].last_run, Some(t0()));

        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_disabled_trigger_never_fires_but_runs_manually() {
        let (scheduler, time) = scheduler_at(t0());
        let handler = Arc::new(RecordingHandler::new());
        scheduler
            .register("dispatch", TriggerSpec::daily(9, 0).with_enabled(false), handler.clone())
            .unwrap();
        scheduler.start().await.unwrap();

        time.advance(chrono::Duration::hours(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.runs(), 0);
        assert!(scheduler.jobs()[0].next_run.is_none());

        assert!(matches!(
            scheduler.run_now("dispatch").await.unwrap(),
            RunOutcome::Completed { .. }
        ));
        scheduler.shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace_and_disables_all() {
        let (scheduler, _) = scheduler_at(t0());
        let stuck = Arc::new(RecordingHandler::gated(Arc::new(Notify::new())));
        let idle = Arc::new(RecordingHandler::new());
        scheduler.register("stuck", TriggerSpec::daily(9, 0), stuck.clone()).unwrap();
        scheduler.register("idle", TriggerSpec::daily(9, 0), idle).unwrap();
        scheduler.start().await.unwrap();

        let pending = {
            let s = scheduler.clone();
            tokio::spawn(async move { s.run_now("stuck").await })
        };
        wait_until(|| stuck.runs() == 1).await;

        let report = scheduler.shutdown(Duration::from_millis(50)).await;
        assert_eq!(report, ShutdownReport { completed: 0, aborted: 1 });
        assert_eq!(pending.await.unwrap().unwrap(), RunOutcome::Cancelled);

        assert!(scheduler.jobs().iter().all(|j| j.state == JobState::Disabled));
        assert!(matches!(scheduler.run_now("idle").await, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (scheduler, _) = scheduler_at(t0());
        scheduler.start().await.unwrap();
        assert!(matches!(scheduler.run_now("nope").await, Err(AppError::NotFound(_))));
        scheduler.shutdown(Duration::from_millis(100)).await;
    }
}
