//! The manual scheduler: no threads of its own, progressed by `tick`.

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::queue::DelayQueue;
use crate::task::{Job, TaskContainer};
use crate::time::{TickClock, TimeSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempo_clock::CachedClock;
use tracing::{debug, trace};

/// The queue-and-clock core shared by the manual and virtual-time
/// schedulers. Owns dispatch: a ready head is settled by the queue
/// (popped or repositioned) before its job body is invoked, so the job
/// never reaches back into the queue.
pub(crate) struct SchedulerCore {
    queue: DelayQueue,
    clock: TickClock,
    /// Dispatch is single-caller by contract; this flag only backs a
    /// debug assertion, release builds stay lock-light.
    tick_in_flight: AtomicBool,
}

impl SchedulerCore {
    pub(crate) fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            queue: DelayQueue::new(),
            clock: TickClock::new(source),
            tick_in_flight: AtomicBool::new(false),
        }
    }

    pub(crate) fn queue(&self) -> &DelayQueue {
        &self.queue
    }

    pub(crate) fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub(crate) fn execute(&self, job: Job) {
        trace!("submitting immediate task");
        self.queue.insert(TaskContainer::one_shot(job, 0), &self.clock);
    }

    pub(crate) fn schedule(&self, job: Job, delay_ms: i64) -> Result<()> {
        if delay_ms < 0 {
            return Err(SchedulerError::NegativeDelay {
                name: "delay",
                millis: delay_ms,
            });
        }
        trace!(delay_ms, "submitting one-shot task");
        self.queue
            .insert(TaskContainer::one_shot(job, delay_ms), &self.clock);
        Ok(())
    }

    pub(crate) fn schedule_with_fixed_delay(
        &self,
        job: Job,
        initial_delay_ms: i64,
        recurring_delay_ms: i64,
    ) -> Result<()> {
        if initial_delay_ms < 0 {
            return Err(SchedulerError::NegativeDelay {
                name: "initial delay",
                millis: initial_delay_ms,
            });
        }
        if recurring_delay_ms < 0 {
            return Err(SchedulerError::NegativeDelay {
                name: "recurring delay",
                millis: recurring_delay_ms,
            });
        }
        trace!(initial_delay_ms, recurring_delay_ms, "submitting recurring task");
        self.queue.insert(
            TaskContainer::recurring(job, initial_delay_ms, recurring_delay_ms),
            &self.clock,
        );
        Ok(())
    }

    pub(crate) fn remove(&self, job: &Job) -> bool {
        let removed = self.queue.remove(job);
        debug!(removed, "task removal requested");
        removed
    }

    pub(crate) fn clear_tasks(&self) {
        debug!("clearing all queued tasks");
        self.queue.clear();
    }

    pub(crate) fn has_task_ready_to_run(&self) -> bool {
        self.queue.has_ready(&self.clock)
    }

    pub(crate) fn queued_task_count(&self) -> usize {
        self.queue.len()
    }

    /// Run every ready task, settling each container before its body.
    /// A panicking body unwinds out of here with the queue consistent.
    pub(crate) fn run_ready(&self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.queue.claim_ready(&self.clock) {
            ran += 1;
            job();
        }
        if ran > 0 {
            trace!(ran, "dispatched ready tasks");
        }
        ran
    }

    /// Mark a tick in flight for the duration of the returned guard.
    pub(crate) fn enter_tick(&self) -> TickGuard<'_> {
        let was_in_flight = self.tick_in_flight.swap(true, Ordering::AcqRel);
        debug_assert!(!was_in_flight, "tick() must not be called concurrently");
        TickGuard {
            flag: &self.tick_in_flight,
        }
    }
}

pub(crate) struct TickGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A scheduler with no threads of its own.
///
/// Tasks only progress through calls to [`tick`], which runs them on the
/// calling thread. That makes this scheduler a fit for work pinned to an
/// externally-owned thread: a UI event loop, an I/O reactor, or a
/// deterministic test driver. Submissions and removals may come from any
/// thread; exactly one thread drives dispatch.
///
/// [`tick`]: ManualScheduler::tick
pub struct ManualScheduler {
    core: SchedulerCore,
    config: SchedulerConfig,
}

impl ManualScheduler {
    /// Create a scheduler reading time from the process-wide
    /// [`CachedClock`].
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(CachedClock::global().clone(), config)
    }

    /// Create a scheduler reading time from an explicitly-owned clock.
    pub fn with_clock(clock: CachedClock, config: SchedulerConfig) -> Self {
        Self {
            core: SchedulerCore::new(Arc::new(clock)),
            config,
        }
    }

    /// Submit a task to run on the next tick.
    pub fn execute(&self, job: Job) {
        self.core.execute(job);
    }

    /// Submit a task to run once after `delay_ms`.
    pub fn schedule(&self, job: Job, delay_ms: i64) -> Result<()> {
        self.core.schedule(job, delay_ms)
    }

    /// Submit a task that first runs after `initial_delay_ms` and then
    /// again `recurring_delay_ms` after each firing.
    pub fn schedule_with_fixed_delay(
        &self,
        job: Job,
        initial_delay_ms: i64,
        recurring_delay_ms: i64,
    ) -> Result<()> {
        self.core
            .schedule_with_fixed_delay(job, initial_delay_ms, recurring_delay_ms)
    }

    /// Remove the first queued container holding `job` (one-shot or
    /// recurring). After this returns `true` the task will not fire again
    /// through this scheduler.
    pub fn remove(&self, job: &Job) -> bool {
        self.core.remove(job)
    }

    /// Drop every queued task without running it. Does not interrupt a
    /// task currently running inside `tick`, but nothing further runs in
    /// that tick call.
    pub fn clear_tasks(&self) {
        self.core.clear_tasks();
    }

    /// Whether the next [`tick`] is guaranteed to run at least one task.
    ///
    /// [`tick`]: ManualScheduler::tick
    pub fn has_task_ready_to_run(&self) -> bool {
        self.core.has_task_ready_to_run()
    }

    /// Number of tasks currently queued.
    pub fn queued_task_count(&self) -> usize {
        self.core.queued_task_count()
    }

    /// Always false: this scheduler has no lifecycle of its own.
    pub fn is_shutdown(&self) -> bool {
        false
    }

    /// Run every task whose delay has elapsed, on the calling thread, and
    /// return how many ran.
    ///
    /// When the scheduler was configured with
    /// `tick_blocks_until_available`, a tick that finds nothing ready
    /// blocks until a submission or a delay expiry lets at least one task
    /// run; otherwise it returns zero immediately.
    ///
    /// At most one thread may call `tick` at a time. The ready-check and
    /// the dispatch are kept lock-light rather than wrapped in a guard
    /// mutex, so concurrent tick callers are unsupported (and flagged by
    /// a debug assertion).
    ///
    /// A panicking task unwinds out of this call; tasks behind it stay
    /// queued for the next tick. The panicking task itself was already
    /// settled (popped or repositioned), so the scheduler stays usable
    /// and a recurring task fires again at its next interval; wrap the
    /// job if cancel-on-failure is wanted.
    pub fn tick(&self) -> usize {
        let _in_flight = self.core.enter_tick();
        loop {
            let ran = self.core.run_ready();
            if !self.config.tick_blocks_until_available || ran > 0 {
                return ran;
            }
            self.core.queue().wait_for_available(self.core.clock());
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::job;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempo_clock::ClockConfig;

    fn quiet_clock() -> CachedClock {
        CachedClock::new(ClockConfig::new().with_auto_start(false))
    }

    #[test]
    fn test_execute_runs_on_next_tick() {
        let scheduler = ManualScheduler::with_clock(quiet_clock(), SchedulerConfig::default());
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_in_job = ran.clone();
        scheduler.execute(job(move || {
            ran_in_job.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(scheduler.has_task_ready_to_run());
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.tick(), 0);
    }

    #[test]
    fn test_negative_delays_rejected() {
        let scheduler = ManualScheduler::with_clock(quiet_clock(), SchedulerConfig::default());

        assert!(scheduler.schedule(job(|| {}), -1).is_err());
        assert!(scheduler
            .schedule_with_fixed_delay(job(|| {}), -1, 10)
            .is_err());
        assert!(scheduler
            .schedule_with_fixed_delay(job(|| {}), 10, -1)
            .is_err());

        // Rejected submissions leave the queue unmodified.
        assert_eq!(scheduler.queued_task_count(), 0);
    }

    #[test]
    fn test_is_shutdown_always_false() {
        let scheduler = ManualScheduler::with_clock(quiet_clock(), SchedulerConfig::default());
        assert!(!scheduler.is_shutdown());
        scheduler.clear_tasks();
        assert!(!scheduler.is_shutdown());
    }

    #[test]
    fn test_remove_prevents_run() {
        let scheduler = ManualScheduler::with_clock(quiet_clock(), SchedulerConfig::default());
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_in_job = ran.clone();
        let task = job(move || {
            ran_in_job.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.execute(task.clone());

        assert!(scheduler.remove(&task));
        assert!(!scheduler.remove(&task));
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
