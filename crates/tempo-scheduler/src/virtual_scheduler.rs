//! The virtual-time scheduler: same core, caller-supplied clock.

use crate::error::Result;
use crate::scheduler::SchedulerCore;
use crate::task::Job;
use crate::time::VirtualTime;
use std::sync::Arc;

/// A scheduler whose clock is owned by the caller instead of the wall
/// clock, for deterministic tests: advance past the N-th recurrence of a
/// task and assert how many times it ran.
///
/// Fire-time stamping and queue positioning use the supplied time, so for
/// a given set of submissions and a given sequence of [`tick`] calls the
/// dispatch order is a pure function of the inputs. `tick` never blocks.
///
/// [`tick`]: VirtualScheduler::tick
pub struct VirtualScheduler {
    core: SchedulerCore,
    time: Arc<VirtualTime>,
}

impl VirtualScheduler {
    /// Create a scheduler whose clock starts at zero.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a scheduler whose clock starts at `now_ms`.
    pub fn starting_at(now_ms: i64) -> Self {
        let time = Arc::new(VirtualTime::new(now_ms));
        Self {
            core: SchedulerCore::new(time.clone()),
            time,
        }
    }

    /// The current virtual time.
    pub fn now_ms(&self) -> i64 {
        self.time.now_ms()
    }

    /// Set the virtual time without dispatching anything.
    pub fn set_time(&self, now_ms: i64) {
        self.time.set_ms(now_ms);
    }

    /// Set the virtual time to `now_ms`, then run every task that is
    /// ready at that time. Returns how many ran.
    pub fn tick(&self, now_ms: i64) -> usize {
        let _in_flight = self.core.enter_tick();
        self.time.set_ms(now_ms);
        self.core.run_ready()
    }

    /// Move the virtual time forward by `delta_ms`, then run every ready
    /// task. Returns how many ran.
    pub fn advance(&self, delta_ms: i64) -> usize {
        let _in_flight = self.core.enter_tick();
        self.time.advance_ms(delta_ms.max(0));
        self.core.run_ready()
    }

    /// Submit a task to run at the current virtual time.
    pub fn execute(&self, job: Job) {
        self.core.execute(job);
    }

    /// Submit a task to run once after `delay_ms` of virtual time.
    pub fn schedule(&self, job: Job, delay_ms: i64) -> Result<()> {
        self.core.schedule(job, delay_ms)
    }

    /// Submit a task that first runs after `initial_delay_ms` and then
    /// again `recurring_delay_ms` after each firing, in virtual time.
    pub fn schedule_with_fixed_delay(
        &self,
        job: Job,
        initial_delay_ms: i64,
        recurring_delay_ms: i64,
    ) -> Result<()> {
        self.core
            .schedule_with_fixed_delay(job, initial_delay_ms, recurring_delay_ms)
    }

    /// Remove the first queued container holding `job`.
    pub fn remove(&self, job: &Job) -> bool {
        self.core.remove(job)
    }

    /// Drop every queued task without running it.
    pub fn clear_tasks(&self) {
        self.core.clear_tasks();
    }

    /// Whether a task is ready at the current virtual time.
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
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}
