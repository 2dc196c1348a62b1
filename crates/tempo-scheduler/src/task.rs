//! Delayed-task containers.
//!
//! A submission is wrapped in a [`TaskContainer`] carrying the job, the
//! absolute fire time, and a [`TaskKind`] tag. The queue owns containers
//! from insertion until a one-shot pops for its firing or the task is
//! removed; recurring containers stay owned across firings.

use std::sync::Arc;

/// An opaque unit of work: nullary, no return value.
///
/// Task identity is pointer identity: two submissions of the same `Job`
/// value produce two independent containers, and removal matches the first
/// container holding a pointer-equal job. Upstream layers that wrap tasks
/// rely on this relation.
pub type Job = Arc<dyn Fn() + Send + Sync + 'static>;

/// Wrap a closure as a [`Job`].
pub fn job<F>(f: F) -> Job
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fire time of a container that has not been stamped yet.
const UNSTAMPED: i64 = -1;

/// How a container fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs once after `delay_ms`.
    OneShot {
        /// Delay from submission to firing.
        delay_ms: i64,
    },
    /// Runs after `initial_delay_ms`, then every `recurring_delay_ms`
    /// measured from each firing.
    Recurring {
        /// Delay from submission to the first firing.
        initial_delay_ms: i64,
        /// Delay between a firing and the next.
        recurring_delay_ms: i64,
    },
}

/// A job queued for future execution.
pub struct TaskContainer {
    job: Job,
    fire_at_ms: i64,
    kind: TaskKind,
}

impl TaskContainer {
    /// Container for a job that runs once after `delay_ms`.
    pub fn one_shot(job: Job, delay_ms: i64) -> Self {
        Self {
            job,
            fire_at_ms: UNSTAMPED,
            kind: TaskKind::OneShot { delay_ms },
        }
    }

    /// Container for a job that runs repeatedly with a fixed delay
    /// between firings.
    pub fn recurring(job: Job, initial_delay_ms: i64, recurring_delay_ms: i64) -> Self {
        Self {
            job,
            fire_at_ms: UNSTAMPED,
            kind: TaskKind::Recurring {
                initial_delay_ms,
                recurring_delay_ms,
            },
        }
    }

    /// The container's firing behavior.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Absolute fire time in scheduler milliseconds, or `-1` before the
    /// container has been stamped.
    pub fn fire_at_ms(&self) -> i64 {
        self.fire_at_ms
    }

    /// Milliseconds until this container is ready; zero or negative once
    /// the fire time has elapsed.
    pub fn remaining_delay_ms(&self, now_ms: i64) -> i64 {
        self.fire_at_ms - now_ms
    }

    /// Whether the fire time has elapsed.
    pub fn is_ready(&self, now_ms: i64) -> bool {
        self.remaining_delay_ms(now_ms) <= 0
    }

    /// Stamp the first fire time. Must be called exactly once, under the
    /// queue lock, inside a clock-freeze bracket.
    pub(crate) fn stamp_initial(&mut self, now_ms: i64) {
        debug_assert_eq!(self.fire_at_ms, UNSTAMPED, "container stamped twice");
        let initial = match self.kind {
            TaskKind::OneShot { delay_ms } => delay_ms,
            TaskKind::Recurring {
                initial_delay_ms, ..
            } => initial_delay_ms,
        };
        self.fire_at_ms = now_ms + initial;
    }

    /// Move the fire time forward for the next recurrence.
    pub(crate) fn restamp(&mut self, fire_at_ms: i64) {
        self.fire_at_ms = fire_at_ms;
    }

    /// A second handle to the contained job.
    pub(crate) fn job_handle(&self) -> Job {
        Arc::clone(&self.job)
    }

    /// Consume the container, yielding the job.
    pub(crate) fn into_job(self) -> Job {
        self.job
    }

    /// Whether this container holds the given job (pointer identity).
    pub(crate) fn holds_job(&self, job: &Job) -> bool {
        Arc::ptr_eq(&self.job, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_and_remaining_delay() {
        let mut container = TaskContainer::one_shot(job(|| {}), 50);
        assert_eq!(container.fire_at_ms(), -1);

        container.stamp_initial(1_000);
        assert_eq!(container.fire_at_ms(), 1_050);
        assert_eq!(container.remaining_delay_ms(1_000), 50);
        assert!(!container.is_ready(1_049));
        assert!(container.is_ready(1_050));
        assert!(container.is_ready(1_200));
    }

    #[test]
    fn test_recurring_stamps_initial_delay() {
        let mut container = TaskContainer::recurring(job(|| {}), 5, 100);
        container.stamp_initial(200);
        assert_eq!(container.fire_at_ms(), 205);

        container.restamp(305);
        assert_eq!(container.remaining_delay_ms(305), 0);
    }

    #[test]
    fn test_job_identity_is_pointer_identity() {
        let a = job(|| {});
        let b = job(|| {});

        let container = TaskContainer::one_shot(a.clone(), 0);
        assert!(container.holds_job(&a));
        assert!(!container.holds_job(&b));
    }
}
