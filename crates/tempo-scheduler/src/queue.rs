//! The ordered delay queue shared by both scheduler variants.
//!
//! Containers are kept sorted ascending by fire time in a ring-buffer
//! deque: the head is popped on every one-shot firing and recurring
//! repositions land near the tail, so end-biased operations dominate and
//! rarely reallocate. A single modification mutex guards all mutation and
//! doubles as the condvar for the blocking-tick wait.
//!
//! Insertion uses a last-equal-wins index: a new entry lands after every
//! existing entry with an equal fire time, preserving submission order
//! among equally-delayed tasks.

use crate::task::{Job, TaskContainer, TaskKind};
use crate::time::TickClock;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Index at which a container with the given fire time is inserted:
/// the first index whose entry fires strictly later (last-equal-wins).
///
/// Also used with a bare target fire time for the recurring reposition
/// path; the repositioning container must not be in `entries`.
pub(crate) fn insertion_end_index(entries: &VecDeque<TaskContainer>, fire_at_ms: i64) -> usize {
    entries.partition_point(|c| c.fire_at_ms() <= fire_at_ms)
}

/// Same index as [`insertion_end_index`], searched linearly from the rear.
/// A just-fired recurring container usually sorts near the tail, so the
/// scan is short.
pub(crate) fn insertion_end_index_from_rear(
    entries: &VecDeque<TaskContainer>,
    fire_at_ms: i64,
) -> usize {
    let mut index = entries.len();
    while index > 0 && entries[index - 1].fire_at_ms() > fire_at_ms {
        index -= 1;
    }
    index
}

/// A concurrency-aware sequence of task containers, sorted by fire time.
pub struct DelayQueue {
    entries: Mutex<VecDeque<TaskContainer>>,
    available: Condvar,
}

impl DelayQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Stamp the container's fire time and insert it at its sorted
    /// position, then wake any blocked tick caller.
    ///
    /// The stamp and the position search happen inside one freeze bracket
    /// so both observe the identical `now`.
    pub fn insert(&self, mut container: TaskContainer, clock: &TickClock) {
        let mut entries = self.entries.lock();
        {
            let _frozen = clock.freeze();
            container.stamp_initial(clock.now_ms());
            let index = insertion_end_index(&entries, container.fire_at_ms());
            entries.insert(index, container);
        }
        self.available.notify_all();
    }

    /// If the head container is ready, settle it (pop a one-shot;
    /// reposition and re-stamp a recurring) and return its job for the
    /// caller to invoke. Returns `None` when nothing is ready.
    ///
    /// The container is settled before the job runs, so a panicking job
    /// leaves the queue consistent: the one-shot is already gone, the
    /// recurring is already queued for its next firing.
    pub fn claim_ready(&self, clock: &TickClock) -> Option<Job> {
        let mut entries = self.entries.lock();
        if !entries.front()?.is_ready(clock.now_ms()) {
            return None;
        }
        let mut container = entries.pop_front()?;

        match container.kind() {
            TaskKind::OneShot { .. } => Some(container.into_job()),
            TaskKind::Recurring {
                recurring_delay_ms, ..
            } => {
                // The popped container is excluded from its own search
                // range. Search and re-stamp share one frozen now.
                let _frozen = clock.freeze();
                let next_fire_ms = clock.now_ms() + recurring_delay_ms;
                let index = insertion_end_index_from_rear(&entries, next_fire_ms);
                container.restamp(next_fire_ms);
                let job = container.job_handle();
                entries.insert(index, container);
                Some(job)
            }
        }
    }

    /// Whether the head container's fire time has elapsed.
    pub fn has_ready(&self, clock: &TickClock) -> bool {
        let entries = self.entries.lock();
        entries
            .front()
            .is_some_and(|c| c.is_ready(clock.now_ms()))
    }

    /// Fire time of the head container, if any.
    pub fn next_fire_at_ms(&self) -> Option<i64> {
        self.entries.lock().front().map(|c| c.fire_at_ms())
    }

    /// Remove the first container holding a pointer-equal job.
    pub fn remove(&self, job: &Job) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|c| c.holds_job(job)) {
            Some(index) => entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Drop every queued container without running it.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of queued containers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Block until a task may be ready: waits indefinitely on an empty
    /// queue, or up to the head's remaining delay otherwise. Returns on
    /// any submission signal, delay expiry, or spurious wake; the caller
    /// re-checks readiness and loops.
    pub fn wait_for_available(&self, clock: &TickClock) {
        let mut entries = self.entries.lock();
        match entries.front() {
            None => {
                self.available.wait(&mut entries);
            }
            Some(head) => {
                let remaining = head.remaining_delay_ms(clock.now_ms());
                if remaining > 0 {
                    self.available
                        .wait_for(&mut entries, Duration::from_millis(remaining as u64));
                }
            }
        }
    }

    /// Fire times of all queued containers, in queue order.
    #[cfg(test)]
    pub(crate) fn fire_times(&self) -> Vec<i64> {
        self.entries.lock().iter().map(|c| c.fire_at_ms()).collect()
    }
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::job;
    use crate::time::VirtualTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn virtual_queue(start_ms: i64) -> (Arc<VirtualTime>, TickClock, DelayQueue) {
        let time = Arc::new(VirtualTime::new(start_ms));
        let clock = TickClock::new(time.clone());
        (time, clock, DelayQueue::new())
    }

    fn container_with_fire_time(fire_at_ms: i64) -> TaskContainer {
        let mut container = TaskContainer::one_shot(job(|| {}), fire_at_ms);
        container.stamp_initial(0);
        container
    }

    #[test]
    fn test_insertion_end_index_orders_by_fire_time() {
        let entries: VecDeque<_> = [10, 20, 30].map(container_with_fire_time).into();

        assert_eq!(insertion_end_index(&entries, 5), 0);
        assert_eq!(insertion_end_index(&entries, 15), 1);
        assert_eq!(insertion_end_index(&entries, 35), 3);
    }

    #[test]
    fn test_insertion_end_index_is_last_equal_wins() {
        let entries: VecDeque<_> = [10, 20, 20, 30].map(container_with_fire_time).into();

        // Equal keys land after the existing equal-keyed run.
        assert_eq!(insertion_end_index(&entries, 20), 3);
        assert_eq!(insertion_end_index(&entries, 10), 1);
    }

    #[test]
    fn test_rear_search_matches_forward_search() {
        let entries: VecDeque<_> = [5, 10, 20, 20, 40].map(container_with_fire_time).into();

        for key in [0, 5, 7, 10, 20, 25, 40, 50] {
            assert_eq!(
                insertion_end_index_from_rear(&entries, key),
                insertion_end_index(&entries, key),
                "searches disagree for key {key}"
            );
        }
    }

    #[test]
    fn test_insert_keeps_queue_sorted() {
        let (_, clock, queue) = virtual_queue(0);

        queue.insert(TaskContainer::one_shot(job(|| {}), 30), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 10), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 20), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 10), &clock);

        assert_eq!(queue.fire_times(), vec![10, 10, 20, 30]);
    }

    #[test]
    fn test_claim_ready_pops_one_shot() {
        let (time, clock, queue) = virtual_queue(0);
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_in_job = ran.clone();
        queue.insert(
            TaskContainer::one_shot(job(move || {
                ran_in_job.fetch_add(1, Ordering::SeqCst);
            }), 10),
            &clock,
        );

        assert!(queue.claim_ready(&clock).is_none());

        time.set_ms(10);
        let claimed = queue.claim_ready(&clock).expect("head should be ready");
        claimed();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_claim_ready_repositions_recurring() {
        let (time, clock, queue) = virtual_queue(0);

        queue.insert(TaskContainer::recurring(job(|| {}), 0, 50), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 30), &clock);

        // Recurring head is ready at 0; claiming re-queues it at now+50,
        // behind the 30 ms one-shot.
        assert!(queue.claim_ready(&clock).is_some());
        assert_eq!(queue.fire_times(), vec![30, 50]);
        assert_eq!(queue.len(), 2);

        // Not ready again until its new fire time.
        assert!(queue.claim_ready(&clock).is_none());
        time.set_ms(50);
        assert!(queue.claim_ready(&clock).is_some());
        assert!(queue.claim_ready(&clock).is_some());
        assert_eq!(queue.fire_times(), vec![100]);
    }

    #[test]
    fn test_remove_matches_pointer_identity_first_container_only() {
        let (_, clock, queue) = virtual_queue(0);

        let target = job(|| {});
        queue.insert(TaskContainer::one_shot(target.clone(), 10), &clock);
        queue.insert(TaskContainer::one_shot(target.clone(), 20), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 30), &clock);

        // Two containers hold the job; each remove takes one.
        assert!(queue.remove(&target));
        assert_eq!(queue.len(), 2);
        assert!(queue.remove(&target));
        assert!(!queue.remove(&target));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let (_, clock, queue) = virtual_queue(0);

        queue.insert(TaskContainer::one_shot(job(|| {}), 0), &clock);
        queue.insert(TaskContainer::recurring(job(|| {}), 0, 10), &clock);
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.claim_ready(&clock).is_none());
    }

    #[test]
    fn test_next_fire_at_follows_head() {
        let (_, clock, queue) = virtual_queue(0);
        assert_eq!(queue.next_fire_at_ms(), None);

        queue.insert(TaskContainer::one_shot(job(|| {}), 40), &clock);
        queue.insert(TaskContainer::one_shot(job(|| {}), 10), &clock);
        assert_eq!(queue.next_fire_at_ms(), Some(10));
    }

    #[test]
    fn test_has_ready_tracks_head() {
        let (time, clock, queue) = virtual_queue(0);
        assert!(!queue.has_ready(&clock));

        queue.insert(TaskContainer::one_shot(job(|| {}), 15), &clock);
        assert!(!queue.has_ready(&clock));

        time.set_ms(15);
        assert!(queue.has_ready(&clock));
    }
}
