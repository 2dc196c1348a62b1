//! Time sources and the freezable scheduler clock.
//!
//! The scheduler reads time through a [`TickClock`], which wraps a
//! [`TimeSource`] and adds the freeze bracket used while computing queue
//! positions: comparing a freshly stamped fire time against stored fire
//! times is only sound if every `now` observed during the search is the
//! same value, so brackets pin `now_ms()` to a snapshot for their scope.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tempo_clock::CachedClock;

/// Source of the scheduler's current time, in milliseconds.
///
/// The manual scheduler reads the wall clock through [`CachedClock`]; the
/// virtual-time scheduler reads a caller-owned [`VirtualTime`].
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds.
    fn now_ms(&self) -> i64;
}

impl TimeSource for CachedClock {
    fn now_ms(&self) -> i64 {
        // Accurate read: fire times must be stamped against fresh time,
        // and the read republishes the cached value as a side effect.
        self.now_accurate()
    }
}

/// The scheduler's clock: a [`TimeSource`] plus the freeze bracket.
pub struct TickClock {
    source: Arc<dyn TimeSource>,
    freeze_depth: AtomicU32,
    frozen_at_ms: AtomicI64,
}

impl TickClock {
    /// Wrap a time source.
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            source,
            freeze_depth: AtomicU32::new(0),
            frozen_at_ms: AtomicI64::new(0),
        }
    }

    /// Current scheduler time. Inside a freeze bracket this returns the
    /// snapshot captured when the bracket began, regardless of real-time
    /// passage.
    pub fn now_ms(&self) -> i64 {
        if self.freeze_depth.load(Ordering::Acquire) > 0 {
            self.frozen_at_ms.load(Ordering::Acquire)
        } else {
            self.source.now_ms()
        }
    }

    /// Begin a freeze bracket. The returned guard ends the bracket when
    /// dropped, including on unwind.
    ///
    /// Brackets may nest; the snapshot is captured on the outermost
    /// `freeze`. Callers begin brackets only while holding the queue lock,
    /// so at most one bracket is ever being opened at a time.
    pub fn freeze(&self) -> FreezeGuard<'_> {
        // Snapshot before the depth becomes visible so lock-free readers
        // never pair a raised depth with a stale snapshot.
        if self.freeze_depth.load(Ordering::Acquire) == 0 {
            self.frozen_at_ms
                .store(self.source.now_ms(), Ordering::Release);
        }
        self.freeze_depth.fetch_add(1, Ordering::AcqRel);
        FreezeGuard { clock: self }
    }
}

/// Scope guard for a [`TickClock::freeze`] bracket.
pub struct FreezeGuard<'a> {
    clock: &'a TickClock,
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        self.clock.freeze_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A caller-controlled time source for deterministic scheduling.
pub struct VirtualTime {
    now_ms: AtomicI64,
}

impl VirtualTime {
    /// Create a source reading `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// The current virtual time.
    pub fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Acquire)
    }

    /// Set the virtual time. Moving time backward is permitted but gives
    /// no ordering guarantees, matching a wall clock that jumps back.
    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    /// Advance the virtual time by `delta_ms`, returning the new value.
    pub fn advance_ms(&self, delta_ms: i64) -> i64 {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel) + delta_ms
    }
}

impl TimeSource for VirtualTime {
    fn now_ms(&self) -> i64 {
        VirtualTime::now_ms(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virtual_clock(start_ms: i64) -> (Arc<VirtualTime>, TickClock) {
        let time = Arc::new(VirtualTime::new(start_ms));
        let clock = TickClock::new(time.clone());
        (time, clock)
    }

    #[test]
    fn test_unfrozen_clock_follows_source() {
        let (time, clock) = virtual_clock(100);
        assert_eq!(clock.now_ms(), 100);

        time.set_ms(250);
        assert_eq!(clock.now_ms(), 250);
    }

    #[test]
    fn test_freeze_pins_now() {
        let (time, clock) = virtual_clock(100);

        {
            let _frozen = clock.freeze();
            time.set_ms(900);
            assert_eq!(clock.now_ms(), 100);
            assert_eq!(clock.now_ms(), 100);
        }

        assert_eq!(clock.now_ms(), 900);
    }

    #[test]
    fn test_nested_freeze_keeps_outer_snapshot() {
        let (time, clock) = virtual_clock(5);

        let outer = clock.freeze();
        time.set_ms(50);
        {
            let _inner = clock.freeze();
            assert_eq!(clock.now_ms(), 5);
        }
        // Inner guard dropped; still inside the outer bracket.
        assert_eq!(clock.now_ms(), 5);

        drop(outer);
        assert_eq!(clock.now_ms(), 50);
    }

    #[test]
    fn test_freeze_releases_on_panic() {
        let (time, clock) = virtual_clock(1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _frozen = clock.freeze();
            panic!("bracketed region failed");
        }));
        assert!(result.is_err());

        time.set_ms(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_virtual_time_advance() {
        let time = VirtualTime::new(10);
        assert_eq!(time.advance_ms(15), 25);
        assert_eq!(time.now_ms(), 25);
    }
}
