//! Low-overhead cached millisecond clock
//!
//! Reading the system clock costs a syscall, which adds up fast for code
//! that stamps times in a hot loop. This crate keeps a recently-refreshed
//! "milliseconds since the Unix epoch" value in an atomic, refreshed by an
//! optional background thread on a fixed cadence (default 100 ms).
//!
//! Two reads are exposed:
//! - [`CachedClock::now_cached`] – the last refreshed value, a single
//!   atomic load, wait-free
//! - [`CachedClock::now_accurate`] – reads the system clock, publishes it
//!   as the new cached value, and returns it
//!
//! A process-wide default instance is available through
//! [`CachedClock::global`] for convenience; code that wants an explicit
//! lifecycle constructs its own clock from a [`ClockConfig`].

mod clock;

pub use clock::{CachedClock, ClockConfig, DEFAULT_REFRESH_INTERVAL_MS};
