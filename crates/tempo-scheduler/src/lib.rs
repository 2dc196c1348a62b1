//! Cooperating task schedulers over a shared delay queue
//!
//! This crate is a scheduling substrate: it accepts, orders, dispatches,
//! cancels, and recurs tasks with delays, without owning any threads.
//! Two variants share the core:
//!
//! - [`ManualScheduler`]: a caller drives progress by invoking
//!   [`tick`](ManualScheduler::tick), so tasks run on a thread the caller
//!   owns (a GUI loop, an I/O reactor, a test driver).
//! - [`VirtualScheduler`]: the same core with a caller-controlled clock,
//!   so tests can advance time arbitrarily and deterministically.
//!
//! # Example
//!
//! ```
//! use tempo_scheduler::{job, ManualScheduler, SchedulerConfig};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = ManualScheduler::new(SchedulerConfig::default());
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! let counter_in_job = counter.clone();
//! scheduler.execute(job(move || {
//!     counter_in_job.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! assert_eq!(scheduler.tick(), 1);
//! assert_eq!(counter.load(Ordering::SeqCst), 1);
//! ```
//!
//! # Concurrency model
//!
//! Submissions and removals may come from any thread; exactly one thread
//! drives dispatch via `tick`. A single modification mutex protects the
//! queue and doubles as the condvar for the blocking wait. Scheduler time
//! comes from [`tempo_clock::CachedClock`] (or a [`VirtualTime`]), read
//! through a [`TickClock`] whose freeze brackets pin `now` while queue
//! positions are computed.

pub mod config;
pub mod error;
pub mod queue;
pub mod task;
pub mod time;

mod scheduler;
mod virtual_scheduler;

pub mod prelude;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use queue::DelayQueue;
pub use scheduler::ManualScheduler;
pub use task::{job, Job, TaskContainer, TaskKind};
pub use time::{TickClock, TimeSource, VirtualTime};
pub use virtual_scheduler::VirtualScheduler;
