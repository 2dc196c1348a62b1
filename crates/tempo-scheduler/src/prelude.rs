//! Convenience re-exports for common types.

pub use crate::config::SchedulerConfig;
pub use crate::error::{Result, SchedulerError};
pub use crate::scheduler::ManualScheduler;
pub use crate::task::{job, Job, TaskKind};
pub use crate::time::{TimeSource, VirtualTime};
pub use crate::virtual_scheduler::VirtualScheduler;
