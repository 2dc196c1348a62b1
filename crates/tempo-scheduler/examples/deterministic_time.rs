//! Virtual-time scheduler example
//!
//! Demonstrates:
//! - Driving the scheduler with a caller-controlled clock
//! - Asserting recurrence counts without sleeping

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempo_scheduler::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tempo_scheduler=debug,deterministic_time=debug")
        .init();

    let scheduler = VirtualScheduler::new();

    let reports = Arc::new(AtomicUsize::new(0));
    let reports_in_job = reports.clone();
    scheduler.schedule_with_fixed_delay(
        job(move || {
            reports_in_job.fetch_add(1, Ordering::SeqCst);
        }),
        0,
        1_000,
    )?;

    // A simulated hour passes in no real time at all.
    let mut ran = scheduler.tick(0);
    for second in 1..=3_600i64 {
        ran += scheduler.tick(second * 1_000);
    }

    println!(
        "dispatched {ran} firings, report count {}",
        reports.load(Ordering::SeqCst)
    );
    assert_eq!(reports.load(Ordering::SeqCst), 3_601);

    Ok(())
}
