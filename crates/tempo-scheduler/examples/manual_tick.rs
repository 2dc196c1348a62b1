//! Manual scheduler example
//!
//! Demonstrates:
//! - Driving a scheduler from a caller-owned loop
//! - One-shot and recurring submissions
//! - Cancelling a recurring task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempo_scheduler::prelude::*;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("tempo_scheduler=debug,manual_tick=debug")
        .init();

    let scheduler = ManualScheduler::new(SchedulerConfig::default());

    scheduler.execute(job(|| {
        println!("[immediate] ran on the first tick");
    }));

    scheduler.schedule(
        job(|| {
            println!("[delayed] ran after 200 ms");
        }),
        200,
    )?;

    let beats = Arc::new(AtomicUsize::new(0));
    let beats_in_job = beats.clone();
    let heartbeat = job(move || {
        let n = beats_in_job.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[heartbeat] beat #{n}");
    });
    scheduler.schedule_with_fixed_delay(heartbeat.clone(), 0, 100)?;

    // The event loop this scheduler piggybacks on.
    for _ in 0..12 {
        let ran = scheduler.tick();
        if ran > 0 {
            println!("tick ran {ran} task(s)");
        }
        thread::sleep(Duration::from_millis(50));
    }

    let cancelled = scheduler.remove(&heartbeat);
    println!(
        "heartbeat cancelled: {cancelled} after {} beats",
        beats.load(Ordering::SeqCst)
    );

    Ok(())
}
