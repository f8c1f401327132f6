//! Async delivery example
//!
//! Moves a slow destination onto a background worker so the logging call
//! returns immediately, and shows the overflow policy at work.
//!
//! Run with: cargo run --example async_logging

use rust_log_pipeline::prelude::*;
use rust_log_pipeline::OverflowPolicy;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Async Delivery Example ===\n");

    let slow = MockWriter::new("slow_collector");
    slow.set_delay(Some(Duration::from_millis(5)));

    let worker = AsyncWriter::builder(slow.clone())
        .capacity(64)
        .overflow_policy(OverflowPolicy::DropOldest)
        .spawn()?;

    let dispatcher = Arc::new(
        Dispatcher::builder()
            .processor(IdMaker::new())
            .processor(LifecycleTokenInjector::new())
            .writer(worker, FilterChain::new(), FluentdFormatter::new())?
            .build(),
    );

    println!("1. Logging from 4 threads:");
    let start = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..100 {
                    let _ = dispatcher.info(
                        "worker {t} event {i}",
                        LogContext::new().with_field("t", t).with_field("i", i),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }
    println!("   400 calls returned in {:?}", start.elapsed());

    println!("\n2. Draining the queue:");
    dispatcher.flush();
    println!("   delivered to the slow collector: {}", slow.len());
    println!("   evicted by the overflow policy: {}", 400 - slow.len());

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
