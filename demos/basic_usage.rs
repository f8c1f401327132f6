//! Basic pipeline usage example
//!
//! Demonstrates one dispatcher fanning events out to two stdout bindings with
//! different filter chains and formatters.
//!
//! Run with: cargo run --example basic_usage

use rust_log_pipeline::prelude::*;
use rust_log_pipeline::{info, warning};

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Basic Usage Example ===\n");

    let dispatcher = Dispatcher::builder()
        .processor(IdMaker::new())
        .processor(ExceptionBacktrace::new())
        .processor(LifecycleTokenInjector::new())
        // Human-readable lines for everything up to info
        .binding(WriterBinding::named(
            "console",
            Box::new(StreamWriter::stdout()),
            FilterChain::new().with(PriorityFilter::new(Comparison::Le, 6)),
            Box::new(LineFormatter::new()),
        )?)
        // Structured documents only for errors and worse
        .binding(WriterBinding::named(
            "documents",
            Box::new(StreamWriter::stdout()),
            FilterChain::new().with(PriorityFilter::new(Comparison::Le, 3)),
            Box::new(FluentdFormatter::new()),
        )?)
        .build();

    println!("1. Logging at different levels:");
    for level in LogLevel::ALL {
        let context = LogContext::new().with_field("level", level.to_str());
        dispatcher.log(level.to_str(), "This is a {level} message", context)?;
    }

    println!("\n2. Context interpolation and macros:");
    info!(dispatcher, "User {user} logged in", user = "alice", attempt = 1)?;
    warning!(dispatcher, "Disk {mount} at {usage}%", mount = "/var", usage = 91)?;

    println!("\n3. Embedded ids:");
    let id = dispatcher.error("1700000000|Order import failed", LogContext::new())?;
    println!("   event id: {}", id);

    println!("\n4. Invalid level names are rejected:");
    match dispatcher.log("verbose", "never delivered", LogContext::new()) {
        Err(e) => println!("   {}", e),
        Ok(_) => println!("   unexpectedly accepted"),
    }

    dispatcher.flush();
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
