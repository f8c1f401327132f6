//! Configuration-driven pipeline example
//!
//! Builds the stock seven-destination pipeline from environment settings.
//! Destinations whose settings are missing are skipped with a warning on
//! stderr, so this runs with no environment at all.
//!
//! Run with: LOG_DB_PATH=/tmp/alerts.db cargo run --example config_pipeline

use rust_log_pipeline::prelude::*;
use rust_log_pipeline::{build_dispatcher, PipelineConfig, Settings};

fn main() -> Result<()> {
    println!("=== Rust Log Pipeline - Configuration Example ===\n");

    let settings = Settings::from_env()?;
    let config = PipelineConfig::default_for(&settings);
    let dispatcher = build_dispatcher(&config, &settings)?;

    println!("1. Active bindings:");
    for binding in dispatcher.bindings() {
        println!("   {:<20} filters: {:?}", binding.name(), binding.filters().names());
    }

    println!("\n2. Ordinary events:");
    dispatcher.info("Service started", LogContext::new())?;
    dispatcher.error("Upstream {name} timed out", LogContext::new().with_field("name", "billing"))?;

    println!("\n3. Metric events (routed to collectors only):");
    dispatcher.warning(
        "METRICS_GAUGE",
        LogContext::new().with_field("metricId", "queue_depth").with_field("value", 17),
    )?;
    dispatcher.warning(
        "METRICS_COUNTER",
        LogContext::new().with_field("metricId", "orders_total").with_field("value", 1),
    )?;

    println!("\n4. Rate-limited alert (stored once per day):");
    for _ in 0..3 {
        dispatcher.critical(
            "SMS_ALERT primary database unreachable",
            LogContext::new().with_field("number", "+15550100"),
        )?;
    }

    dispatcher.flush();
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
