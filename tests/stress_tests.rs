//! Stress tests for concurrent dispatch
//!
//! These tests verify:
//! - Many threads can log through one shared dispatcher
//! - Rate limiting admits exactly one event per signature under contention
//! - Async writers deliver everything with `Block` and count drops otherwise
//! - A panicking writer never takes down its siblings under load

use rust_log_pipeline::filters::RateLimitFilter;
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::writers::MemoryTableSink;
use rust_log_pipeline::{OverflowPolicy, PayloadKind};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const PER_THREAD: usize = 500;

fn spawn_loggers<F>(dispatcher: &Arc<Dispatcher>, body: F) -> Vec<String>
where
    F: Fn(&Dispatcher, usize, usize) -> String + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let dispatcher = Arc::clone(dispatcher);
            let body = Arc::clone(&body);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|i| body(&dispatcher, t, i))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|h| h.join().expect("logging thread panicked"))
        .collect()
}

#[test]
fn test_concurrent_logging_delivers_everything() {
    let sink = MockWriter::new("sink");
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .fallback(FallbackChannel::Silent)
            .processor(IdMaker::new())
            .processor(LifecycleTokenInjector::new())
            .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
            .unwrap()
            .build(),
    );

    let ids = spawn_loggers(&dispatcher, |d, t, i| {
        d.info(
            "thread {t} message {i}",
            LogContext::new().with_field("t", t as i64).with_field("i", i as i64),
        )
        .unwrap()
    });

    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);
    assert_eq!(sink.len(), THREADS * PER_THREAD);
    assert_eq!(
        dispatcher.metrics().delivered_count(),
        (THREADS * PER_THREAD) as u64
    );
}

#[test]
fn test_rate_limit_under_contention() {
    let sink = MockWriter::new("alerts");
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .fallback(FallbackChannel::Silent)
            .writer(
                sink.clone(),
                FilterChain::new().with(RateLimitFilter::new(Duration::from_secs(3600))),
                FluentdFormatter::new(),
            )
            .unwrap()
            .build(),
    );

    spawn_loggers(&dispatcher, |d, _, i| {
        d.alert(&format!("SMS_ALERT node {} down", i % 10), LogContext::new())
            .unwrap()
    });

    // One delivery per distinct signature, however many threads race
    assert_eq!(sink.len(), 10);
}

#[test]
fn test_async_block_policy_loses_nothing() {
    let inner = MockWriter::new("slow");
    inner.set_delay(Some(Duration::from_micros(50)));

    let writer = AsyncWriter::builder(inner.clone())
        .capacity(16)
        .overflow_policy(OverflowPolicy::Block)
        .fallback(FallbackChannel::Silent)
        .spawn()
        .unwrap();
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .fallback(FallbackChannel::Silent)
            .writer(writer, FilterChain::new(), LineFormatter::new())
            .unwrap()
            .build(),
    );

    spawn_loggers(&dispatcher, |d, _, i| {
        d.notice(&format!("payload {}", i), LogContext::new()).unwrap()
    });
    dispatcher.flush();

    assert_eq!(inner.len(), THREADS * PER_THREAD);
}

#[test]
fn test_async_drop_newest_counts_drops() {
    let inner = MockWriter::new("stalled");
    inner.set_delay(Some(Duration::from_millis(2)));

    let writer = AsyncWriter::builder(inner.clone())
        .capacity(4)
        .overflow_policy(OverflowPolicy::DropNewest)
        .fallback(FallbackChannel::Silent)
        .spawn()
        .unwrap();

    for i in 0..200 {
        writer
            .write(&Payload::Line(format!("line {}", i)))
            .unwrap();
    }
    let dropped = writer.dropped_count();
    writer.flush().unwrap();

    assert!(dropped > 0);
    assert_eq!(inner.len() as u64 + dropped, 200);
}

struct Exploding;

impl Writer for Exploding {
    fn write(&self, _payload: &Payload) -> Result<()> {
        panic!("sink exploded");
    }

    fn name(&self) -> &str {
        "exploding"
    }

    fn accepts(&self, _kind: PayloadKind) -> bool {
        true
    }
}

#[test]
fn test_panicking_writer_under_load() {
    let healthy = MockWriter::new("healthy");
    let fallback = FallbackChannel::memory();
    let rows = MemoryTableSink::new();

    let dispatcher = Arc::new(
        Dispatcher::builder()
            .fallback(fallback.clone())
            .writer(Exploding, FilterChain::new(), FluentdFormatter::new())
            .unwrap()
            .writer(healthy.clone(), FilterChain::new(), FluentdFormatter::new())
            .unwrap()
            .writer(
                rust_log_pipeline::writers::DbWriter::new(
                    "events",
                    rust_log_pipeline::writers::ColumnMap::new().field("message", "message"),
                    Arc::new(rows.clone()),
                ),
                FilterChain::new(),
                FluentdFormatter::new(),
            )
            .unwrap()
            .build(),
    );

    spawn_loggers(&dispatcher, |d, _, _| d.error("boom", LogContext::new()).unwrap());

    let total = THREADS * PER_THREAD;
    assert_eq!(healthy.len(), total);
    assert_eq!(rows.len(), total);
    assert_eq!(
        dispatcher.binding("exploding").unwrap().metrics().failed_count(),
        total as u64
    );
    assert_eq!(fallback.messages().len(), total);
}
