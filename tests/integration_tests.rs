//! Integration tests for the log pipeline
//!
//! These tests verify:
//! - Level validation and id derivation through the public logging call
//! - Filter chain composition per destination
//! - Rate limiting on alert destinations
//! - Prometheus registry behaviour when the push gateway is down
//! - Delivery isolation between destinations
//! - Real transports (UDP, JSON lines file, SQLite table)

use rust_log_pipeline::config::{BindingSpec, FilterSpec, FormatterSpec, WriterSpec};
use rust_log_pipeline::filters::{Comparison, PriorityFilter, RateLimitFilter, RegexFilter};
use rust_log_pipeline::formatters::{
    FluentdFormatter, LineFormatter, LogstashFormatter, MetricFormatter, SlackFormatter,
};
use rust_log_pipeline::processors::{
    decode_id, CorrelationScope, ExceptionBacktrace, IdMaker, LifecycleTokenInjector,
};
use rust_log_pipeline::writers::{
    AsyncWriter, ColumnMap, DbWriter, MockWriter, PrometheusOptions, PrometheusWriter,
    SqliteTableSink, StreamWriter, UdpWriter,
};
use rust_log_pipeline::{
    build_dispatcher_with, DeliveryOutcome, Dispatcher, FallbackChannel, FieldValue, FilterChain,
    LogContext, LogLevel, LoggerError, Payload, PipelineConfig, Settings, TimestampFormat,
    WriterState,
};
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn silent() -> rust_log_pipeline::DispatcherBuilder {
    Dispatcher::builder()
        .fallback(FallbackChannel::Silent)
        .processor(IdMaker::new())
        .processor(ExceptionBacktrace::new())
        .processor(LifecycleTokenInjector::new())
}

fn document(payload: &Payload) -> &serde_json::Value {
    match payload {
        Payload::Document(doc) => doc,
        other => panic!("expected a document, got {:?}", other),
    }
}

#[test]
fn test_every_level_name_is_accepted() {
    let dispatcher = silent().build();
    for level in LogLevel::ALL {
        let id = dispatcher
            .log(level.to_str(), "hello", LogContext::new())
            .expect("valid level");
        assert!(!id.is_empty());
    }

    for bad in ["INFO", "Warning", "warn", "fatal", "trace", ""] {
        let err = dispatcher.log(bad, "hello", LogContext::new()).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLevel { .. }), "{}", bad);
    }
}

#[test]
fn test_context_interpolation() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    dispatcher
        .log("info", "user {u} logged in", LogContext::new().with_field("u", "bob"))
        .unwrap();

    let payloads = sink.payloads();
    assert_eq!(document(&payloads[0])["message"], "user bob logged in");
}

#[test]
fn test_containers_are_not_interpolated() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let context = LogContext::new()
        .with_field("items", FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]))
        .with_field("n", 2);
    dispatcher.info("{n} items: {items}", context).unwrap();

    assert_eq!(document(&sink.payloads()[0])["message"], "2 items: {items}");
}

#[test]
fn test_numeric_prefix_seeds_id() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let id = dispatcher.log("info", "1700000000|hello", LogContext::new()).unwrap();
    let (_, seed) = decode_id(&id).unwrap();
    assert_eq!(seed, "1700000000");

    let doc = document(&sink.payloads()[0]).clone();
    assert_eq!(doc["message"], "hello");
}

#[test]
fn test_prefix_remainder_is_verbatim() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let id = dispatcher.log("info", "1||x", LogContext::new()).unwrap();
    let (_, seed) = decode_id(&id).unwrap();
    assert_eq!(seed, "1");
    assert_eq!(document(&sink.payloads()[0])["message"], "|x");
}

#[test]
fn test_date_prefix_seeds_id_with_epoch() {
    let dispatcher = silent().build();
    let id = dispatcher
        .log("info", "2023-01-01T00:00:00|hello", LogContext::new())
        .unwrap();
    let (_, seed) = decode_id(&id).unwrap();
    assert_eq!(seed, "1672531200");
}

#[test]
fn test_bad_date_prefix_is_caller_error() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let err = dispatcher
        .log("info", "not a date|hello", LogContext::new())
        .unwrap_err();
    assert!(matches!(err, LoggerError::InvalidDateFormat { .. }));
    assert!(sink.is_empty());
}

#[test]
fn test_plain_messages_get_distinct_ids() {
    let dispatcher = silent().build();
    let ids: HashSet<String> = (0..10_000)
        .map(|_| dispatcher.log("info", "plain message", LogContext::new()).unwrap())
        .collect();
    assert_eq!(ids.len(), 10_000);
}

#[test]
fn test_priority_filters_per_destination() {
    let slack = MockWriter::new("slack");
    let operational = MockWriter::new("operational");

    let dispatcher = silent()
        .writer(
            slack.clone(),
            FilterChain::new().with(PriorityFilter::new(Comparison::Lt, 4)),
            SlackFormatter::new(),
        )
        .unwrap()
        .writer(
            operational.clone(),
            FilterChain::new().with(PriorityFilter::new(Comparison::Ge, 4)),
            LineFormatter::new(),
        )
        .unwrap()
        .build();

    dispatcher.log("warning", "disk at 85%", LogContext::new()).unwrap();

    assert!(slack.is_empty());
    assert_eq!(operational.len(), 1);
}

#[test]
fn test_rate_limited_alerts_deliver_once() {
    let alerts = MockWriter::new("alerts");
    let dispatcher = silent()
        .writer(
            alerts.clone(),
            FilterChain::new()
                .with(PriorityFilter::new(Comparison::Lt, 7))
                .with(RateLimitFilter::parse("24h").unwrap())
                .with(RegexFilter::new("/^SMS_ALERT/").unwrap()),
            FluentdFormatter::new(),
        )
        .unwrap()
        .build();

    dispatcher.critical("SMS_ALERT payment gateway down", LogContext::new()).unwrap();
    dispatcher.critical("SMS_ALERT payment gateway down", LogContext::new()).unwrap();
    dispatcher.critical("payment gateway down", LogContext::new()).unwrap();

    assert_eq!(alerts.len(), 1);
}

#[test]
fn test_gauge_survives_push_gateway_outage() {
    let gauge = Arc::new(PrometheusWriter::gauge(
        PrometheusOptions::new("127.0.0.1", "checkout-service")
            .with_port(1)
            .with_timeout(Duration::from_millis(300)),
    ));
    let fallback = FallbackChannel::memory();

    struct Shared(Arc<PrometheusWriter>);
    impl rust_log_pipeline::Writer for Shared {
        fn write(&self, payload: &Payload) -> rust_log_pipeline::Result<()> {
            self.0.write(payload)
        }
        fn name(&self) -> &str {
            self.0.name()
        }
        fn accepts(&self, kind: rust_log_pipeline::PayloadKind) -> bool {
            self.0.accepts(kind)
        }
    }

    let dispatcher = silent()
        .fallback(fallback.clone())
        .writer(
            Shared(Arc::clone(&gauge)),
            FilterChain::new().with(RegexFilter::new("^METRICS_GAUGE$").unwrap()),
            MetricFormatter::new(),
        )
        .unwrap()
        .build();

    for value in [3, 8, 21] {
        let id = dispatcher
            .warning(
                "METRICS_GAUGE",
                LogContext::new()
                    .with_field("metricId", "cart_size")
                    .with_field("value", value),
            )
            .expect("push failure never reaches the caller");
        assert!(!id.is_empty());
    }

    assert_eq!(gauge.gauge_value("cart_size"), Some(21.0));
    assert_eq!(gauge.push_failure_count(), 3);
    assert_eq!(fallback.messages().len(), 3);
}

#[test]
fn test_metric_event_without_value_is_skipped() {
    let metrics = MockWriter::new("metrics");
    let dispatcher = silent()
        .writer(metrics.clone(), FilterChain::new(), MetricFormatter::new())
        .unwrap()
        .build();

    let event = dispatcher
        .prepare(
            LogLevel::Warning,
            "METRICS",
            LogContext::new().with_field("metricId", "orders"),
        )
        .unwrap();
    let outcomes = dispatcher.fan_out(&event);

    assert_eq!(outcomes, vec![DeliveryOutcome::Skipped]);
    assert!(metrics.is_empty());
    assert_eq!(dispatcher.metrics().skipped_count(), 1);
}

#[test]
fn test_illegal_metric_name_is_skipped_not_failed() {
    let fallback = FallbackChannel::memory();
    let gauge = PrometheusWriter::gauge(PrometheusOptions::new("127.0.0.1", "svc").with_port(1));
    let dispatcher = silent()
        .fallback(fallback.clone())
        .writer(gauge, FilterChain::new(), MetricFormatter::new())
        .unwrap()
        .build();

    let event = dispatcher
        .prepare(
            LogLevel::Warning,
            "METRICS_GAUGE",
            LogContext::new()
                .with_field("metricId", "bad name")
                .with_field("value", 1),
        )
        .unwrap();

    assert_eq!(dispatcher.fan_out(&event), vec![DeliveryOutcome::Skipped]);
    assert_eq!(dispatcher.metrics().failed_count(), 0);
    assert!(fallback.messages().is_empty());
}

#[test]
fn test_unreachable_sink_does_not_block_others() {
    let fallback = FallbackChannel::memory();
    let down = MockWriter::failing("down");
    let stdout_like = MockWriter::new("stdout");
    let logstash_like = MockWriter::new("logstash");

    let dispatcher = silent()
        .fallback(fallback.clone())
        .writer(down.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .writer(stdout_like.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .writer(
            logstash_like.clone(),
            FilterChain::new(),
            LogstashFormatter::new("logs"),
        )
        .unwrap()
        .build();

    let id = dispatcher.error("db timeout", LogContext::new()).unwrap();
    assert!(!id.is_empty());

    assert_eq!(stdout_like.len(), 1);
    assert_eq!(logstash_like.len(), 1);
    assert_eq!(dispatcher.binding("down").unwrap().metrics().failed_count(), 1);
    assert_eq!(dispatcher.binding("down").unwrap().state(), WriterState::Idle);
    assert!(fallback.messages()[0].contains("down"));
}

#[test]
fn test_slow_async_sink_does_not_delay_caller() {
    let slow = MockWriter::new("slow");
    slow.set_delay(Some(Duration::from_millis(300)));
    let fast = MockWriter::new("fast");

    let dispatcher = silent()
        .writer(
            AsyncWriter::builder(slow.clone())
                .fallback(FallbackChannel::Silent)
                .spawn()
                .unwrap(),
            FilterChain::new(),
            FluentdFormatter::new(),
        )
        .unwrap()
        .writer(fast.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let start = std::time::Instant::now();
    dispatcher.info("fan out", LogContext::new()).unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));
    assert_eq!(fast.len(), 1);

    dispatcher.flush();
    assert_eq!(slow.len(), 1);
}

#[test]
fn test_correlation_tokens() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    dispatcher.info("outside", LogContext::new()).unwrap();
    {
        let request = CorrelationScope::enter("REQUEST");
        dispatcher.info("inside", LogContext::new()).unwrap();
        {
            let _job = CorrelationScope::enter("JOB");
            dispatcher.info("nested", LogContext::new()).unwrap();
        }
        drop(request);
    }

    let payloads = sink.payloads();
    let process_token = document(&payloads[0])["correlation_token"].clone();
    assert_eq!(process_token.as_str().map(str::len), Some(32));
    assert_eq!(document(&payloads[1])["correlation_token"], "REQUEST");
    assert_eq!(document(&payloads[2])["correlation_token"], "JOB");
    assert_eq!(document(&payloads[2])["parent_correlation_token"], "REQUEST");
}

#[test]
fn test_exception_backtrace_in_document() {
    let sink = MockWriter::new("sink");
    let dispatcher = silent()
        .writer(sink.clone(), FilterChain::new(), FluentdFormatter::new())
        .unwrap()
        .build();

    let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    dispatcher
        .error(
            "upstream failed",
            LogContext::new().with_field("exception", FieldValue::from_error(&err)),
        )
        .unwrap();

    let doc = document(&sink.payloads()[0]).clone();
    assert_eq!(doc["context"]["backtrace"][0]["message"], "refused");
}

#[test]
fn test_udp_logstash_delivery() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = receiver.local_addr().unwrap().port();

    let dispatcher = silent()
        .writer(
            UdpWriter::new("127.0.0.1", port).unwrap(),
            FilterChain::new()
                .with(PriorityFilter::new(Comparison::Lt, 4))
                .with(RegexFilter::not_matching("METRICS").unwrap()),
            LogstashFormatter::new("orders-index"),
        )
        .unwrap()
        .build();

    dispatcher.info("not urgent", LogContext::new()).unwrap();
    dispatcher.error("METRICS", LogContext::new()).unwrap();
    dispatcher.error("payment failed", LogContext::new()).unwrap();

    let mut buf = [0u8; 9000];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(doc["message"], "payment failed");
    assert_eq!(doc["index_name"], "orders-index");
    assert_eq!(doc["priority"], 3);
    assert!(doc["correlation_token"].is_string());

    let keys: HashSet<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
    let expected: HashSet<&str> = [
        "timestamp",
        "message",
        "level",
        "priority",
        "context",
        "correlation_token",
        "parent_correlation_token",
        "index_name",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_stream_file_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");

    let dispatcher = silent()
        .writer(
            StreamWriter::file(&path).unwrap(),
            FilterChain::new(),
            LineFormatter::new().with_timestamp_format(TimestampFormat::Unix),
        )
        .unwrap()
        .build();

    dispatcher
        .info("login\nERROR forged line", LogContext::new())
        .unwrap();
    dispatcher.flush();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("login\\nERROR forged line"));
}

#[test]
fn test_db_alert_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("alerts.db");

    let dispatcher = silent()
        .writer(
            DbWriter::new(
                "alerts",
                ColumnMap::new()
                    .field("message", "message")
                    .context_field("number", "number"),
                Arc::new(SqliteTableSink::open(&path).unwrap()),
            ),
            FilterChain::new().with(RegexFilter::new("^SMS_ALERT").unwrap()),
            FluentdFormatter::new(),
        )
        .unwrap()
        .build();

    dispatcher
        .alert("SMS_ALERT core switch down", LogContext::new().with_field("number", "+1555"))
        .unwrap();
    dispatcher.flush();

    let conn = Connection::open(&path).unwrap();
    let (message, number): (String, String) = conn
        .query_row("SELECT message, number FROM alerts", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(message, "SMS_ALERT core switch down");
    assert_eq!(number, "+1555");
}

#[test]
fn test_pipeline_from_config() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("alerts.db");
    let log_path = dir.path().join("app.jsonl");

    let settings = Settings {
        db_path: Some(db_path.clone()),
        ..Settings::default()
    };
    let mut config = PipelineConfig::default_for(&settings);
    config.writers[0] = BindingSpec::new(WriterSpec::Stream {
        stream: log_path.to_string_lossy().into_owned(),
    })
    .named("file")
    .filter(FilterSpec::Priority {
        operator: Comparison::Le,
        priority: 6,
    })
    .formatter(FormatterSpec::Fluentd { index: None });

    let fallback = FallbackChannel::memory();
    let dispatcher = build_dispatcher_with(&config, &settings, fallback.clone()).unwrap();
    assert_eq!(dispatcher.bindings().len(), 2);

    dispatcher.info("hello", LogContext::new()).unwrap();
    dispatcher.debug("ignored", LogContext::new()).unwrap();
    dispatcher.critical("SMS_ALERT boom", LogContext::new()).unwrap();
    dispatcher.critical("SMS_ALERT boom", LogContext::new()).unwrap();
    dispatcher.flush();

    let lines = fs::read_to_string(&log_path).unwrap();
    assert_eq!(lines.lines().count(), 3);
    let conn = Connection::open(&db_path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}
