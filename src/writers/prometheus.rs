//! Prometheus gauge/counter writer with push-gateway delivery
//!
//! Each valid metric payload updates an in-process registry and then pushes
//! the whole registry to the gateway (`POST /metrics/job/{job}`, push-add
//! semantics). A failed push leaves the registry untouched; the next
//! successful push carries the latest values.

use crate::core::{LoggerError, MetricSample, Payload, PayloadKind, Result, Writer};
use parking_lot::Mutex;
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9091;
pub const DEFAULT_JOB: &str = "logger_job";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Latest value wins
    Gauge,
    /// Values are added; negative values are ignored
    Counter,
}

/// Connection and naming options for a [`PrometheusWriter`]
#[derive(Debug, Clone, PartialEq)]
pub struct PrometheusOptions {
    pub host: String,
    pub port: u16,
    /// Metric name prefix, derived from the service name
    pub namespace: String,
    pub job: String,
    pub timeout: Duration,
}

impl PrometheusOptions {
    pub fn new(host: impl Into<String>, service_name: &str) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            namespace: sanitize_namespace(service_name),
            job: DEFAULT_JOB.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job = job.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn push_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let base = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        format!("{}:{}/metrics/job/{}", base, self.port, self.job)
    }
}

/// `"My-Service "` becomes `"my_service"`
pub fn sanitize_namespace(service_name: &str) -> String {
    service_name.trim().to_lowercase().replace('-', "_")
}

#[derive(Clone)]
enum Handle {
    Gauge(Gauge),
    Counter(Counter),
}

pub struct PrometheusWriter {
    kind: MetricKind,
    options: PrometheusOptions,
    registry: Registry,
    /// metric id -> registered collector; the namespace is fixed per writer
    handles: Mutex<HashMap<String, Handle>>,
    client: Client,
    pushes: AtomicU64,
    push_failures: AtomicU64,
}

impl PrometheusWriter {
    pub fn new(kind: MetricKind, options: PrometheusOptions) -> Self {
        Self {
            kind,
            options,
            registry: Registry::new(),
            handles: Mutex::new(HashMap::new()),
            client: Client::new(),
            pushes: AtomicU64::new(0),
            push_failures: AtomicU64::new(0),
        }
    }

    pub fn gauge(options: PrometheusOptions) -> Self {
        Self::new(MetricKind::Gauge, options)
    }

    pub fn counter(options: PrometheusOptions) -> Self {
        Self::new(MetricKind::Counter, options)
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn options(&self) -> &PrometheusOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of a gauge registered by this writer
    pub fn gauge_value(&self, metric_id: &str) -> Option<f64> {
        match self.handles.lock().get(metric_id) {
            Some(Handle::Gauge(gauge)) => Some(gauge.get()),
            _ => None,
        }
    }

    /// Current total of a counter registered by this writer
    pub fn counter_value(&self, metric_id: &str) -> Option<f64> {
        match self.handles.lock().get(metric_id) {
            Some(Handle::Counter(counter)) => Some(counter.get()),
            _ => None,
        }
    }

    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }

    pub fn push_failure_count(&self) -> u64 {
        self.push_failures.load(Ordering::Relaxed)
    }

    /// Registry text exposition, as pushed to the gateway
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn is_configured(&self) -> bool {
        !self.options.host.trim().is_empty() && !self.options.namespace.is_empty()
    }

    /// Update the local registry; the lock covers only the map and the update
    fn record(&self, sample: &MetricSample) -> Result<()> {
        let mut handles = self.handles.lock();
        let handle = match handles.get(&sample.metric_id) {
            Some(handle) => handle.clone(),
            None => {
                let handle = self.register(&sample.metric_id)?;
                handles.insert(sample.metric_id.clone(), handle.clone());
                handle
            }
        };

        match handle {
            Handle::Gauge(gauge) => gauge.set(sample.value),
            Handle::Counter(counter) => counter.inc_by(sample.value),
        }
        Ok(())
    }

    fn register(&self, metric_id: &str) -> Result<Handle> {
        let opts = Opts::new(metric_id, metric_id).namespace(self.options.namespace.clone());
        let handle = match self.kind {
            MetricKind::Gauge => {
                let gauge = Gauge::with_opts(opts)?;
                self.registry.register(Box::new(gauge.clone()))?;
                Handle::Gauge(gauge)
            }
            MetricKind::Counter => {
                let counter = Counter::with_opts(opts)?;
                self.registry.register(Box::new(counter.clone()))?;
                Handle::Counter(counter)
            }
        };
        Ok(handle)
    }

    fn push(&self) -> Result<()> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        self.pushes.fetch_add(1, Ordering::Relaxed);
        let result = self
            .client
            .post(self.options.push_url())
            .header(CONTENT_TYPE, encoder.format_type())
            .timeout(self.options.timeout)
            .body(buffer)
            .send();

        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                self.push_failures.fetch_add(1, Ordering::Relaxed);
                Err(LoggerError::delivery(
                    "prometheus",
                    format!("push gateway returned status: {}", response.status()),
                ))
            }
            Err(e) => {
                self.push_failures.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }
}

impl Writer for PrometheusWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let Payload::Metric(sample) = payload else {
            return Err(LoggerError::delivery(
                "prometheus",
                format!("cannot record {:?} payload", payload.kind()),
            ));
        };

        // Missing gateway or namespace: drop silently
        if !self.is_configured() {
            return Ok(());
        }
        if self.kind == MetricKind::Counter && sample.value < 0.0 {
            return Ok(());
        }

        self.record(sample)?;
        self.push()
    }

    fn name(&self) -> &str {
        match self.kind {
            MetricKind::Gauge => "prometheus_gauge",
            MetricKind::Counter => "prometheus_counter",
        }
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Metric
    }
}

impl std::fmt::Debug for PrometheusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusWriter")
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("metrics", &self.handles.lock().len())
            .finish()
    }
}
