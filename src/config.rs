//! Pipeline configuration
//!
//! [`Settings`] collects every environment-derived value once at startup.
//! [`PipelineConfig`] is the declarative list of processors and writer
//! bindings; it can be loaded from JSON or TOML or taken from
//! [`PipelineConfig::default_for`]. [`build_dispatcher`] resolves each kind
//! tag to a concrete type exactly once and returns a ready [`Dispatcher`].

use crate::core::{
    Dispatcher, FallbackChannel, Filter, FilterChain, Formatter, LoggerError, OverflowPolicy,
    Processor, Result, TimestampFormat, Writer, WriterBinding,
};
use crate::filters::{Comparison, PriorityFilter, RateLimitFilter, RegexFilter, SuppressFilter};
use crate::formatters::{
    FluentdFormatter, LineFormatter, LogstashFormatter, MetricFormatter, SlackFormatter,
};
use crate::processors::{ExceptionBacktrace, IdMaker, LifecycleTokenInjector};
use crate::writers::{
    AsyncWriter, ColumnMap, DbWriter, HttpMetricWriter, MetricKind, PrometheusOptions,
    PrometheusWriter, SlackWriter, SqliteTableSink, StreamWriter, UdpWriter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Environment-derived connection settings, read once
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub logstash_host: Option<String>,
    pub logstash_port: Option<u16>,
    pub logstash_index: Option<String>,
    pub metric_url: Option<String>,
    pub prometheus_host: Option<String>,
    pub prometheus_port: Option<u16>,
    pub service_name: Option<String>,
    pub slack_token: Option<String>,
    pub slack_channel: Option<String>,
    /// Append-only table file for the alert writer
    pub db_path: Option<PathBuf>,
    pub app_debug: bool,
    /// Per-writer connect/write timeout for remote sinks
    pub delivery_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logstash_host: None,
            logstash_port: None,
            logstash_index: None,
            metric_url: None,
            prometheus_host: None,
            prometheus_port: None,
            service_name: None,
            slack_token: None,
            slack_channel: None,
            db_path: None,
            app_debug: false,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_pipeline::config::Settings;
    ///
    /// let settings = Settings::from_lookup(|key| match key {
    ///     "SERVICE_NAME" => Some("billing".to_string()),
    ///     "LOGSTASH_PORT" => Some("5044".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(settings.logstash_port, Some(5044));
    /// assert!(settings.slack_token.is_none());
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let invalid = |key: &str, value: &str| {
            LoggerError::config("settings", format!("invalid {}: '{}'", key, value))
        };
        let port = |key: &str| -> Result<Option<u16>> {
            get(key)
                .map(|value| value.parse::<u16>().map_err(|_| invalid(key, &value)))
                .transpose()
        };

        let delivery_timeout = match get("LOG_DELIVERY_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .map_err(|_| invalid("LOG_DELIVERY_TIMEOUT_MS", &ms))?,
            ),
            None => DEFAULT_DELIVERY_TIMEOUT,
        };

        Ok(Self {
            logstash_host: get("LOGSTASH_HOST"),
            logstash_port: port("LOGSTASH_PORT")?,
            logstash_index: get("LOGSTASH_INDEX"),
            metric_url: get("METRIC_URL"),
            prometheus_host: get("PROMETHEUS_HOST"),
            prometheus_port: port("PROMETHEUS_PORT")?,
            service_name: get("SERVICE_NAME"),
            slack_token: get("SLACK_TOKEN"),
            slack_channel: get("SLACK_CHANNEL"),
            db_path: get("LOG_DB_PATH").map(PathBuf::from),
            app_debug: get("APP_DEBUG").is_some_and(|v| v == "true"),
            delivery_timeout,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorSpec {
    IdMaker,
    ExceptionBacktrace,
    LifecycleToken {
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        parent: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    Priority {
        operator: Comparison,
        priority: u8,
    },
    Regex {
        regex: String,
        /// Pass events that do NOT match
        #[serde(default)]
        negate: bool,
        /// Match a context field instead of the message
        #[serde(default)]
        field: Option<String>,
    },
    RateLimit {
        ttl: String,
    },
    Suppress {
        #[serde(default)]
        suppress: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatterSpec {
    Line {
        #[serde(default)]
        timestamp: TimestampFormat,
        #[serde(default)]
        colors: bool,
    },
    Fluentd {
        /// Falls back to `LOGSTASH_INDEX`; emitted as `null` when neither is set
        #[serde(default)]
        index: Option<String>,
    },
    Logstash {
        /// Falls back to `LOGSTASH_INDEX`
        #[serde(default)]
        index: Option<String>,
        /// Source field -> output key; empty keeps the default map
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Slack {
        #[serde(default)]
        max_chars: Option<usize>,
    },
    Metric,
}

/// Connection parameters left unset fall back to [`Settings`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriterSpec {
    Stream {
        #[serde(default = "default_stream")]
        stream: String,
    },
    Udp {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u16>,
    },
    Slack {
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        channel: Option<String>,
    },
    HttpMetric {
        #[serde(default)]
        url: Option<String>,
    },
    Prometheus {
        metric: MetricKind,
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        job: Option<String>,
    },
    Db {
        table: String,
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        columns: ColumnMap,
    },
}

fn default_stream() -> String {
    "stdout".to_string()
}

impl WriterSpec {
    fn default_formatter(&self) -> FormatterSpec {
        match self {
            WriterSpec::Stream { .. } | WriterSpec::Db { .. } => {
                FormatterSpec::Fluentd { index: None }
            }
            WriterSpec::Udp { .. } => FormatterSpec::Logstash {
                index: None,
                fields: BTreeMap::new(),
            },
            WriterSpec::Slack { .. } => FormatterSpec::Slack { max_chars: None },
            WriterSpec::HttpMetric { .. } | WriterSpec::Prometheus { .. } => FormatterSpec::Metric,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WriterSpec::Stream { .. } => "stream",
            WriterSpec::Udp { .. } => "udp",
            WriterSpec::Slack { .. } => "slack",
            WriterSpec::HttpMetric { .. } => "http_metric",
            WriterSpec::Prometheus { metric: MetricKind::Gauge, .. } => "prometheus_gauge",
            WriterSpec::Prometheus { metric: MetricKind::Counter, .. } => "prometheus_counter",
            WriterSpec::Db { .. } => "db",
        }
    }
}

/// Run the writer on a background worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncSpec {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_capacity() -> usize {
    crate::writers::async_writer::DEFAULT_CAPACITY
}

impl Default for AsyncSpec {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Binding name; defaults to the writer kind
    #[serde(default)]
    pub name: Option<String>,
    pub writer: WriterSpec,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Defaults to the writer kind's natural formatter
    #[serde(default)]
    pub formatter: Option<FormatterSpec>,
    #[serde(default, rename = "async")]
    pub asynchronous: Option<AsyncSpec>,
}

impl BindingSpec {
    pub fn new(writer: WriterSpec) -> Self {
        Self {
            name: None,
            writer,
            filters: Vec::new(),
            formatter: None,
            asynchronous: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn formatter(mut self, formatter: FormatterSpec) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use]
    pub fn asynchronous(mut self, spec: AsyncSpec) -> Self {
        self.asynchronous = Some(spec);
        self
    }

    pub fn binding_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.writer.label().to_string())
    }
}

/// Declarative pipeline: processors in order, then writer bindings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processors: Vec<ProcessorSpec>,
    #[serde(default)]
    pub writers: Vec<BindingSpec>,
}

fn priority(operator: Comparison, priority: u8) -> FilterSpec {
    FilterSpec::Priority { operator, priority }
}

fn regex(pattern: &str) -> FilterSpec {
    FilterSpec::Regex {
        regex: pattern.to_string(),
        negate: false,
        field: None,
    }
}

fn not_regex(pattern: &str) -> FilterSpec {
    FilterSpec::Regex {
        regex: pattern.to_string(),
        negate: true,
        field: None,
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load by file extension (`.json` or `.toml`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("toml") => Self::from_toml(&text),
            _ => Err(LoggerError::config(
                "pipeline config",
                format!("unsupported config file '{}'", path.display()),
            )),
        }
    }

    /// The stock pipeline
    ///
    /// Operational logs go to stdout and Logstash, metric events to the
    /// metric collector and the push gateway, urgent logs to Slack, and
    /// `SMS_ALERT` messages to the alert table at most once per day.
    pub fn default_for(settings: &Settings) -> Self {
        let metric_window = || {
            vec![
                priority(Comparison::Ge, 4),
                priority(Comparison::Le, 5),
            ]
        };
        let db_operator = if settings.app_debug {
            Comparison::Le
        } else {
            Comparison::Lt
        };

        let mut http_metric = BindingSpec::new(WriterSpec::HttpMetric { url: None })
            .asynchronous(AsyncSpec::default());
        http_metric.filters = metric_window();
        http_metric.filters.push(regex("^METRICS$"));

        let mut gauge = BindingSpec::new(WriterSpec::Prometheus {
            metric: MetricKind::Gauge,
            host: None,
            port: None,
            job: None,
        })
        .filter(regex("^METRICS_GAUGE$"));
        gauge.filters.extend(metric_window());

        let mut counter = BindingSpec::new(WriterSpec::Prometheus {
            metric: MetricKind::Counter,
            host: None,
            port: None,
            job: None,
        })
        .filter(regex("^METRICS_COUNTER$"));
        counter.filters.extend(metric_window());

        Self {
            processors: vec![
                ProcessorSpec::IdMaker,
                ProcessorSpec::ExceptionBacktrace,
                ProcessorSpec::LifecycleToken {
                    token: None,
                    parent: None,
                },
            ],
            writers: vec![
                BindingSpec::new(WriterSpec::Stream {
                    stream: default_stream(),
                }),
                BindingSpec::new(WriterSpec::Udp {
                    host: None,
                    port: None,
                })
                .filter(priority(Comparison::Lt, 4))
                .filter(not_regex("METRICS")),
                http_metric,
                gauge,
                counter,
                BindingSpec::new(WriterSpec::Slack {
                    token: None,
                    channel: None,
                })
                .filter(not_regex("METRICS"))
                .filter(priority(Comparison::Lt, 4)),
                BindingSpec::new(WriterSpec::Db {
                    table: "alerts".to_string(),
                    path: None,
                    columns: ColumnMap::new()
                        .field("message", "message")
                        .context_field("sign", "sign")
                        .context_field("number", "number"),
                })
                .filter(priority(db_operator, 7))
                .filter(regex("^SMS_ALERT"))
                .filter(FilterSpec::RateLimit {
                    ttl: "24h".to_string(),
                }),
            ],
        }
    }
}

/// Build a dispatcher that reports to stderr
pub fn build_dispatcher(config: &PipelineConfig, settings: &Settings) -> Result<Dispatcher> {
    build_dispatcher_with(config, settings, FallbackChannel::default())
}

/// Resolve every spec once and assemble the dispatcher
///
/// Invalid specs (bad regex, unknown TTL, a formatter the writer cannot
/// carry) fail the build. Bindings whose connection settings are missing are
/// skipped with a warning on `fallback`.
pub fn build_dispatcher_with(
    config: &PipelineConfig,
    settings: &Settings,
    fallback: FallbackChannel,
) -> Result<Dispatcher> {
    let mut builder = Dispatcher::builder().fallback(fallback.clone());

    for spec in &config.processors {
        builder = builder.boxed_processor(build_processor(spec));
    }

    for spec in &config.writers {
        let name = spec.binding_name();
        let formatter_spec = spec
            .formatter
            .clone()
            .unwrap_or_else(|| spec.writer.default_formatter());
        let formatter = build_formatter(&formatter_spec, settings)?;
        let filters = build_filters(&spec.filters)?;

        let writer = match build_writer(&spec.writer, settings)? {
            Resolved::Ready(writer) => writer,
            Resolved::Missing(setting) => {
                fallback.warning(format!(
                    "Skipping writer '{}': {} is not configured",
                    name, setting
                ));
                continue;
            }
            Resolved::Unavailable(reason) => {
                fallback.warning(format!("Skipping writer '{}': {}", name, reason));
                continue;
            }
        };

        let writer = match &spec.asynchronous {
            Some(async_spec) => Box::new(
                AsyncWriter::builder_boxed(writer)
                    .capacity(async_spec.capacity)
                    .overflow_policy(async_spec.overflow.clone())
                    .fallback(fallback.clone())
                    .shutdown_timeout(settings.delivery_timeout.max(Duration::from_secs(1)))
                    .spawn()?,
            ) as Box<dyn Writer>,
            None => writer,
        };

        builder = builder.binding(WriterBinding::named(name, writer, filters, formatter)?);
    }

    Ok(builder.build())
}

fn build_processor(spec: &ProcessorSpec) -> Box<dyn Processor> {
    match spec {
        ProcessorSpec::IdMaker => Box::new(IdMaker::new()),
        ProcessorSpec::ExceptionBacktrace => Box::new(ExceptionBacktrace::new()),
        ProcessorSpec::LifecycleToken { token, parent } => {
            let injector = match token {
                Some(token) => LifecycleTokenInjector::with_token(token.clone()),
                None => LifecycleTokenInjector::new(),
            };
            Box::new(match parent {
                Some(parent) => injector.with_parent(parent.clone()),
                None => injector,
            })
        }
    }
}

pub fn build_filters(specs: &[FilterSpec]) -> Result<FilterChain> {
    let mut chain = FilterChain::new();
    for spec in specs {
        chain.push(build_filter(spec)?);
    }
    Ok(chain)
}

fn build_filter(spec: &FilterSpec) -> Result<Box<dyn Filter>> {
    Ok(match spec {
        FilterSpec::Priority { operator, priority } => {
            Box::new(PriorityFilter::new(*operator, *priority))
        }
        FilterSpec::Regex {
            regex,
            negate,
            field,
        } => {
            let filter = RegexFilter::new(regex)?.negated(*negate);
            Box::new(match field {
                Some(field) => filter.on_field(field.clone()),
                None => filter,
            })
        }
        FilterSpec::RateLimit { ttl } => Box::new(RateLimitFilter::parse(ttl)?),
        FilterSpec::Suppress { suppress } => Box::new(SuppressFilter::new(*suppress)),
    })
}

pub fn build_formatter(spec: &FormatterSpec, settings: &Settings) -> Result<Box<dyn Formatter>> {
    Ok(match spec {
        FormatterSpec::Line { timestamp, colors } => Box::new(
            LineFormatter::new()
                .with_timestamp_format(timestamp.clone())
                .with_colors(*colors),
        ),
        FormatterSpec::Fluentd { index } => {
            let formatter = FluentdFormatter::new();
            Box::new(match pick(index, &settings.logstash_index) {
                Some(index) => formatter.with_index_name(index),
                None => formatter,
            })
        }
        FormatterSpec::Logstash { index, fields } => {
            let index = index
                .clone()
                .or_else(|| settings.logstash_index.clone())
                .unwrap_or_default();
            let formatter = LogstashFormatter::new(index);
            Box::new(if fields.is_empty() {
                formatter
            } else {
                formatter.with_field_map(fields.clone())?
            })
        }
        FormatterSpec::Slack { max_chars } => {
            let formatter = SlackFormatter::new();
            Box::new(match max_chars {
                Some(max) => formatter.with_max_chars(*max),
                None => formatter,
            })
        }
        FormatterSpec::Metric => Box::new(MetricFormatter::new()),
    })
}

enum Resolved {
    Ready(Box<dyn Writer>),
    /// A required setting is absent
    Missing(&'static str),
    /// The destination could not be set up (e.g. host did not resolve)
    Unavailable(String),
}

fn pick<T: Clone>(explicit: &Option<T>, setting: &Option<T>) -> Option<T> {
    explicit.clone().or_else(|| setting.clone())
}

fn build_writer(spec: &WriterSpec, settings: &Settings) -> Result<Resolved> {
    let timeout = settings.delivery_timeout;

    Ok(match spec {
        WriterSpec::Stream { stream } => Resolved::Ready(Box::new(StreamWriter::open(stream)?)),

        WriterSpec::Udp { host, port } => {
            let Some(host) = pick(host, &settings.logstash_host) else {
                return Ok(Resolved::Missing("LOGSTASH_HOST"));
            };
            let Some(port) = pick(port, &settings.logstash_port) else {
                return Ok(Resolved::Missing("LOGSTASH_PORT"));
            };
            match UdpWriter::with_timeout(&host, port, timeout) {
                Ok(writer) => Resolved::Ready(Box::new(writer)),
                Err(e) => Resolved::Unavailable(e.to_string()),
            }
        }

        WriterSpec::Slack { token, channel } => {
            let Some(token) = pick(token, &settings.slack_token) else {
                return Ok(Resolved::Missing("SLACK_TOKEN"));
            };
            let Some(channel) = pick(channel, &settings.slack_channel) else {
                return Ok(Resolved::Missing("SLACK_CHANNEL"));
            };
            Resolved::Ready(Box::new(SlackWriter::new(token, channel).with_timeout(timeout)))
        }

        WriterSpec::HttpMetric { url } => {
            let Some(url) = pick(url, &settings.metric_url) else {
                return Ok(Resolved::Missing("METRIC_URL"));
            };
            Resolved::Ready(Box::new(HttpMetricWriter::new(url).with_timeout(timeout)))
        }

        WriterSpec::Prometheus {
            metric,
            host,
            port,
            job,
        } => {
            let Some(host) = pick(host, &settings.prometheus_host) else {
                return Ok(Resolved::Missing("PROMETHEUS_HOST"));
            };
            let Some(service_name) = settings.service_name.as_deref() else {
                return Ok(Resolved::Missing("SERVICE_NAME"));
            };

            let mut options = PrometheusOptions::new(host, service_name).with_timeout(timeout);
            if let Some(port) = pick(port, &settings.prometheus_port) {
                options = options.with_port(port);
            }
            if let Some(job) = job {
                options = options.with_job(job.clone());
            }
            Resolved::Ready(Box::new(PrometheusWriter::new(*metric, options)))
        }

        WriterSpec::Db {
            table,
            path,
            columns,
        } => {
            let Some(path) = pick(path, &settings.db_path) else {
                return Ok(Resolved::Missing("LOG_DB_PATH"));
            };
            let sink = Arc::new(SqliteTableSink::open(path)?);
            Resolved::Ready(Box::new(DbWriter::new(table.clone(), columns.clone(), sink)))
        }
    })
}
