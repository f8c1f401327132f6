//! HTTP metric writer
//!
//! Posts `{"metric": ..., "value": ..., "timestamp": ...}` to a collector URL.
//! The stock pipeline wraps it in an [`AsyncWriter`](super::AsyncWriter) so the
//! request never runs on the logging thread.

use crate::core::{LoggerError, Payload, PayloadKind, Result, Writer};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct MetricBody<'a> {
    metric: &'a str,
    value: f64,
    timestamp: i64,
}

#[derive(Debug)]
pub struct HttpMetricWriter {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpMetricWriter {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Writer for HttpMetricWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let Payload::Metric(sample) = payload else {
            return Err(LoggerError::delivery(
                "http_metric",
                format!("cannot send {:?} payload", payload.kind()),
            ));
        };

        let body = MetricBody {
            metric: &sample.metric_id,
            value: sample.value,
            timestamp: sample.timestamp,
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(LoggerError::delivery(
                "http_metric",
                format!("collector returned status: {}", response.status()),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http_metric"
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Metric
    }
}
