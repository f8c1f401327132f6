//! Slack `chat.postMessage` writer

use crate::core::{LoggerError, Payload, PayloadKind, Result, Writer};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://slack.com/api/chat.postMessage";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts each line to one channel with a bot token
#[derive(Debug)]
pub struct SlackWriter {
    client: Client,
    endpoint: String,
    token: String,
    channel: String,
    timeout: Duration,
}

impl SlackWriter {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: token.into(),
            channel: channel.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point at another API host (proxies, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Writer for SlackWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let body = serde_json::json!({
            "channel": self.channel,
            "text": payload.to_text(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(LoggerError::delivery(
                "slack",
                format!("API returned status: {}", response.status()),
            ));
        }

        // The API reports most failures as 200 with ok=false
        let api: ApiResponse = response.json()?;
        if !api.ok {
            return Err(LoggerError::delivery(
                "slack",
                api.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "slack"
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Line
    }
}
