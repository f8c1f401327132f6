//! What an async writer does when its queue is full

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Queue-full behaviour of an [`AsyncWriter`](crate::writers::AsyncWriter)
///
/// Config files name policies in snake_case; the timed variant carries its
/// wait in milliseconds:
///
/// ```
/// use rust_log_pipeline::OverflowPolicy;
/// use std::time::Duration;
///
/// let policy: OverflowPolicy = serde_json::from_str(r#"{"block_with_timeout": 250}"#).unwrap();
/// assert_eq!(policy.wait_limit(), Some(Duration::from_millis(250)));
/// assert_eq!(OverflowPolicy::default().to_string(), "alert_and_drop");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming payload
    DropNewest,

    /// Evict the oldest queued payload and enqueue the incoming one
    DropOldest,

    /// Wait for room; the logging call inherits the writer's latency
    Block,

    /// Wait up to the given time, then discard
    BlockWithTimeout(#[serde(with = "millis")] Duration),

    /// Discard, count, and periodically report to the callback and the
    /// fallback channel
    #[default]
    AlertAndDrop,
}

impl OverflowPolicy {
    /// Longest time a full queue may hold up the caller; `None` means no limit
    /// for `Block` and no waiting at all for the dropping policies
    pub fn wait_limit(&self) -> Option<Duration> {
        match self {
            OverflowPolicy::BlockWithTimeout(timeout) => Some(*timeout),
            _ => None,
        }
    }

    /// Whether the policy can lose payloads
    pub fn is_lossy(&self) -> bool {
        !matches!(self, OverflowPolicy::Block)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => f.write_str("drop_newest"),
            OverflowPolicy::DropOldest => f.write_str("drop_oldest"),
            OverflowPolicy::Block => f.write_str("block"),
            OverflowPolicy::BlockWithTimeout(timeout) => {
                write!(f, "block_with_timeout({}ms)", timeout.as_millis())
            }
            OverflowPolicy::AlertAndDrop => f.write_str("alert_and_drop"),
        }
    }
}

/// Invoked with the running total of dropped payloads
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
