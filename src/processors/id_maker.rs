//! Event id derivation
//!
//! A message may carry an id or date prefix separated by the first `|`:
//!
//! - `"1700000000|hello"` seeds the id with `1700000000`
//! - `"2023-01-01T00:00:00|hello"` seeds it with the epoch seconds of the date
//! - `"hello"` seeds it with the high-resolution capture time
//!
//! The final id is `base64("{nonce}_{seed}")` where the nonce is unique within
//! the process, so identical seeds never collide.

use crate::core::{parse_datetime, LogEvent, Processor, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);
static PROCESS_SALT: OnceLock<u32> = OnceLock::new();

/// Assigns `id`, `seed` and (for date prefixes) `timestamp` to events
#[derive(Debug, Clone, Default)]
pub struct IdMaker;

impl IdMaker {
    pub fn new() -> Self {
        Self
    }
}

impl Processor for IdMaker {
    fn process(&self, event: &mut LogEvent) -> Result<()> {
        if event.id.is_some() {
            return Ok(());
        }

        let (prefix, message) = split_prefix(&event.message);
        let seed = match prefix.map(str::trim) {
            Some(prefix) if is_numeric(prefix) => prefix.to_string(),
            Some("") => event.unix_timestamp().to_string(),
            Some(prefix) => {
                let at = parse_datetime(prefix)?;
                event.timestamp = at;
                at.timestamp().to_string()
            }
            None => capture_seed(&event.timestamp),
        };
        let message = message.to_string();

        event.id = Some(make_id(&seed));
        event.seed = Some(seed);
        event.message = message;
        Ok(())
    }

    fn name(&self) -> &str {
        "id_maker"
    }
}

/// Split on the first `|` into `(prefix, message)`
///
/// Leading empty pieces are skipped. Once the prefix is taken the remainder
/// is kept verbatim, so `1||x` yields `("1", "|x")`.
fn split_prefix(message: &str) -> (Option<&str>, &str) {
    let message = message.trim_start_matches('|');
    match message.split_once('|') {
        Some((head, rest)) => {
            if rest.is_empty() {
                (None, head)
            } else {
                (Some(head), rest)
            }
        }
        None => (None, message),
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && s.parse::<f64>().is_ok()
}

/// Capture time as `seconds.micros`
fn capture_seed(at: &DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Process-unique nonce: capture time, per-process salt and a counter
fn unique_nonce() -> String {
    let salt = *PROCESS_SALT.get_or_init(|| rand::thread_rng().gen_range(0..100_000_000));
    let count = NONCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now();
    format!(
        "{:08x}{:05x}.{:08}{:x}",
        now.timestamp(),
        now.timestamp_subsec_micros(),
        salt,
        count
    )
}

fn make_id(seed: &str) -> String {
    STANDARD.encode(format!("{}_{}", unique_nonce(), seed))
}

/// Decode an id back into `(nonce, seed)`
pub fn decode_id(id: &str) -> Option<(String, String)> {
    let bytes = STANDARD.decode(id).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (nonce, seed) = text.split_once('_')?;
    Some((nonce.to_string(), seed.to_string()))
}
