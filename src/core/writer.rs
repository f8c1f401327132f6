//! Writer trait for log output destinations

use super::{
    error::Result,
    formatter::{Payload, PayloadKind},
};
use std::fmt;

/// Delivers formatted payloads to one destination.
///
/// Writers are shared across concurrent logging calls and synchronize their
/// own state; locks must not be held across network calls.
pub trait Writer: Send + Sync {
    fn write(&self, payload: &Payload) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// Payload shapes this writer can deliver
    fn accepts(&self, kind: PayloadKind) -> bool;
}

/// Delivery state of a writer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriterState {
    Idle = 0,
    Writing = 1,
    FailedDelivery = 2,
}

impl WriterState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => WriterState::Writing,
            2 => WriterState::FailedDelivery,
            _ => WriterState::Idle,
        }
    }
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterState::Idle => write!(f, "Idle"),
            WriterState::Writing => write!(f, "Writing"),
            WriterState::FailedDelivery => write!(f, "FailedDelivery"),
        }
    }
}
