//! Priority threshold filter

use crate::core::{Filter, LogEvent, LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison between an event's priority and a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    #[inline]
    pub fn evaluate(&self, lhs: u8, rhs: u8) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparison {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "<" | "lt" => Ok(Comparison::Lt),
            "<=" | "le" => Ok(Comparison::Le),
            ">" | "gt" => Ok(Comparison::Gt),
            ">=" | "ge" => Ok(Comparison::Ge),
            "==" | "=" | "eq" => Ok(Comparison::Eq),
            "!=" | "<>" | "ne" => Ok(Comparison::Ne),
            other => Err(LoggerError::config(
                "priority filter",
                format!("unknown operator '{}'", other),
            )),
        }
    }
}

/// Passes events whose `priority <op> threshold` holds
///
/// Priorities run from 0 (emergency) to 7 (debug), so `< 4` means
/// "more severe than warning".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityFilter {
    comparison: Comparison,
    threshold: u8,
}

impl PriorityFilter {
    pub fn new(comparison: Comparison, threshold: u8) -> Self {
        Self {
            comparison,
            threshold,
        }
    }

    /// Build from an operator string such as `"<="`
    pub fn parse(operator: &str, threshold: u8) -> Result<Self> {
        Ok(Self::new(operator.parse()?, threshold))
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }
}

impl Filter for PriorityFilter {
    #[inline]
    fn accept(&self, event: &LogEvent) -> bool {
        self.comparison.evaluate(event.priority(), self.threshold)
    }

    fn name(&self) -> &str {
        "priority"
    }
}
