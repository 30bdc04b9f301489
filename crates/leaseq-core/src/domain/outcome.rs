//! Outcome model: what a worker reports back for a claimed item.
//!
//! The set is closed. Workers that produce outcomes as strings (config-driven
//! pipelines, scripts) parse them with `Outcome::from_str`, so an unknown value
//! is rejected at the worker boundary instead of deep in the dispatcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::QueueError;

/// The three outcomes a worker may return.
///
/// - `Completed`: the item is deleted.
/// - `Retry`: the item is released back to the pool (transient failure).
/// - `Rejected`: the item is kept but permanently taken out of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Completed,
    Retry,
    Rejected,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "Completed",
            Outcome::Retry => "Retry",
            Outcome::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Completed" => Ok(Outcome::Completed),
            "Retry" => Ok(Outcome::Retry),
            "Rejected" => Ok(Outcome::Rejected),
            other => Err(QueueError::UnknownOutcome(other.to_string())),
        }
    }
}
