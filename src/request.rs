//! Inbound request bodies for the device operations.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transform::Command;

/// Fetch `<path>/<segment>` and store it under `segment`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub path: String,
    pub segment: String,
}

impl DownloadRequest {
    pub fn new(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            segment: segment.into(),
        }
    }
}

/// Play a stored segment, or a synthetic sequence when `random` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteRequest {
    pub segment: String,
    pub random: bool,
    /// Explicit `[roll, pitch, yaw, x, y, z]` for synthetic runs. Empty means none.
    pub input: Vec<f64>,
    /// Seconds between synthetic steps. Zero selects the configured interval.
    pub period: u64,
}

impl ExecuteRequest {
    pub fn segment(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ..Default::default()
        }
    }

    pub fn random() -> Self {
        Self {
            random: true,
            ..Default::default()
        }
    }

    pub fn with_input(mut self, input: Vec<f64>) -> Self {
        self.input = input;
        self
    }

    pub fn with_period(mut self, seconds: u64) -> Self {
        self.period = seconds;
        self
    }

    /// The explicit command, if one was given. Fails unless it has six values.
    pub fn command(&self) -> Result<Option<Command>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        Command::from_slice(&self.input).map(Some)
    }
}
