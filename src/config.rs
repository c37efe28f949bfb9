//! Serializable settings for the wrappers.
//!
//! These are meant to be embedded in an application's own configuration, e.g.
//!
//! ```toml
//! [search_box]
//! wait_ms = 250
//! immediate = false
//! ```

use std::time::Duration;

use conv::ValueFrom;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Settings for a [Debounced](crate::Debounced) wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period, in milliseconds.
    pub wait_ms: i64,
    /// Run on the leading edge of a burst instead of the trailing edge.
    pub immediate: bool,
}

/// Settings for a [Throttled](crate::Throttled) wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum time between executions, in milliseconds.
    pub wait_ms: i64,
}

impl DebounceConfig {
    /// The quiet period.
    ///
    /// Fails if `wait_ms` is negative.
    pub fn wait(&self) -> Result<Duration, Error> {
        wait_from_millis(self.wait_ms)
    }
}

impl ThrottleConfig {
    /// The throttling interval.
    ///
    /// Fails if `wait_ms` is negative.
    pub fn wait(&self) -> Result<Duration, Error> {
        wait_from_millis(self.wait_ms)
    }
}

/// Convert a signed millisecond count into a wait interval.
///
/// Negative values are rejected rather than clamped to zero.
pub fn wait_from_millis(ms: i64) -> Result<Duration, Error> {
    u64::value_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| Error::NegativeWait(ms))
}
