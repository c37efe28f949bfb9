//! Sources of "now" for the throttler.

use std::{
    fmt::Debug,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::time::Instant;

/// A source of timestamps, measured from some fixed origin.
pub trait Clock: Debug + Send + Sync + 'static {
    /// Time elapsed since the clock's origin.
    ///
    /// Not required to be monotonic.
    fn now(&self) -> Duration;
}

/// A monotonic clock backed by Tokio's [Instant].
///
/// Follows Tokio's paused time in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

/// The system wall clock, measured from the UNIX epoch.
///
/// Can jump backwards if the system time is adjusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TokioClock {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}
