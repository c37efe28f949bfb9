//! Debounce and throttle wrappers for high-frequency callbacks.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

mod clock;
mod config;
mod debounce;
mod error;
mod invocation;
mod scheduler;
mod throttle;


pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{wait_from_millis, DebounceConfig, ThrottleConfig};
pub use debounce::{debounce, DebounceBuilder, Debounced, Edge};
pub use error::Error;
pub use invocation::Completion;
pub use scheduler::{Scheduler, TimerCallback, TimerHandle, TokioScheduler};
pub use throttle::{throttle, ThrottleBuilder, ThrottleState, Throttled};
