use thiserror::Error;

/// Errors raised while constructing a [Debounced](crate::Debounced) or
/// [Throttled](crate::Throttled) wrapper.
///
/// Failures of the wrapped callable are never converted into this type. They are returned from
/// `call()` as-is, or reported through the error hook when they happen on a timer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A wait interval given in signed milliseconds was below zero.
    #[error("wait must not be negative, got {0}ms")]
    NegativeWait(i64),

    /// No scheduler was supplied and there is no Tokio runtime to spawn timers on.
    #[error("no Tokio runtime available to schedule timers on")]
    NoRuntime,
}
