//! Single-shot timers.

use std::{fmt::Debug, time::Duration};

use tokio::{runtime::Handle, task::AbortHandle};

use crate::Error;

/// A callback to run once a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules single-shot callbacks.
///
/// Implementations must not run `callback` before `schedule` returns, nor once the returned
/// [TimerHandle] has been cancelled, if the cancellation happened before the callback started.
pub trait Scheduler: Debug + Send + Sync + 'static {
    /// Run `callback` after `delay`.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// An armed timer.
///
/// Dropping the handle does *not* cancel the timer.
#[derive(Debug)]
pub struct TimerHandle {
    inner: HandleInner,
}

enum HandleInner {
    Task(AbortHandle),
    Custom(Box<dyn FnOnce() + Send + 'static>),
}

/// Spawns a Tokio task per timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TimerHandle {
    /// A handle which cancels a timer by calling `cancel`.
    ///
    /// For [Scheduler]s not backed by Tokio tasks.
    pub fn from_fn(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: HandleInner::Custom(Box::new(cancel)),
        }
    }

    /// Stop the timer from firing.
    pub fn cancel(self) {
        match self.inner {
            HandleInner::Task(task) => task.abort(),
            HandleInner::Custom(cancel) => cancel(),
        }
    }
}

impl Debug for HandleInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(_) => f.write_str("Task"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl TokioScheduler {
    /// Schedule timers on the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Schedule timers on the runtime we're currently running in.
    pub fn current() -> Result<Self, Error> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| Error::NoRuntime)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        TimerHandle {
            inner: HandleInner::Task(task.abort_handle()),
        }
    }
}
