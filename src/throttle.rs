use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    clock::{Clock, TokioClock},
    config::ThrottleConfig,
    invocation::{report_deferred, Completion, ErrorHook, Invocation},
    scheduler::{Scheduler, TimerHandle, TokioScheduler},
    Error,
};

/// Runs the wrapped callable at most once per interval.
///
/// The first call runs immediately. Calls made during the following interval are coalesced into a
/// single trailing execution at the end of the interval, which uses the most recent call's
/// arguments. The last call of a burst is never dropped.
///
/// Cheaply cloneable. Clones share the same throttling state.
pub struct Throttled<C, A, E = std::convert::Infallible> {
    shared: Arc<Shared<C, A, E>>,
}

/// Builds a [Throttled] wrapper.
pub struct ThrottleBuilder<C, A, E> {
    callable: Callable<C, A, E>,
    wait: Duration,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    on_error: Option<ErrorHook<E>>,
}

/// A snapshot of the state of a [Throttled] wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    armed: bool,
    pending: bool,
    last_invocation: Option<Duration>,
}

type Callable<C, A, E> = Box<dyn Fn(C, A) -> Result<(), E> + Send + Sync>;

struct Shared<C, A, E> {
    callable: Callable<C, A, E>,
    wait: Duration,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    on_error: Option<ErrorHook<E>>,

    state: Mutex<State<C, A>>,
}

struct State<C, A> {
    pending: Option<Invocation<C, A>>,
    armed: Option<Armed>,
    /// Incremented every time a timer is armed.
    generation: u64,
    /// Clock reading when the callable last ran. `None` if it never has.
    last_invocation: Option<Duration>,
}

#[derive(Debug)]
struct Armed {
    generation: u64,
    handle: TimerHandle,
}

/// What to do with a call.
#[derive(Debug, PartialEq, Eq)]
enum Decision {
    RunNow,
    /// Run once this much time has passed.
    Defer(Duration),
}

/// Throttle `f` on the current Tokio runtime.
pub fn throttle<F, R, C, A>(f: F, wait: Duration) -> Result<Throttled<C, A, R::Error>, Error>
where
    F: Fn(C, A) -> R + Send + Sync + 'static,
    R: Completion,
    C: Send + 'static,
    A: Send + 'static,
{
    Throttled::builder(f).wait(wait).build()
}

impl<C, A, E> Throttled<C, A, E>
where
    C: Send + 'static,
    A: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    #[allow(missing_docs)]
    pub fn builder<F, R>(f: F) -> ThrottleBuilder<C, A, E>
    where
        F: Fn(C, A) -> R + Send + Sync + 'static,
        R: Completion<Error = E>,
    {
        ThrottleBuilder {
            callable: Box::new(move |context: C, args: A| f(context, args).into_result()),
            wait: Duration::ZERO,
            clock: None,
            scheduler: None,
            on_error: None,
        }
    }

    /// Throttle `f` using settings loaded from configuration.
    pub fn from_config<F, R>(f: F, config: &ThrottleConfig) -> Result<Self, Error>
    where
        F: Fn(C, A) -> R + Send + Sync + 'static,
        R: Completion<Error = E>,
    {
        Self::builder(f).wait(config.wait()?).build()
    }

    /// Call the wrapped function, subject to throttling.
    ///
    /// Returns the callable's result when it runs synchronously. Failures from trailing
    /// executions are reported to the error hook instead.
    pub fn call(&self, context: C, args: A) -> Result<(), E> {
        let shared = &self.shared;

        let mut state = shared.state.lock();
        state.pending = Some(Invocation::new(context, args));

        let now = shared.clock.now();

        match shared.decide(now, state.last_invocation) {
            Decision::RunNow => {
                if let Some(armed) = state.armed.take() {
                    trace!(generation = armed.generation, "cancelling throttle timer");
                    armed.handle.cancel();
                }
                state.last_invocation = Some(now);
                let invocation = state.pending.take();

                drop(state);

                match invocation {
                    Some(invocation) => {
                        debug!("running throttled callable immediately");
                        invocation.apply(&*shared.callable)
                    }
                    None => Ok(()),
                }
            }
            Decision::Defer(remaining) => {
                if state.armed.is_none() {
                    state.generation += 1;
                    let generation = state.generation;

                    trace!(generation, ?remaining, "arming throttle timer");

                    let fire = Arc::clone(shared);
                    let handle = shared
                        .scheduler
                        .schedule(remaining, Box::new(move || fire.fire(generation)));
                    state.armed = Some(Armed { generation, handle });
                }
                Ok(())
            }
        }
    }

    /// Cancel any trailing execution and forget when the callable last ran.
    ///
    /// The next call runs immediately, as if it were the first. Does nothing if there's nothing
    /// to cancel.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();

        if let Some(armed) = state.armed.take() {
            debug!(generation = armed.generation, "throttle cancelled");
            armed.handle.cancel();
        }
        state.last_invocation = None;
        state.pending = None;
    }

    /// The current state of the throttler.
    pub fn state(&self) -> ThrottleState {
        let state = self.shared.state.lock();
        ThrottleState {
            armed: state.armed.is_some(),
            pending: state.pending.is_some(),
            last_invocation: state.last_invocation,
        }
    }

    /// The throttling interval.
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }
}

impl<C, A, E> Shared<C, A, E>
where
    E: fmt::Debug + Send + 'static,
{
    fn decide(&self, now: Duration, last_invocation: Option<Duration>) -> Decision {
        let Some(last) = last_invocation else {
            return Decision::RunNow;
        };

        let Some(elapsed) = now.checked_sub(last) else {
            warn!(?now, ?last, "clock went backwards, not throttling");
            return Decision::RunNow;
        };

        match self.wait.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => Decision::Defer(remaining),
            _ => Decision::RunNow,
        }
    }

    fn fire(&self, generation: u64) {
        let invocation = {
            let mut state = self.state.lock();
            match &state.armed {
                Some(armed) if armed.generation == generation => state.armed = None,
                // Cancelled after we were woken.
                _ => return,
            }
            state.last_invocation = Some(self.clock.now());
            state.pending.take()
        };

        if let Some(invocation) = invocation {
            debug!("running throttled callable on trailing edge");
            if let Err(error) = invocation.apply(&*self.callable) {
                report_deferred("throttle", &error, self.on_error.as_ref());
            }
        }
    }
}

impl<C, A, E> ThrottleBuilder<C, A, E>
where
    C: Send + 'static,
    A: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// The minimum time between executions. Defaults to zero.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Use a custom [Clock]. Defaults to a [TokioClock].
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Use a custom [Scheduler]. Defaults to a [TokioScheduler] on the current runtime.
    pub fn scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Receive failures from trailing executions, in addition to them being logged.
    pub fn on_error(mut self, hook: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Fails with [Error::NoRuntime] if no scheduler was given and we're not in a Tokio runtime.
    pub fn build(self) -> Result<Throttled<C, A, E>, Error> {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(TokioClock::new()),
        };

        Ok(Throttled {
            shared: Arc::new(Shared {
                callable: self.callable,
                wait: self.wait,
                clock,
                scheduler,
                on_error: self.on_error,
                state: Mutex::new(State {
                    pending: None,
                    armed: None,
                    generation: 0,
                    last_invocation: None,
                }),
            }),
        })
    }
}

impl ThrottleState {
    /// Whether a trailing execution is scheduled.
    pub fn is_armed(&self) -> bool {
        self.armed
    }
    /// Whether a call is waiting to be executed.
    pub fn has_pending(&self) -> bool {
        self.pending
    }
    /// Clock reading when the callable last ran, if it has run since creation or the last
    /// [cancel](Throttled::cancel).
    pub fn last_invocation(&self) -> Option<Duration> {
        self.last_invocation
    }
}

impl<C, A, E> Clone for Throttled<C, A, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C, A, E> fmt::Debug for Throttled<C, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Throttled")
            .field("wait", &self.shared.wait)
            .field("clock", &self.shared.clock)
            .field("armed", &state.armed)
            .field("last_invocation", &state.last_invocation)
            .finish_non_exhaustive()
    }
}
