use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    config::DebounceConfig,
    invocation::{report_deferred, Completion, ErrorHook, Invocation},
    scheduler::{Scheduler, TimerHandle, TokioScheduler},
    Error,
};

/// Which edge of a burst of calls triggers an execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Edge {
    /// Run on the first call after a quiet period. Later calls in the same burst are dropped.
    Leading,
    /// Run once calls have been quiet for the whole wait, with the last call's arguments.
    #[default]
    Trailing,
}

/// Collapses bursts of calls into a single execution.
///
/// Every call resets a single timer. The wrapped callable runs either when the calls go quiet for
/// `wait` ([Edge::Trailing]), or on the first call of a burst ([Edge::Leading]).
///
/// Cheaply cloneable. Clones share the same timer.
pub struct Debounced<C, A, E = std::convert::Infallible> {
    shared: Arc<Shared<C, A, E>>,
}

/// Builds a [Debounced] wrapper.
pub struct DebounceBuilder<C, A, E> {
    callable: Callable<C, A, E>,
    wait: Duration,
    edge: Edge,
    scheduler: Option<Arc<dyn Scheduler>>,
    on_error: Option<ErrorHook<E>>,
}

type Callable<C, A, E> = Box<dyn Fn(C, A) -> Result<(), E> + Send + Sync>;

struct Shared<C, A, E> {
    callable: Callable<C, A, E>,
    wait: Duration,
    edge: Edge,
    scheduler: Arc<dyn Scheduler>,
    on_error: Option<ErrorHook<E>>,

    timer: Mutex<TimerState>,
}

#[derive(Debug, Default)]
struct TimerState {
    armed: Option<Armed>,
    /// Incremented every time a timer is armed.
    generation: u64,
}

#[derive(Debug)]
struct Armed {
    generation: u64,
    handle: TimerHandle,
}

/// Debounce `f` on the current Tokio runtime.
///
/// With `immediate` set, `f` runs on the leading edge of each burst, otherwise on the trailing
/// edge.
pub fn debounce<F, R, C, A>(
    f: F,
    wait: Duration,
    immediate: bool,
) -> Result<Debounced<C, A, R::Error>, Error>
where
    F: Fn(C, A) -> R + Send + Sync + 'static,
    R: Completion,
    C: Send + 'static,
    A: Send + 'static,
{
    Debounced::builder(f)
        .wait(wait)
        .edge(Edge::from_immediate(immediate))
        .build()
}

impl Edge {
    /// [Edge::Leading] if `immediate`, else [Edge::Trailing].
    pub fn from_immediate(immediate: bool) -> Self {
        if immediate {
            Edge::Leading
        } else {
            Edge::Trailing
        }
    }
}

impl<C, A, E> Debounced<C, A, E>
where
    C: Send + 'static,
    A: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    #[allow(missing_docs)]
    pub fn builder<F, R>(f: F) -> DebounceBuilder<C, A, E>
    where
        F: Fn(C, A) -> R + Send + Sync + 'static,
        R: Completion<Error = E>,
    {
        DebounceBuilder {
            callable: Box::new(move |context: C, args: A| f(context, args).into_result()),
            wait: Duration::ZERO,
            edge: Edge::default(),
            scheduler: None,
            on_error: None,
        }
    }

    /// Debounce `f` using settings loaded from configuration.
    pub fn from_config<F, R>(f: F, config: &DebounceConfig) -> Result<Self, Error>
    where
        F: Fn(C, A) -> R + Send + Sync + 'static,
        R: Completion<Error = E>,
    {
        Self::builder(f)
            .wait(config.wait()?)
            .edge(Edge::from_immediate(config.immediate))
            .build()
    }

    /// Call the wrapped function, subject to debouncing.
    ///
    /// Returns the callable's result only when it runs synchronously, on the leading edge.
    /// Failures from trailing executions are reported to the error hook instead.
    pub fn call(&self, context: C, args: A) -> Result<(), E> {
        let shared = &self.shared;
        let invocation = Invocation::new(context, args);

        let mut timer = shared.timer.lock();

        let call_now = shared.edge == Edge::Leading && timer.armed.is_none();

        if let Some(armed) = timer.armed.take() {
            trace!(generation = armed.generation, "resetting debounce timer");
            armed.handle.cancel();
        }

        // Leading calls which don't run now are suppressed. The timer only marks the end of the
        // burst.
        let (run_now, deferred) = match shared.edge {
            Edge::Leading => (call_now.then_some(invocation), None),
            Edge::Trailing => (None, Some(invocation)),
        };

        timer.generation += 1;
        let generation = timer.generation;

        let fire = Arc::clone(shared);
        let handle = shared.scheduler.schedule(
            shared.wait,
            Box::new(move || fire.fire(generation, deferred)),
        );
        timer.armed = Some(Armed { generation, handle });

        drop(timer);

        match run_now {
            Some(invocation) => {
                debug!("running debounced callable on leading edge");
                invocation.apply(&*shared.callable)
            }
            None => Ok(()),
        }
    }

    /// Whether a timer is currently armed.
    ///
    /// For [Edge::Trailing], an execution is pending. For [Edge::Leading], calls are currently
    /// being suppressed.
    pub fn is_armed(&self) -> bool {
        self.shared.timer.lock().armed.is_some()
    }

    /// The quiet period.
    pub fn wait(&self) -> Duration {
        self.shared.wait
    }

    #[allow(missing_docs)]
    pub fn edge(&self) -> Edge {
        self.shared.edge
    }
}

impl<C, A, E> Shared<C, A, E>
where
    E: fmt::Debug + Send + 'static,
{
    fn fire(&self, generation: u64, deferred: Option<Invocation<C, A>>) {
        {
            let mut timer = self.timer.lock();
            match &timer.armed {
                Some(armed) if armed.generation == generation => timer.armed = None,
                // Superseded or cancelled after we were woken.
                _ => return,
            }
        }

        if let Some(invocation) = deferred {
            debug!("running debounced callable on trailing edge");
            if let Err(error) = invocation.apply(&*self.callable) {
                report_deferred("debounce", &error, self.on_error.as_ref());
            }
        } else {
            trace!("debounce burst ended");
        }
    }
}

impl<C, A, E> DebounceBuilder<C, A, E>
where
    C: Send + 'static,
    A: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// The quiet period. Defaults to zero.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Defaults to [Edge::Trailing].
    pub fn edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
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
    pub fn build(self) -> Result<Debounced<C, A, E>, Error> {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };

        Ok(Debounced {
            shared: Arc::new(Shared {
                callable: self.callable,
                wait: self.wait,
                edge: self.edge,
                scheduler,
                on_error: self.on_error,
                timer: Mutex::new(TimerState::default()),
            }),
        })
    }
}

impl<C, A, E> Clone for Debounced<C, A, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C, A, E> fmt::Debug for Debounced<C, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("wait", &self.shared.wait)
            .field("edge", &self.shared.edge)
            .field("timer", &*self.shared.timer.lock())
            .finish_non_exhaustive()
    }
}
