use std::{convert::Infallible, fmt::Debug, sync::Arc};

/// A captured call: the context it was made against, and its arguments.
///
/// Stored verbatim until the wrapped callable runs, then moved into it.
#[derive(Debug)]
pub(crate) struct Invocation<C, A> {
    context: C,
    args: A,
}

/// The return type of a wrapped callable.
///
/// Implemented for `()`, for callables which can't fail, and for `Result<(), E>`.
pub trait Completion {
    /// The failure the callable can report.
    type Error: Debug + Send + 'static;

    /// Normalise into a `Result`.
    fn into_result(self) -> Result<(), Self::Error>;
}

impl Completion for () {
    type Error = Infallible;

    fn into_result(self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl<E> Completion for Result<(), E>
where
    E: Debug + Send + 'static,
{
    type Error = E;

    fn into_result(self) -> Result<(), E> {
        self
    }
}

/// Receives failures from executions which ran on a timer, where there is no caller to return
/// them to.
pub(crate) type ErrorHook<E> = Arc<dyn Fn(&E) + Send + Sync>;

impl<C, A> Invocation<C, A> {
    pub(crate) fn new(context: C, args: A) -> Self {
        Self { context, args }
    }

    /// Run `f` against this invocation.
    pub(crate) fn apply<F, R>(self, f: &F) -> Result<(), R::Error>
    where
        F: Fn(C, A) -> R + ?Sized,
        R: Completion,
    {
        f(self.context, self.args).into_result()
    }
}

/// Report a failure from a deferred execution.
pub(crate) fn report_deferred<E: Debug>(
    wrapper: &'static str,
    error: &E,
    hook: Option<&ErrorHook<E>>,
) {
    tracing::error!(wrapper, error = ?error, "deferred invocation failed");

    if let Some(hook) = hook {
        hook(error);
    }
}
