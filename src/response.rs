use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::callback::{capture, CallbackTask, Dispatch, Guard};
use crate::config::ResponseConfig;
use crate::executor::{Executor, ThreadPool};
use crate::state::{Outcome, State};
use crate::Error;

/// A completion cell that settles exactly once into a value, an absent
/// value, an error, or cancellation.
///
/// `Response` is a cheap handle; clones share the same state. Producers call
/// [`complete`](Response::complete), [`complete_with_error`](Response::complete_with_error)
/// or [`cancel`](Response::cancel); only the first call has any effect.
/// Consumers block with [`get`](Response::get), `.await` it, or attach
/// callbacks that run exactly once.
///
/// # Examples
///
/// ```
/// use response_out::Response;
/// use std::thread;
///
/// let response = Response::<String>::new();
/// let producer = response.clone();
/// let task = thread::spawn(move || {
///     producer.complete(Some("🍓".to_string()));
/// });
/// assert_eq!(response.get().unwrap().as_deref(), Some("🍓"));
/// task.join().expect("The producer thread has panicked");
/// ```
pub struct Response<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Response<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    core: Mutex<Core<T>>,
    settled: Condvar,
    config: Arc<ResponseConfig>,
    private_pool: OnceLock<ThreadPool>,
}

struct Core<T> {
    /// `None` while uncompleted. Set once, never replaced.
    outcome: Option<Arc<Outcome<T>>>,
    pending: Vec<CallbackTask<T>>,
    wakers: Vec<Waker>,
}

impl<T> Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An uncompleted response with the default configuration.
    pub fn new() -> Self {
        Self::from_config(Arc::new(ResponseConfig::default()))
    }

    pub fn with_config(config: ResponseConfig) -> Self {
        Self::from_config(Arc::new(config))
    }

    pub(crate) fn from_config(config: Arc<ResponseConfig>) -> Self {
        let response = Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    outcome: None,
                    pending: Vec::new(),
                    wakers: Vec::new(),
                }),
                settled: Condvar::new(),
                config,
                private_pool: OnceLock::new(),
            }),
        };
        response.shared.config.fire_create();
        response
    }

    /// A response that is already completed with `value`.
    pub fn completed(value: Option<T>) -> Self {
        let response = Self::new();
        response.complete(value);
        response
    }

    /// Completes with `value`, or with absence when `value` is `None`.
    ///
    /// Returns `false` and does nothing if the response is already done.
    pub fn complete(&self, value: Option<T>) -> bool {
        match value {
            Some(value) => self.settle(State::CompletedWithValue, Some(value), None),
            None => self.settle(State::CompletedWithNull, None, None),
        }
    }

    /// Completes exceptionally. No-op if already done.
    pub fn complete_with_error(&self, error: impl Into<Error>) -> bool {
        self.settle(State::CompletedExceptionally, None, Some(error.into()))
    }

    /// Cancels an uncompleted response. Returns `false` if it was already done.
    pub fn cancel(&self) -> bool {
        self.settle(State::Cancelled, None, Some(Error::Cancelled))
    }

    /// Runs `supplier` on the executor and completes with what it returns.
    /// An `Err` or a panic completes the response exceptionally.
    pub fn complete_async<F, E>(&self, supplier: F)
    where
        F: FnOnce() -> Result<Option<T>, E> + Send + 'static,
        E: Into<Error>,
    {
        let target = self.clone();
        self.executor().execute(Box::new(move || {
            match capture(supplier) {
                Ok(Ok(value)) => target.complete(value),
                Ok(Err(err)) => target.complete_with_error(err),
                Err(panic) => target.complete_with_error(panic),
            };
        }));
    }

    /// Runs `supplier` on the executor and completes exceptionally with the
    /// error it returns.
    pub fn complete_with_error_async<F>(&self, supplier: F)
    where
        F: FnOnce() -> Error + Send + 'static,
    {
        let target = self.clone();
        self.executor().execute(Box::new(move || {
            let error = capture(supplier).unwrap_or_else(|panic| panic);
            target.complete_with_error(error);
        }));
    }

    /// Blocks until the response is done.
    ///
    /// Returns the value (possibly absent) for value and null completions,
    /// and the stored error for exceptional completion or cancellation.
    pub fn get(&self) -> Result<Option<T>, Error> {
        let mut core = self.shared.core.lock();
        loop {
            if let Some(outcome) = &core.outcome {
                return Outcome::clone(outcome).into_result();
            }
            self.shared.settled.wait(&mut core);
        }
    }

    /// Like [`get`](Response::get), but gives up after `timeout`.
    ///
    /// On expiry the response itself is completed exceptionally with the same
    /// [`Error::Timeout`] that is returned. A zero timeout waits for the
    /// smallest positive duration rather than failing outright.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Option<T>, Error> {
        let timeout = if timeout.is_zero() {
            Duration::from_nanos(1)
        } else {
            timeout
        };
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get();
        };

        let mut core = self.shared.core.lock();
        loop {
            if let Some(outcome) = &core.outcome {
                return Outcome::clone(outcome).into_result();
            }
            if self.shared.settled.wait_until(&mut core, deadline).timed_out() {
                break;
            }
        }
        drop(core);

        let error = Error::Timeout(timeout);
        if self.complete_with_error(error.clone()) {
            warn!(?timeout, "timed out waiting for response");
            return Err(error);
        }
        // Someone else completed it right at the deadline.
        self.get()
    }

    /// Returns the value if one is already present. Otherwise calls
    /// `fallback`, and if that yields a value, completes this response with
    /// it before returning it.
    ///
    /// When another producer wins the race to complete, its value is returned
    /// instead.
    pub fn get_now<F>(&self, fallback: F) -> Option<T>
    where
        F: FnOnce() -> Option<T>,
    {
        if let Some(value) = self.present_value() {
            return Some(value);
        }
        let value = fallback()?;
        if self.complete(Some(value.clone())) {
            return Some(value);
        }
        self.present_value().or(Some(value))
    }

    fn present_value(&self) -> Option<T> {
        let core = self.shared.core.lock();
        core.outcome
            .as_ref()
            .and_then(|outcome| outcome.value().cloned())
    }

    pub fn state(&self) -> State {
        self.shared
            .core
            .lock()
            .outcome
            .as_ref()
            .map_or(State::Uncompleted, |outcome| outcome.state())
    }

    /// Snapshot of the terminal outcome, or `None` while uncompleted.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.shared
            .core
            .lock()
            .outcome
            .as_ref()
            .map(|outcome| Outcome::clone(outcome))
    }

    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    /// True only for `CompletedExceptionally`; cancellation does not count.
    pub fn is_exceptionally(&self) -> bool {
        self.state().is_exceptionally()
    }

    /// Runs `task` now if the response is done, otherwise queues it for the
    /// transition. The decision is made under the same lock as `settle`, so
    /// every task runs exactly once.
    pub(crate) fn attach<F>(&self, guard: Guard, dispatch: Dispatch, action: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let task = CallbackTask::new(guard, dispatch, action);
        let outcome = {
            let mut core = self.shared.core.lock();
            match core.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    trace!(?guard, ?dispatch, "queued response callback");
                    core.pending.push(task);
                    return;
                }
            }
        };
        trace!(?guard, ?dispatch, "running response callback now");
        task.run(&outcome, self.executor());
    }

    fn settle(&self, state: State, value: Option<T>, error: Option<Error>) -> bool {
        let (outcome, pending, wakers) = {
            let mut core = self.shared.core.lock();
            if core.outcome.is_some() {
                return false;
            }
            let outcome = Arc::new(Outcome::new(state, value, error));
            core.outcome = Some(Arc::clone(&outcome));
            (
                outcome,
                mem::take(&mut core.pending),
                mem::take(&mut core.wakers),
            )
        };
        self.shared.settled.notify_all();
        debug!(
            from = %State::Uncompleted,
            to = %state,
            callbacks = pending.len(),
            "response settled"
        );

        for waker in wakers {
            waker.wake();
        }
        let config = &self.shared.config;
        config.fire_complete(state);
        if let (State::CompletedExceptionally, Some(error)) = (state, outcome.error()) {
            config.fire_error(error);
        }
        for task in pending {
            task.run(&outcome, self.executor());
        }
        true
    }

    pub(crate) fn config(&self) -> Arc<ResponseConfig> {
        Arc::clone(&self.shared.config)
    }

    fn executor(&self) -> &dyn Executor {
        match &self.shared.config.executor {
            Some(shared) => shared.as_ref(),
            None => self.shared.private_pool.get_or_init(ThreadPool::new),
        }
    }
}

impl<T> Default for Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Future for Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<Option<T>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut core = self.shared.core.lock();
        match &core.outcome {
            Some(outcome) => Poll::Ready(Outcome::clone(outcome).into_result()),
            None => {
                if !core.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    core.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        let state = core
            .outcome
            .as_ref()
            .map_or(State::Uncompleted, |outcome| outcome.state());
        f.debug_struct("Response")
            .field("state", &state)
            .field("pending", &core.pending.len())
            .finish()
    }
}
