//! Callback and chaining combinators.
//!
//! Every combinator attaches one guarded callback to the source response.
//! Side-effect combinators return the source for chaining and swallow (log)
//! panics from their closure. Transforming combinators return a new response
//! that the callback completes; a panic there completes the new response
//! exceptionally with [`Error::Panicked`].

use crate::callback::{capture, Dispatch, Guard};
use crate::state::Outcome;
use crate::{Error, Response};

impl<T> Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Observes the outcome, whatever it is.
    pub fn peek<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.attach(Guard::Always, Dispatch::Sync, f);
        self
    }

    pub fn peek_async<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.attach(Guard::Always, Dispatch::Async, f);
        self
    }

    /// Runs `f` once the response is done, ignoring the outcome.
    pub fn run<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.attach(Guard::Always, Dispatch::Sync, move |_| f());
        self
    }

    pub fn run_async<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.attach(Guard::Always, Dispatch::Async, move |_| f());
        self
    }

    pub fn if_present<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.on_value(Dispatch::Sync, f)
    }

    pub fn if_present_async<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.on_value(Dispatch::Async, f)
    }

    pub fn if_absent<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.attach(Guard::OnAbsent, Dispatch::Sync, move |_| f());
        self
    }

    pub fn if_absent_async<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.attach(Guard::OnAbsent, Dispatch::Async, move |_| f());
        self
    }

    /// Runs `f` with the error of an exceptionally completed response.
    /// Cancellation does not trigger it.
    pub fn if_exceptionally<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_error(Dispatch::Sync, f)
    }

    pub fn if_exceptionally_async<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_error(Dispatch::Async, f)
    }

    /// Maps a present value. Absent, failed and cancelled sources never
    /// complete the returned response.
    ///
    /// ```
    /// use response_out::Response;
    ///
    /// let response = Response::completed(Some(20));
    /// let doubled = response.map(|v| v * 2);
    /// assert_eq!(doubled.get().unwrap(), Some(40));
    /// ```
    pub fn map<U, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.map_with(Dispatch::Sync, move |value| Ok::<_, Error>(Some(f(value))))
    }

    pub fn map_async<U, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.map_with(Dispatch::Async, move |value| Ok::<_, Error>(Some(f(value))))
    }

    /// Like [`map`](Response::map), but `None` from `f` completes the new
    /// response absent.
    ///
    /// ```
    /// use response_out::{Response, State};
    ///
    /// let response = Response::completed(Some("x"));
    /// let parsed = response.map_opt(|s| s.parse::<i32>().ok());
    /// assert_eq!(parsed.state(), State::CompletedWithNull);
    /// ```
    pub fn map_opt<U, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> Option<U> + Send + 'static,
    {
        self.map_with(Dispatch::Sync, move |value| Ok::<_, Error>(f(value)))
    }

    pub fn map_opt_async<U, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> Option<U> + Send + 'static,
    {
        self.map_with(Dispatch::Async, move |value| Ok::<_, Error>(f(value)))
    }

    /// Like [`map`](Response::map), but an `Err` from `f` completes the new
    /// response exceptionally.
    pub fn try_map<U, E, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        E: Into<Error>,
        F: FnOnce(&T) -> Result<U, E> + Send + 'static,
    {
        self.map_with(Dispatch::Sync, move |value| f(value).map(Some))
    }

    pub fn try_map_async<U, E, F>(&self, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        E: Into<Error>,
        F: FnOnce(&T) -> Result<U, E> + Send + 'static,
    {
        self.map_with(Dispatch::Async, move |value| f(value).map(Some))
    }

    /// Keeps a present value if `predicate` holds, otherwise the new response
    /// completes absent.
    pub fn filter<P>(&self, predicate: P) -> Response<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        self.filter_with(Dispatch::Sync, predicate)
    }

    pub fn filter_async<P>(&self, predicate: P) -> Response<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        self.filter_with(Dispatch::Async, predicate)
    }

    /// Substitutes `supplier`'s value when the source completes absent.
    pub fn use_if_absent<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnAbsent, Dispatch::Sync, supplier)
    }

    pub fn use_if_absent_async<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnAbsent, Dispatch::Async, supplier)
    }

    /// Substitutes `supplier`'s value when the source completes exceptionally.
    pub fn use_if_exceptionally<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnError, Dispatch::Sync, supplier)
    }

    pub fn use_if_exceptionally_async<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnError, Dispatch::Async, supplier)
    }

    /// Substitutes `supplier`'s value when the source completes absent or
    /// exceptionally.
    pub fn else_use<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnAbsentOrError, Dispatch::Sync, supplier)
    }

    pub fn else_use_async<S>(&self, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        self.fallback_with(Guard::OnAbsentOrError, Dispatch::Async, supplier)
    }

    fn on_value<F>(&self, dispatch: Dispatch, f: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.attach(Guard::OnValue, dispatch, move |outcome| {
            if let Some(value) = outcome.value() {
                f(value);
            }
        });
        self
    }

    fn on_error<F>(&self, dispatch: Dispatch, f: F) -> &Self
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.attach(Guard::OnError, dispatch, move |outcome| {
            if let Some(error) = outcome.error() {
                f(error);
            }
        });
        self
    }

    fn derived<U>(&self) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        Response::from_config(self.config())
    }

    fn map_with<U, E, F>(&self, dispatch: Dispatch, f: F) -> Response<U>
    where
        U: Clone + Send + Sync + 'static,
        E: Into<Error>,
        F: FnOnce(&T) -> Result<Option<U>, E> + Send + 'static,
    {
        let mapped = self.derived();
        let target = mapped.clone();
        self.attach(Guard::OnValue, dispatch, move |outcome| {
            let Some(value) = outcome.value() else {
                return;
            };
            match capture(|| f(value)) {
                Ok(Ok(mapped)) => target.complete(mapped),
                Ok(Err(err)) => target.complete_with_error(err),
                Err(panic) => target.complete_with_error(panic),
            };
        });
        mapped
    }

    fn filter_with<P>(&self, dispatch: Dispatch, predicate: P) -> Response<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        let filtered = self.derived();
        let target = filtered.clone();
        self.attach(Guard::OnValue, dispatch, move |outcome| {
            let Some(value) = outcome.value() else {
                return;
            };
            match capture(|| predicate(value)) {
                Ok(true) => target.complete(Some(value.clone())),
                Ok(false) => target.complete(None),
                Err(panic) => target.complete_with_error(panic),
            };
        });
        filtered
    }

    fn fallback_with<S>(&self, guard: Guard, dispatch: Dispatch, supplier: S) -> Response<T>
    where
        S: FnOnce() -> T + Send + 'static,
    {
        let fallback = self.derived();
        let target = fallback.clone();
        self.attach(guard, dispatch, move |outcome| {
            // The state says absent/failed, but only supply for an actually missing value.
            if outcome.value().is_some() {
                return;
            }
            match capture(supplier) {
                Ok(value) => target.complete(Some(value)),
                Err(panic) => target.complete_with_error(panic),
            };
        });
        fallback
    }
}
