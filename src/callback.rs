use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::executor::Executor;
use crate::state::{Outcome, State};
use crate::Error;

/// Which terminal states a callback task applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    OnValue,
    OnAbsent,
    OnError,
    OnAbsentOrError,
}

impl Guard {
    pub fn admits(self, state: State) -> bool {
        match self {
            Guard::Always => true,
            Guard::OnValue => state == State::CompletedWithValue,
            Guard::OnAbsent => state == State::CompletedWithNull,
            Guard::OnError => state == State::CompletedExceptionally,
            Guard::OnAbsentOrError => {
                matches!(state, State::CompletedWithNull | State::CompletedExceptionally)
            }
        }
    }
}

/// Where a callback action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// On the completing thread, or inline on the attaching thread when the
    /// response is already done.
    Sync,
    /// Always on the response's executor.
    Async,
}

type Action<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

/// A guarded unit of work owned by a response until it runs exactly once.
pub(crate) struct CallbackTask<T> {
    guard: Guard,
    dispatch: Dispatch,
    action: Action<T>,
}

impl<T: Send + Sync + 'static> CallbackTask<T> {
    pub(crate) fn new<F>(guard: Guard, dispatch: Dispatch, action: F) -> Self
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        Self {
            guard,
            dispatch,
            action: Box::new(action),
        }
    }

    pub(crate) fn run(self, outcome: &Arc<Outcome<T>>, executor: &dyn Executor) {
        match self.dispatch {
            Dispatch::Sync => self.fire(outcome),
            Dispatch::Async => {
                let outcome = Arc::clone(outcome);
                executor.execute(Box::new(move || self.fire(&outcome)));
            }
        }
    }

    fn fire(self, outcome: &Outcome<T>) {
        if !self.guard.admits(outcome.state()) {
            return;
        }
        let action = self.action;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| action(outcome))) {
            error!(
                state = %outcome.state(),
                panic = %panic_message(panic.as_ref()),
                "response callback panicked"
            );
        }
    }
}

/// Runs `f`, turning a panic into [`Error::Panicked`].
pub(crate) fn capture<R>(f: impl FnOnce() -> R) -> Result<R, Error> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| Error::Panicked(panic_message(panic.as_ref())))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inline(job: crate::executor::Job) {
        job()
    }

    #[test]
    fn guards_admit_only_their_states() {
        use State::*;
        let cases = [
            (Guard::Always, vec![Cancelled, CompletedWithValue, CompletedWithNull, CompletedExceptionally]),
            (Guard::OnValue, vec![CompletedWithValue]),
            (Guard::OnAbsent, vec![CompletedWithNull]),
            (Guard::OnError, vec![CompletedExceptionally]),
            (Guard::OnAbsentOrError, vec![CompletedWithNull, CompletedExceptionally]),
        ];
        for (guard, admitted) in cases {
            for state in [Cancelled, CompletedWithValue, CompletedWithNull, CompletedExceptionally] {
                assert_eq!(guard.admits(state), admitted.contains(&state), "{guard:?} / {state}");
            }
        }
    }

    #[test]
    fn rejected_guard_skips_action() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let task = CallbackTask::<i32>::new(Guard::OnValue, Dispatch::Sync, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let outcome = Arc::new(Outcome::new(State::CompletedWithNull, None, None));
        task.run(&outcome, &inline);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_action_is_swallowed() {
        let task = CallbackTask::<i32>::new(Guard::Always, Dispatch::Async, |_| panic!("boom"));
        let outcome = Arc::new(Outcome::new(State::CompletedWithValue, Some(1), None));
        task.run(&outcome, &inline);
    }

    #[test]
    fn capture_reports_panic_message() {
        let err = capture(|| -> i32 { panic!("bad input") }).unwrap_err();
        assert!(matches!(err, Error::Panicked(ref m) if m == "bad input"));
        assert_eq!(capture(|| 7).unwrap(), 7);
    }
}
