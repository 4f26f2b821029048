//! Combinators over many responses.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::state::State;
use crate::{Error, Response};

/// Successes and failures gathered by [`collect`], in completion order.
#[derive(Debug, Clone)]
pub struct MultiResponse<T> {
    successes: Vec<T>,
    failures: Vec<Error>,
}

impl<T> Default for MultiResponse<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> MultiResponse<T> {
    pub fn successes(&self) -> &[T] {
        &self.successes
    }

    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn into_parts(self) -> (Vec<T>, Vec<Error>) {
        (self.successes, self.failures)
    }
}

/// A response that is already completed exceptionally with `error`.
pub fn exceptionally_of<T>(error: impl Into<Error>) -> Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    let response = Response::new();
    response.complete_with_error(error);
    response
}

/// A response that is already completed with `value`.
pub fn completed_of<T>(value: Option<T>) -> Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    Response::completed(value)
}

/// Waits for every input and partitions the outcomes.
///
/// Inputs completed with a value count as successes. Every other terminal
/// state is a failure carrying its stored error, or [`Error::Absent`] when
/// there is none. Cancelling the returned response abandons the wait.
///
/// ```
/// use response_out::{aggregate, Response};
///
/// let a = Response::completed(Some(5));
/// let b = Response::<i32>::completed(None);
/// let all = aggregate::collect(&[a, b]).get().unwrap().unwrap();
/// assert_eq!(all.successes(), &[5]);
/// assert_eq!(all.count(), 2);
/// ```
pub fn collect<T>(responses: &[Response<T>]) -> Response<MultiResponse<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let outer = Response::new();
    let total = responses.len();
    if total == 0 {
        outer.complete(Some(MultiResponse::default()));
        return outer;
    }

    let gathered = Arc::new(Mutex::new(MultiResponse::default()));
    for response in responses {
        let gathered = Arc::clone(&gathered);
        let outer = outer.clone();
        response.peek(move |outcome| {
            let finished = {
                let mut multi = gathered.lock();
                match (outcome.state(), outcome.value()) {
                    (State::CompletedWithValue, Some(value)) => multi.successes.push(value.clone()),
                    _ => multi
                        .failures
                        .push(outcome.error().cloned().unwrap_or(Error::Absent)),
                }
                if multi.count() == total {
                    Some(mem::take(&mut *multi))
                } else {
                    None
                }
            };
            if let Some(multi) = finished {
                debug!(
                    successes = multi.successes.len(),
                    failures = multi.failures.len(),
                    "collected responses"
                );
                outer.complete(Some(multi));
            }
        });
    }
    outer
}

/// Completes with the first value any input produces.
///
/// Absent and failed inputs are skipped. If every input finishes without a
/// value, the returned response fails with [`Error::NoResponsePresent`].
pub fn first<T>(responses: &[Response<T>]) -> Response<T>
where
    T: Clone + Send + Sync + 'static,
{
    let outer = Response::new();
    let total = responses.len();
    if total == 0 {
        outer.complete_with_error(Error::NoResponsePresent);
        return outer;
    }

    let finished = Arc::new(AtomicUsize::new(0));
    for (index, response) in responses.iter().enumerate() {
        let winner = outer.clone();
        let counted = outer.clone();
        let finished = Arc::clone(&finished);
        // Registered in this order so a value is always offered before the
        // input is counted as finished.
        response
            .if_present(move |value| {
                winner.complete(Some(value.clone()));
            })
            .if_exceptionally(move |error| {
                debug!(index, %error, "first: input failed");
            })
            .run(move || {
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                if done == total && counted.complete_with_error(Error::NoResponsePresent) {
                    debug!(total, "first: no input produced a value");
                }
            });
    }
    outer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn collect_of_nothing_is_empty() {
        let all = collect::<i32>(&[]).get().unwrap().unwrap();
        assert_eq!(all.count(), 0);
    }

    #[test]
    fn first_of_nothing_fails() {
        assert!(matches!(
            first::<i32>(&[]).get(),
            Err(Error::NoResponsePresent)
        ));
    }

    #[test]
    fn collect_records_cancellation_as_failure() {
        let cancelled = Response::<i32>::new();
        cancelled.cancel();
        let all = collect(&[cancelled]).get().unwrap().unwrap();
        assert!(matches!(all.failures(), [Error::Cancelled]));
    }

    #[test]
    fn cancelling_collect_abandons_wait() {
        let never = Response::<i32>::new();
        let outer = collect(&[never.clone()]);
        assert!(outer.cancel());
        never.complete(Some(1));
        assert!(outer.is_cancelled());
        assert!(matches!(outer.get(), Err(Error::Cancelled)));
    }

    #[test]
    fn first_with_only_failures_reports_none_present() {
        let a = exceptionally_of::<i32>("a failed");
        let b = completed_of::<i32>(None);
        assert!(matches!(first(&[a, b]).get(), Err(Error::NoResponsePresent)));
    }

    #[test]
    fn first_takes_earliest_value() {
        let slow = Response::new();
        let fast = Response::new();
        let winner = first(&[slow.clone(), fast.clone()]);
        fast.complete(Some("fast"));
        let producer = slow.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete(Some("slow"));
        });
        assert_eq!(winner.get().unwrap(), Some("fast"));
    }
}
