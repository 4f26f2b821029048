use std::fmt;

use crate::Error;

/// Lifecycle state of a [`Response`](crate::Response).
///
/// `Uncompleted` is the only non-terminal state. Once a response leaves it,
/// the state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Uncompleted,
    Cancelled,
    CompletedWithValue,
    CompletedWithNull,
    CompletedExceptionally,
}

impl State {
    /// Any state other than `Uncompleted`.
    pub fn is_done(self) -> bool {
        self != State::Uncompleted
    }

    pub fn is_cancelled(self) -> bool {
        self == State::Cancelled
    }

    /// Only `CompletedExceptionally`. A cancelled response stores an error
    /// too, but is not reported here.
    pub fn is_exceptionally(self) -> bool {
        self == State::CompletedExceptionally
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Uncompleted => "uncompleted",
            State::Cancelled => "cancelled",
            State::CompletedWithValue => "completed-with-value",
            State::CompletedWithNull => "completed-with-null",
            State::CompletedExceptionally => "completed-exceptionally",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of a terminal response.
///
/// Handed to every callback so they can read the result without touching the
/// response's lock.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    state: State,
    value: Option<T>,
    error: Option<Error>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(state: State, value: Option<T>, error: Option<Error>) -> Self {
        Self { state, value, error }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Converts into the result a blocking `get` hands back: the value (maybe
    /// absent) for value/null states, the stored error otherwise.
    pub fn into_result(self) -> Result<Option<T>, Error> {
        match self.state {
            State::CompletedExceptionally | State::Cancelled => {
                Err(self.error.unwrap_or(Error::Absent))
            }
            _ => Ok(self.value),
        }
    }
}
