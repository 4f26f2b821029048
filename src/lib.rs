//! A thread-safe completion cell with three kinds of result: a value, an
//! absent value, or an error. Cancellation is a fourth terminal state.
//!
//! ```
//! use response_out::Response;
//! use std::thread;
//!
//! let response = Response::<u32>::new();
//! let label = response.map(|v| format!("got {v}"));
//! response.if_absent(|| println!("nothing arrived"));
//!
//! let producer = response.clone();
//! thread::spawn(move || producer.complete(Some(42)))
//!     .join()
//!     .expect("The producer thread has panicked");
//!
//! assert_eq!(label.get().unwrap().as_deref(), Some("got 42"));
//! ```
//!
//! Responses are also futures:
//!
//! ```
//! use response_out::Response;
//! use futures::executor::block_on;
//!
//! let response = Response::completed(Some("🍓"));
//! assert_eq!(block_on(response).unwrap(), Some("🍓"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub mod aggregate;
pub mod callback;
mod combinator;
pub mod config;
pub mod executor;
mod response;
pub mod state;

pub use aggregate::{collect, exceptionally_of, first, MultiResponse};
pub use callback::{Dispatch, Guard};
pub use config::{ResponseConfig, ResponseConfigBuilder, ResponseFactory};
pub use executor::{Executor, Job, ThreadPool, ThreadPoolBuilder};
pub use response::Response;
pub use state::{Outcome, State};

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("response was cancelled")]
    Cancelled,
    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),
    #[error("response completed without a value")]
    Absent,
    #[error("no response present")]
    NoResponsePresent,
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps any error type.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    /// Cancellation and timeouts interrupt a wait rather than report a
    /// failed computation.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout(_))
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message(message.to_string())
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message)
    }
}
