//! Factory and configuration surface: a shared executor plus lifecycle hooks.
//!
//! ```
//! use response_out::{ResponseConfig, ThreadPool};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let created = Arc::new(AtomicUsize::new(0));
//! let counter = created.clone();
//! let factory = ResponseConfig::builder()
//!     .executor(ThreadPool::builder().max_workers(4).build())
//!     .on_create(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .factory();
//!
//! let response = factory.create::<u32>();
//! response.complete(Some(7));
//! assert_eq!(response.get().unwrap(), Some(7));
//! assert_eq!(created.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::callback::capture;
use crate::executor::Executor;
use crate::state::State;
use crate::{Error, Response};

pub type CreateHook = Arc<dyn Fn() + Send + Sync>;
pub type CompleteHook = Arc<dyn Fn(State) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Settings shared by every response minted from one [`ResponseFactory`].
///
/// The default has no hooks and no shared executor, so each response
/// lazily creates a private [`ThreadPool`](crate::ThreadPool) the first
/// time it dispatches async work.
#[derive(Clone, Default)]
pub struct ResponseConfig {
    pub(crate) executor: Option<Arc<dyn Executor>>,
    on_create: Option<CreateHook>,
    on_complete: Option<CompleteHook>,
    on_error: Option<ErrorHook>,
}

impl ResponseConfig {
    pub fn builder() -> ResponseConfigBuilder {
        ResponseConfigBuilder::default()
    }

    pub(crate) fn fire_create(&self) {
        if let Some(hook) = &self.on_create {
            run_hook("on_create", || hook());
        }
    }

    pub(crate) fn fire_complete(&self, state: State) {
        if let Some(hook) = &self.on_complete {
            run_hook("on_complete", || hook(state));
        }
    }

    pub(crate) fn fire_error(&self, error: &Error) {
        if let Some(hook) = &self.on_error {
            run_hook("on_error", || hook(error));
        }
    }
}

fn run_hook(name: &'static str, hook: impl FnOnce()) {
    if let Err(err) = capture(hook) {
        warn!(hook = name, error = %err, "response lifecycle hook panicked");
    }
}

impl fmt::Debug for ResponseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseConfig")
            .field("shared_executor", &self.executor.is_some())
            .field("on_create", &self.on_create.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct ResponseConfigBuilder {
    config: ResponseConfig,
}

impl ResponseConfigBuilder {
    /// Use `executor` for every response instead of a private pool each.
    pub fn executor(self, executor: impl Executor + 'static) -> Self {
        self.shared_executor(Arc::new(executor))
    }

    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.config.executor = Some(executor);
        self
    }

    /// Invoked once per response, right after it is created.
    pub fn on_create(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.on_create = Some(Arc::new(hook));
        self
    }

    /// Invoked once when a response reaches any terminal state.
    pub fn on_complete(mut self, hook: impl Fn(State) + Send + Sync + 'static) -> Self {
        self.config.on_complete = Some(Arc::new(hook));
        self
    }

    /// Invoked once when a response completes exceptionally.
    pub fn on_error(mut self, hook: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.config.on_error = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ResponseConfig {
        self.config
    }

    pub fn factory(self) -> ResponseFactory {
        ResponseFactory::new(self.build())
    }
}

/// Mints responses of any value type that share one [`ResponseConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResponseFactory {
    config: Arc<ResponseConfig>,
}

impl ResponseFactory {
    pub fn new(config: ResponseConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    pub fn create<T>(&self) -> Response<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Response::from_config(Arc::clone(&self.config))
    }

    pub fn completed<T>(&self, value: Option<T>) -> Response<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let response = self.create();
        response.complete(value);
        response
    }

    pub fn exceptionally<T>(&self, error: impl Into<Error>) -> Response<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let response = self.create();
        response.complete_with_error(error);
        response
    }
}
