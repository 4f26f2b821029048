//! Worker pools used for `Async` callback dispatch and `complete_async`
//! producer work.
//!
//! Any `Fn(Job) + Send + Sync` closure is an [`Executor`], which makes it
//! easy to plug in an existing runtime. [`ThreadPool`] is the built-in one.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::callback::panic_message;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere other than the calling thread.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync,
{
    fn execute(&self, job: Job) {
        self(job)
    }
}

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// An on-demand pool: a job reuses an idle worker if one exists, otherwise a
/// new worker is spawned (up to `max_workers`, if set). Idle workers exit
/// after `keep_alive`. Dropping the pool lets every worker exit once the
/// queue is drained.
pub struct ThreadPool {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    shared: Arc<PoolShared>,
}

struct PoolShared {
    name: String,
    keep_alive: Duration,
    max_workers: Option<usize>,
    counts: Mutex<Counts>,
    next_id: AtomicUsize,
}

#[derive(Debug, Default)]
struct Counts {
    workers: usize,
    /// Workers parked in `recv` with no job reserved for them.
    idle: usize,
    /// Jobs queued while the pool was at `max_workers` with nobody idle.
    backlog: usize,
}

#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    name: String,
    keep_alive: Duration,
    max_workers: Option<usize>,
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self {
            name: "response-worker".to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            max_workers: None,
        }
    }
}

impl ThreadPoolBuilder {
    /// Prefix for worker thread names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Caps the number of live workers. A cap of zero is treated as one.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers.max(1));
        self
    }

    pub fn build(self) -> ThreadPool {
        let (sender, receiver) = unbounded();
        ThreadPool {
            sender,
            receiver,
            shared: Arc::new(PoolShared {
                name: self.name,
                keep_alive: self.keep_alive,
                max_workers: self.max_workers,
                counts: Mutex::new(Counts::default()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }
}

impl ThreadPool {
    /// Unbounded pool with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::default()
    }

    /// Number of live worker threads.
    pub fn workers(&self) -> usize {
        self.shared.counts.lock().workers
    }

    fn spawn_worker(&self) {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let receiver = self.receiver.clone();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.shared.name, id))
            .spawn(move || worker_loop(receiver, shared));
        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn pool worker, running job inline");
            self.shared.counts.lock().workers -= 1;
            if let Ok(job) = self.receiver.try_recv() {
                run_job(job);
            }
        } else {
            debug!(pool = %self.shared.name, id, "spawned pool worker");
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) {
        let spawn = {
            let mut counts = self.shared.counts.lock();
            if counts.idle > 0 {
                counts.idle -= 1;
                false
            } else if self.shared.max_workers.map_or(true, |max| counts.workers < max) {
                counts.workers += 1;
                true
            } else {
                counts.backlog += 1;
                false
            }
        };
        // We hold a receiver, so the channel is never disconnected here.
        let _ = self.sender.send(job);
        if spawn {
            self.spawn_worker();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.shared.name)
            .field("keep_alive", &self.shared.keep_alive)
            .field("max_workers", &self.shared.max_workers)
            .field("counts", &*self.shared.counts.lock())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Job>, shared: Arc<PoolShared>) {
    loop {
        match receiver.recv_timeout(shared.keep_alive) {
            Ok(job) => {
                run_job(job);
                let mut counts = shared.counts.lock();
                if counts.backlog > 0 {
                    counts.backlog -= 1;
                } else {
                    counts.idle += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut counts = shared.counts.lock();
                // idle == 0 means every idle worker has a job reserved; stay.
                if counts.idle > 0 {
                    counts.idle -= 1;
                    counts.workers -= 1;
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                shared.counts.lock().workers -= 1;
                break;
            }
        }
    }
    debug!(pool = %shared.name, "pool worker exiting");
}

fn run_job(job: Job) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
        error!(panic = %panic_message(panic.as_ref()), "pool job panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::Barrier;

    #[test]
    fn runs_jobs_off_thread() {
        let pool = ThreadPool::new();
        let (tx, rx) = channel();
        let caller = thread::current().id();
        pool.execute(Box::new(move || {
            tx.send(thread::current().id()).unwrap();
        }));
        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn grows_on_demand_for_blocked_jobs() {
        let pool = ThreadPool::new();
        let barrier = Arc::new(Barrier::new(4));
        let (tx, rx) = channel();
        for _ in 0..3 {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                barrier.wait();
                tx.send(()).unwrap();
            }));
        }
        barrier.wait();
        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(pool.workers() >= 3);
    }

    #[test]
    fn capped_pool_queues_excess_jobs() {
        let pool = ThreadPool::builder().name("capped").max_workers(1).build();
        let (tx, rx) = channel();
        for i in 0..5 {
            let tx = tx.clone();
            pool.execute(Box::new(move || tx.send(i).unwrap()));
        }
        let mut seen: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.workers(), 1);
    }

    #[test]
    fn idle_workers_exit_after_keep_alive() {
        let pool = ThreadPool::builder()
            .keep_alive(Duration::from_millis(20))
            .build();
        let (tx, rx) = channel();
        pool.execute(Box::new(move || tx.send(()).unwrap()));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.workers() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.workers(), 0);
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = ThreadPool::builder().max_workers(1).build();
        pool.execute(Box::new(|| panic!("job failure")));
        let (tx, rx) = channel();
        pool.execute(Box::new(move || tx.send(5).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
    }

    #[test]
    fn closures_are_executors() {
        let ran = Arc::new(AtomicUsize::new(0));
        let executor = |job: Job| job();
        let counter = Arc::clone(&ran);
        executor.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
