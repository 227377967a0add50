//! Worker-pool abstraction behind the accept loop.
//!
//! All three blocking backends expose the same capability: submit a unit of
//! work, get back a cancellable handle, and observe rejection when the pool
//! is saturated. The backends differ only in how workers are provisioned.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Cooperative cancellation signal handed to every dispatched job.
///
/// Cancellation is a one-way latch: once fired it stays fired. Waiters
/// blocked in [`CancelToken::wait_timeout`] are woken immediately.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        *cancelled = true;
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().unwrap()
    }

    /// Blocks for up to `dur`, or until the token fires.
    ///
    /// Returns `true` if the token was cancelled before the wait elapsed.
    pub fn wait_timeout(&self, dur: Duration) -> bool {
        let guard = self.inner.cancelled.lock().unwrap();
        let (cancelled, _) = self
            .inner
            .cond
            .wait_timeout_while(guard, dur, |cancelled| !*cancelled)
            .unwrap();
        *cancelled
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one in-flight unit of work, shared between the handler running
/// the job and the watchdog racing it.
///
/// The `completed` flag is a single-fire guard: exactly one side wins
/// [`TaskHandle::try_claim`] and gets to write on the connection. The loser
/// is a no-op.
#[derive(Clone)]
pub struct TaskHandle {
    token: CancelToken,
    completed: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attempts to claim the right to write the response. First caller wins.
    pub fn try_claim(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_done(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One dispatched unit of work.
pub type Job = Box<dyn FnOnce(TaskHandle) + Send + 'static>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("worker pool saturated")]
    Saturated,
    #[error("worker pool shutting down")]
    ShuttingDown,
}

/// The capability the accept loop dispatches through.
pub trait WorkerPool: Send + Sync {
    /// Submits a job for execution, returning its cancellable handle, or a
    /// rejection when the pool cannot take more work.
    fn submit(&self, job: Job) -> Result<TaskHandle, SubmitError>;

    /// Stops accepting new work. Already-submitted jobs may finish or be
    /// abandoned; best effort only.
    fn shutdown(&self);
}

/// Fixed number of workers over a bounded queue. A full queue rejects
/// submissions, which is the admission-control signal.
pub struct FixedPool {
    tx: Mutex<Option<Sender<(Job, TaskHandle)>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl FixedPool {
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = bounded::<(Job, TaskHandle)>(queue_depth);

        let handles = (0..workers)
            .map(|i| {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("worker-{i}"))
                    .spawn(move || {
                        while let Ok((job, handle)) = rx.recv() {
                            job(handle);
                        }
                    })
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }
}

impl WorkerPool for FixedPool {
    fn submit(&self, job: Job) -> Result<TaskHandle, SubmitError> {
        let handle = TaskHandle::new();
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(SubmitError::ShuttingDown)?;
        match tx.try_send((job, handle.clone())) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Full(_)) => Err(SubmitError::Saturated),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShuttingDown),
        }
    }

    fn shutdown(&self) {
        // Closing the queue lets workers drain what was already submitted
        self.tx.lock().unwrap().take();
        let handles: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// Grows a worker per burst of demand; idle workers linger for a while and
/// then expire. Never reports saturation.
pub struct CachedPool {
    tx: Mutex<Option<Sender<(Job, TaskHandle)>>>,
    rx: Receiver<(Job, TaskHandle)>,
    idle: Arc<AtomicUsize>,
    idle_ttl: Duration,
}

const CACHED_IDLE_TTL: Duration = Duration::from_secs(30);

impl CachedPool {
    pub fn new() -> Self {
        Self::with_idle_ttl(CACHED_IDLE_TTL)
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            idle: Arc::new(AtomicUsize::new(0)),
            idle_ttl,
        }
    }

    /// Returns false when the OS refuses another thread; the caller must
    /// reject the submission rather than strand it on the queue.
    fn spawn_worker(&self) -> bool {
        let rx = self.rx.clone();
        let idle = Arc::clone(&self.idle);
        let ttl = self.idle_ttl;
        let spawned = thread::Builder::new()
            .name("cached-worker".to_string())
            .spawn(move || {
                loop {
                    idle.fetch_add(1, Ordering::Relaxed);
                    let received = rx.recv_timeout(ttl);
                    idle.fetch_sub(1, Ordering::Relaxed);
                    match received {
                        Ok((job, handle)) => job(handle),
                        // idle expiry or pool shutdown
                        Err(_) => break,
                    }
                }
            });
        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to spawn cached worker: {e}");
                false
            }
        }
    }
}

impl Default for CachedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for CachedPool {
    fn submit(&self, job: Job) -> Result<TaskHandle, SubmitError> {
        let handle = TaskHandle::new();
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(SubmitError::ShuttingDown)?;
        // Make sure a worker exists before queueing, so a failed spawn
        // rejects the job instead of stranding it. The idle check races
        // with workers picking up jobs; the worst case is one surplus
        // worker, which simply expires later
        if self.idle.load(Ordering::Relaxed) == 0 && !self.spawn_worker() {
            return Err(SubmitError::Saturated);
        }
        tx.send((job, handle.clone()))
            .map_err(|_| SubmitError::ShuttingDown)?;
        Ok(handle)
    }

    fn shutdown(&self) {
        // Disconnecting the queue makes every worker's recv fail and exit
        self.tx.lock().unwrap().take();
    }
}

/// One dedicated thread per submitted job. The per-task analog of the other
/// backends: no queue, so it never saturates.
pub struct SpawnPool {
    stopped: AtomicBool,
}

impl SpawnPool {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
        }
    }
}

impl Default for SpawnPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool for SpawnPool {
    fn submit(&self, job: Job) -> Result<TaskHandle, SubmitError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(SubmitError::ShuttingDown);
        }
        let handle = TaskHandle::new();
        let job_handle = handle.clone();
        let spawned = thread::Builder::new()
            .name("task-worker".to_string())
            .spawn(move || job(job_handle));
        match spawned {
            Ok(_) => Ok(handle),
            // Out of OS threads: reject so the caller can 503 the peer
            Err(e) => {
                warn!("Failed to spawn task worker: {e}");
                Err(SubmitError::Saturated)
            }
        }
    }

    fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            info!("Per-task pool stopped accepting work");
        }
    }
}
