//! Fixed-size worker pools shared by the mover and the watcher
//!
//! Each subsystem owns one named [`WorkerPool`]. Tasks are queued on a Rayon
//! thread pool; the wrapper adds the bookkeeping Rayon does not expose
//! (active/queued counts, refusal after shutdown, bounded drain on shutdown).

use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Point-in-time view of a pool, logged around each move batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPoolSnapshot {
    /// Tasks currently executing
    pub active: usize,
    /// Worker threads currently alive
    pub pool_size: usize,
    /// Threads the pool keeps alive
    pub core_size: usize,
    /// Upper bound on worker threads
    pub maximum_size: usize,
    /// Tasks submitted but not yet started
    pub queued: usize,
}

/// When a snapshot was taken relative to a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPhase {
    BeforeSubmitted,
    TaskFinished,
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotPhase::BeforeSubmitted => f.write_str("BEFORE_SUBMITTED"),
            SnapshotPhase::TaskFinished => f.write_str("TASK_FINISHED"),
        }
    }
}

/// Outcome of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// All queued and running work finished within the grace period
    pub drained: bool,
    /// Tasks still outstanding when the grace period ran out
    pub abandoned: usize,
}

#[derive(Default)]
struct PoolState {
    active: AtomicUsize,
    queued: AtomicUsize,
    live_threads: AtomicUsize,
    closed: AtomicBool,
    cancelled: AtomicBool,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl PoolState {
    fn outstanding(&self) -> usize {
        self.active.load(Ordering::SeqCst) + self.queued.load(Ordering::SeqCst)
    }

    fn notify(&self) {
        let _guard = self.idle_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.idle.notify_all();
    }
}

/// Decrements the active count when a task ends, including by panic
struct ActiveGuard<'a>(&'a PoolState);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.notify();
    }
}

/// A named, fixed-size pool of worker threads
pub struct WorkerPool {
    name: String,
    threads: usize,
    pool: rayon::ThreadPool,
    state: Arc<PoolState>,
    report: Mutex<Option<ShutdownReport>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("threads", &self.threads)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with `threads` workers named `<name>-<n>`
    pub fn new(name: impl Into<String>, threads: usize) -> Result<Self> {
        let name = name.into();
        let threads = threads.max(1);
        let state = Arc::new(PoolState::default());

        let thread_prefix = name.clone();
        let panic_pool = name.clone();
        let started = Arc::clone(&state);
        let exited = Arc::clone(&state);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", thread_prefix, i + 1))
            .start_handler(move |_| {
                started.live_threads.fetch_add(1, Ordering::SeqCst);
            })
            .exit_handler(move |_| {
                exited.live_threads.fetch_sub(1, Ordering::SeqCst);
            })
            .panic_handler(move |_| {
                error!(pool = %panic_pool, "Worker task panicked");
            })
            .build()?;

        debug!(pool = %name, threads, "Worker pool created");

        Ok(Self {
            name,
            threads,
            pool,
            state,
            report: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a task. Fails once the pool has been shut down.
    ///
    /// A task that is cancelled before it starts is dropped without running,
    /// so anything it owns is still released.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(Error::PoolClosed {
                pool: self.name.clone(),
            });
        }

        self.state.queued.fetch_add(1, Ordering::SeqCst);
        let state = Arc::clone(&self.state);
        self.pool.spawn(move || {
            if state.cancelled.load(Ordering::SeqCst) {
                state.queued.fetch_sub(1, Ordering::SeqCst);
                state.notify();
                drop(task);
                return;
            }
            state.active.fetch_add(1, Ordering::SeqCst);
            state.queued.fetch_sub(1, Ordering::SeqCst);
            let _active = ActiveGuard(&state);
            task();
        });
        Ok(())
    }

    pub fn snapshot(&self) -> ThreadPoolSnapshot {
        ThreadPoolSnapshot {
            active: self.state.active.load(Ordering::SeqCst),
            pool_size: self.state.live_threads.load(Ordering::SeqCst),
            core_size: self.threads,
            maximum_size: self.threads,
            queued: self.state.queued.load(Ordering::SeqCst),
        }
    }

    /// Log the current snapshot tagged with `phase`
    pub fn log_snapshot(&self, phase: SnapshotPhase) {
        let snapshot = self.snapshot();
        info!(
            pool = %self.name,
            %phase,
            active = snapshot.active,
            pool_size = snapshot.pool_size,
            core_size = snapshot.core_size,
            maximum_size = snapshot.maximum_size,
            queued = snapshot.queued,
            "Thread pool status"
        );
    }

    /// Block until no task is queued or running, or `timeout` elapses.
    /// Returns true when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self
            .state
            .idle_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.state.outstanding() == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .state
                .idle
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting work, give outstanding tasks up to `grace` to finish,
    /// then cancel whatever has not started. Safe to call more than once;
    /// later calls return the first report.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = *report {
            return done;
        }

        self.state.closed.store(true, Ordering::SeqCst);
        let drained = self.wait_idle(grace);
        let abandoned = if drained {
            0
        } else {
            self.state.cancelled.store(true, Ordering::SeqCst);
            let outstanding = self.state.outstanding();
            warn!(
                pool = %self.name,
                outstanding,
                grace_secs = grace.as_secs(),
                "Grace period elapsed, cancelling remaining tasks"
            );
            outstanding
        };

        info!(pool = %self.name, drained, "Worker pool shut down");
        let done = ShutdownReport { drained, abandoned };
        *report = Some(done);
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_tasks_run_on_named_threads() {
        let pool = WorkerPool::new("test-pool", 2).unwrap();
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let tx = tx.clone();
            pool.submit(move || {
                let name = std::thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            })
            .unwrap();
        }
        for _ in 0..4 {
            let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
            assert!(name.starts_with("test-pool-"), "{}", name);
        }
    }

    #[test]
    fn test_snapshot_bounds() {
        let pool = WorkerPool::new("snap", 3).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.core_size, 3);
        assert_eq!(snapshot.maximum_size, 3);
        assert!(snapshot.active <= snapshot.maximum_size);
        assert!(snapshot.pool_size <= snapshot.maximum_size);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::new("closed", 1).unwrap();
        let report = pool.shutdown(Duration::from_secs(1));
        assert!(report.drained);
        assert!(pool.is_shut_down());
        assert!(matches!(pool.submit(|| {}), Err(Error::PoolClosed { .. })));
    }

    #[test]
    fn test_shutdown_waits_for_running_tasks() {
        let pool = WorkerPool::new("drain", 2).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(50));
                tx.send(i).unwrap();
            })
            .unwrap();
        }
        let report = pool.shutdown(Duration::from_secs(10));
        assert!(report.drained);
        assert_eq!(report.abandoned, 0);
        assert_eq!(rx.try_iter().count(), 4);
    }

    #[test]
    fn test_shutdown_cancels_queued_tasks_after_grace() {
        let pool = WorkerPool::new("slow", 1).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (ran_tx, ran_rx) = mpsc::channel();

        pool.submit(move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(10));
        })
        .unwrap();
        let queued_tx = ran_tx.clone();
        pool.submit(move || queued_tx.send("queued").unwrap()).unwrap();

        let report = pool.shutdown(Duration::from_millis(100));
        assert!(!report.drained);
        assert!(report.abandoned >= 1);

        release_tx.send(()).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert!(ran_rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = WorkerPool::new("twice", 1).unwrap();
        let first = pool.shutdown(Duration::from_secs(1));
        let second = pool.shutdown(Duration::from_secs(1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_panicking_task_does_not_wedge_pool() {
        let pool = WorkerPool::new("panics", 1).unwrap();
        pool.submit(|| panic!("boom")).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
        let (tx, rx) = mpsc::channel();
        pool.submit(move || tx.send(1).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    }
}
