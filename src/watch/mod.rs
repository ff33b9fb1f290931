//! Staging-folder watcher
//!
//! Runs a supervised loop on its own thread:
//!
//! ```text
//! Registered -> Waiting -> Dispatching -> Waiting -> ...
//!                  |
//!                  +-- stop signal / subscription ended --> ShuttingDown -> Stopped
//! ```
//!
//! Every creation event is handed to the watcher's worker pool, where the
//! staging folder is recounted and the arrival journalled. The loop never
//! moves files.

pub mod source;

pub use source::{EventSource, NotifySource, WatchEvent, WatchEventKind};

use crate::counter::FileCounter;
use crate::diagnostics::ProcessSnapshot;
use crate::error::Result;
use crate::journal::CountJournal;
use crate::pool::{ShutdownReport, WorkerPool};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LOOP_THREAD_NAME: &str = "staging-watcher";

/// Lifecycle of an [`EventWatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Registered,
    Waiting,
    Dispatching,
    ShuttingDown,
    Stopped,
}

/// Watches the staging folder for new entries
pub struct EventWatcher {
    dir: PathBuf,
    pool: Arc<WorkerPool>,
    grace: Duration,
    state: Arc<Mutex<WatcherState>>,
    stop_tx: Sender<()>,
    source: Mutex<Box<dyn EventSource>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    report: Mutex<Option<ShutdownReport>>,
}

impl EventWatcher {
    /// Subscribe to `dir` through `source` and start the watch loop.
    ///
    /// Fails only if the subscription cannot be opened or the loop thread
    /// cannot be spawned.
    pub fn start(
        dir: impl Into<PathBuf>,
        mut source: Box<dyn EventSource>,
        pool: Arc<WorkerPool>,
        counter: Arc<FileCounter>,
        journal: Arc<CountJournal>,
        grace: Duration,
    ) -> Result<Self> {
        let dir = dir.into();
        let events = source.subscribe(&dir)?;
        let state = Arc::new(Mutex::new(WatcherState::Registered));
        let (stop_tx, stop_rx) = bounded(1);

        let worker = WatchLoop {
            dir: dir.clone(),
            events,
            stop: stop_rx,
            pool: Arc::clone(&pool),
            counter,
            journal,
            state: Arc::clone(&state),
        };
        let handle = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || worker.run())?;

        info!(dir = %dir.display(), pool = pool.name(), "Watching staging folder");
        ProcessSnapshot::capture().log();

        Ok(Self {
            dir,
            pool,
            grace,
            state,
            stop_tx,
            source: Mutex::new(source),
            handle: Mutex::new(Some(handle)),
            report: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the loop, end the subscription and drain the dispatch pool
    /// within the grace period. Later calls return the first report.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = *report {
            return done;
        }

        set_state(&self.state, WatcherState::ShuttingDown);
        let _ = self.stop_tx.try_send(());
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Watch loop panicked");
        }
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let done = self.pool.shutdown(self.grace);
        set_state(&self.state, WatcherState::Stopped);
        info!(dir = %self.dir.display(), drained = done.drained, "Watcher stopped");
        *report = Some(done);
        done
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn set_state(state: &Mutex<WatcherState>, next: WatcherState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

struct WatchLoop {
    dir: PathBuf,
    events: Receiver<WatchEvent>,
    stop: Receiver<()>,
    pool: Arc<WorkerPool>,
    counter: Arc<FileCounter>,
    journal: Arc<CountJournal>,
    state: Arc<Mutex<WatcherState>>,
}

impl WatchLoop {
    fn run(self) {
        loop {
            set_state(&self.state, WatcherState::Waiting);
            select! {
                recv(self.stop) -> _ => {
                    debug!("Watch loop received stop signal");
                    break;
                },
                recv(self.events) -> first => {
                    let Ok(first) = first else {
                        info!(dir = %self.dir.display(), "Watch subscription closed");
                        break;
                    };
                    set_state(&self.state, WatcherState::Dispatching);
                    let pending: Vec<WatchEvent> =
                        std::iter::once(first).chain(self.events.try_iter()).collect();
                    if !self.dispatch_all(pending) {
                        warn!(dir = %self.dir.display(), "Watched folder is no longer valid");
                        break;
                    }
                },
            }
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != WatcherState::ShuttingDown {
            *state = WatcherState::Stopped;
        }
    }

    /// Dispatch one drained batch. Returns false once the subscription is
    /// no longer valid.
    fn dispatch_all(&self, pending: Vec<WatchEvent>) -> bool {
        let mut valid = true;
        for event in pending {
            match event.kind {
                WatchEventKind::Overflow => {
                    debug!("Skipping overflow notification");
                }
                WatchEventKind::Invalidated => valid = false,
                WatchEventKind::Created => self.dispatch(event.path),
            }
        }
        valid
    }

    fn dispatch(&self, path: PathBuf) {
        let counter = Arc::clone(&self.counter);
        let journal = Arc::clone(&self.journal);
        let submitted = self.pool.submit(move || match counter.count() {
            Ok(remaining) => {
                debug!(file = %path.display(), remaining, "New arrival");
                journal.record_arrival(&path, remaining);
            }
            Err(e) => error!(file = %path.display(), error = %e, "Failed to count staging folder"),
        });
        if let Err(e) = submitted {
            debug!(error = %e, "Dropping arrival, dispatch pool is closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use std::time::Instant;
    use tempfile::{TempDir, tempdir};

    /// Event source driven directly by the test
    struct ChannelSource {
        events: Option<Receiver<WatchEvent>>,
        fail: bool,
    }

    impl EventSource for ChannelSource {
        fn subscribe(&mut self, _dir: &Path) -> Result<Receiver<WatchEvent>> {
            if self.fail {
                return Err(Error::Config("cannot register".into()));
            }
            self.events
                .take()
                .ok_or_else(|| Error::Config("already subscribed".into()))
        }

        fn cancel(&mut self) {}
    }

    fn channel_source() -> (Sender<WatchEvent>, Box<dyn EventSource>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            tx,
            Box::new(ChannelSource {
                events: Some(rx),
                fail: false,
            }),
        )
    }

    fn start(dir: &TempDir, source: Box<dyn EventSource>) -> (EventWatcher, PathBuf) {
        let log = dir.path().join("remaining.log");
        let staging = dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let watcher = EventWatcher::start(
            &staging,
            source,
            Arc::new(WorkerPool::new("watch-test", 2).unwrap()),
            Arc::new(FileCounter::new(&staging)),
            Arc::new(CountJournal::new(&log)),
            Duration::from_secs(5),
        )
        .unwrap();
        (watcher, log)
    }

    fn wait_for_lines(log: &Path, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let lines: Vec<String> = fs::read_to_string(log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect();
            if lines.len() >= count || Instant::now() >= deadline {
                return lines;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_creation_is_journalled_with_count() {
        let dir = tempdir().unwrap();
        let (tx, source) = channel_source();
        let (watcher, log) = start(&dir, source);

        let file = watcher.dir().join("c.png");
        fs::write(&file, b"x").unwrap();
        tx.send(WatchEvent::created(&file)).unwrap();

        let lines = wait_for_lines(&log, 1);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("New files added: c.png; Remaining unclassified images: 1"));
        assert!(file.exists());

        watcher.shutdown();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_overflow_is_skipped() {
        let dir = tempdir().unwrap();
        let (tx, source) = channel_source();
        let (watcher, log) = start(&dir, source);

        tx.send(WatchEvent {
            path: watcher.dir().to_path_buf(),
            kind: WatchEventKind::Overflow,
        })
        .unwrap();
        tx.send(WatchEvent::created(watcher.dir().join("d.png"))).unwrap();

        let lines = wait_for_lines(&log, 1);
        watcher.shutdown();
        let lines_after = fs::read_to_string(&log).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines_after.lines().count(), 1);
        assert!(lines[0].contains("d.png"));
    }

    #[test]
    fn test_invalidated_subscription_stops_loop() {
        let dir = tempdir().unwrap();
        let (tx, source) = channel_source();
        let (watcher, _log) = start(&dir, source);

        tx.send(WatchEvent {
            path: watcher.dir().to_path_buf(),
            kind: WatchEventKind::Invalidated,
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while watcher.state() != WatcherState::Stopped && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_closed_channel_stops_loop() {
        let dir = tempdir().unwrap();
        let (tx, source) = channel_source();
        let (watcher, _log) = start(&dir, source);

        drop(tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        while watcher.state() != WatcherState::Stopped && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let dir = tempdir().unwrap();
        let (_tx, source) = channel_source();
        let (watcher, _log) = start(&dir, source);

        let first = watcher.shutdown();
        let second = watcher.shutdown();
        assert_eq!(first, second);
        assert!(first.drained);
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }

    #[test]
    fn test_registration_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let result = EventWatcher::start(
            dir.path(),
            Box::new(ChannelSource {
                events: None,
                fail: true,
            }),
            Arc::new(WorkerPool::new("watch-fail", 1).unwrap()),
            Arc::new(FileCounter::new(dir.path())),
            Arc::new(CountJournal::new(dir.path().join("remaining.log"))),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_count_is_contained() {
        let dir = tempdir().unwrap();
        let (tx, source) = channel_source();
        let (watcher, log) = start(&dir, source);

        fs::remove_dir_all(watcher.dir()).unwrap();
        tx.send(WatchEvent::created(watcher.dir().join("e.png"))).unwrap();
        tx.send(WatchEvent::created(watcher.dir().join("f.png"))).unwrap();

        let report = watcher.shutdown();
        assert!(report.drained);
        assert!(!log.exists());
    }

    #[test]
    fn test_real_backend_sees_new_file() {
        let dir = tempdir().unwrap();
        let (watcher, log) = start(&dir, Box::new(NotifySource::new()));

        fs::write(watcher.dir().join("c.png"), b"x").unwrap();

        let lines = wait_for_lines(&log, 1);
        watcher.shutdown();
        assert!(!lines.is_empty());
        assert!(lines[0].contains("c.png"));
        assert!(watcher.dir().join("c.png").exists());
    }
}
