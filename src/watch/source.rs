//! Sources of creation events for one directory

use crate::error::Result;
use crossbeam_channel::{Receiver, unbounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a [`WatchEvent`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A new entry appeared in the directory
    Created,
    /// The backend dropped events; they cannot be recovered individually
    Overflow,
    /// The watched directory is gone and no further events will arrive
    Invalidated,
}

/// One notification for the watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: WatchEventKind::Created,
        }
    }
}

/// Subscription to creation events for a single directory.
///
/// Events are delivered on the returned channel; the channel disconnecting
/// means the subscription ended. Missed events are never reconciled.
pub trait EventSource: Send {
    fn subscribe(&mut self, dir: &Path) -> Result<Receiver<WatchEvent>>;

    /// End the subscription. Calling it again has no effect.
    fn cancel(&mut self);
}

/// [`EventSource`] backed by the platform's native notification API
#[derive(Default)]
pub struct NotifySource {
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSource for NotifySource {
    fn subscribe(&mut self, dir: &Path) -> Result<Receiver<WatchEvent>> {
        let (tx, rx) = unbounded();
        let root = dir.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for watch_event in translate(&root, event) {
                    if tx.send(watch_event).is_err() {
                        break;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Watch backend error"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        debug!(dir = %dir.display(), "Subscribed to creation events");
        self.watcher = Some(watcher);
        Ok(rx)
    }

    fn cancel(&mut self) {
        if self.watcher.take().is_some() {
            debug!("Watch subscription cancelled");
        }
    }
}

/// Reduce a backend event to the kinds the watcher cares about
fn translate(root: &Path, event: Event) -> Vec<WatchEvent> {
    if event.need_rescan() {
        return vec![WatchEvent {
            path: root.to_path_buf(),
            kind: WatchEventKind::Overflow,
        }];
    }

    let resolve = |path: PathBuf| {
        if path.is_relative() {
            root.join(path)
        } else {
            path
        }
    };

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .into_iter()
            .map(|p| WatchEvent::created(resolve(p)))
            .collect(),
        EventKind::Remove(_) if event.paths.iter().any(|p| p == root) => vec![WatchEvent {
            path: root.to_path_buf(),
            kind: WatchEventKind::Invalidated,
        }],
        _ => Vec::new(),
    }
}
