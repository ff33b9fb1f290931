//! Batch moves from the source folder into a target folder
//!
//! - [`discover`] lists the move units under a source root
//! - [`executor`] relocates every unit on a worker pool and waits for all of them
//! - [`relocate`] performs one replace-on-conflict move

pub mod discover;
pub mod executor;
pub mod relocate;

pub use discover::{BatchDiscoverer, BatchPlan};
pub use executor::MoveExecutor;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// What a move unit covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitKind {
    /// A single regular file
    File,
    /// A whole sub-directory, moved as one entry
    DirectoryTree,
}

/// One filesystem entry to relocate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveUnit {
    pub source: PathBuf,
    pub kind: UnitKind,
}

impl MoveUnit {
    pub fn file(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            kind: UnitKind::File,
        }
    }

    pub fn directory_tree(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            kind: UnitKind::DirectoryTree,
        }
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.source.file_name()
    }

    /// Where this unit lands under `destination_root`
    pub fn destination_in(&self, destination_root: &Path) -> Option<PathBuf> {
        self.file_name().map(|name| destination_root.join(name))
    }
}

/// Result of one relocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    TargetInvalid,
}

/// Aggregate over one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchResult {
    /// At least one unit moved
    pub found_files: bool,
    /// Units that moved
    pub moved: usize,
    /// Units that failed
    pub failed: usize,
    /// Units submitted to the pool
    pub submitted: usize,
}

impl BatchResult {
    pub fn summary(&self) -> String {
        format!(
            "Submitted: {}, Moved: {}, Failed: {}",
            self.submitted, self.moved, self.failed
        )
    }
}

/// Shared accumulator the relocation tasks report into
#[derive(Debug, Default)]
pub(crate) struct BatchTally {
    found_files: AtomicBool,
    moved: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchTally {
    pub(crate) fn record(&self, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Moved => {
                self.moved.fetch_add(1, Ordering::SeqCst);
                self.found_files.store(true, Ordering::SeqCst);
            }
            MoveOutcome::TargetInvalid => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub(crate) fn finish(&self, submitted: usize) -> BatchResult {
        BatchResult {
            found_files: self.found_files.load(Ordering::SeqCst),
            moved: self.moved.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            submitted,
        }
    }
}
