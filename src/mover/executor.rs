//! Concurrent relocation of a batch plan
//!
//! One task per unit goes to the mover pool. A [`CompletionBarrier`] sized
//! to the unit count holds the caller until every task has reported, and a
//! [`BatchTally`] owned by this batch collects the outcomes.

use super::relocate::relocate;
use super::{BatchPlan, BatchResult, BatchTally, MoveOutcome, MoveUnit};
use crate::barrier::{BarrierGuard, CompletionBarrier};
use crate::counter::FileCounter;
use crate::journal::CountJournal;
use crate::pool::{SnapshotPhase, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, debug, error, info, span};

/// Runs batch plans on a worker pool
#[derive(Debug, Clone)]
pub struct MoveExecutor {
    pool: Arc<WorkerPool>,
    counter: Arc<FileCounter>,
    journal: Arc<CountJournal>,
}

impl MoveExecutor {
    pub fn new(
        pool: Arc<WorkerPool>,
        counter: Arc<FileCounter>,
        journal: Arc<CountJournal>,
    ) -> Self {
        Self {
            pool,
            counter,
            journal,
        }
    }

    /// Relocate every unit of `plan` and block until all of them are done.
    pub fn execute(&self, plan: &BatchPlan) -> BatchResult {
        let _span = span!(Level::INFO, "move_batch", source = %plan.source_root.display()).entered();

        if plan.units.is_empty() {
            debug!("Empty plan, nothing submitted");
            return BatchResult::default();
        }

        let submitted = plan.units.len();
        let barrier = CompletionBarrier::new(submitted);
        let tally = Arc::new(BatchTally::default());

        self.pool.log_snapshot(SnapshotPhase::BeforeSubmitted);

        for unit in &plan.units {
            let task = RelocationTask {
                unit: unit.clone(),
                destination_root: plan.destination_root.clone(),
                counter: Arc::clone(&self.counter),
                journal: Arc::clone(&self.journal),
                tally: Arc::clone(&tally),
                _done: barrier.guard(),
            };
            // A rejected task is dropped unrun, which releases its barrier slot
            if let Err(e) = self.pool.submit(move || task.run()) {
                error!(source = %unit.source.display(), error = %e, "Failed to submit move task");
                tally.record(MoveOutcome::TargetInvalid);
            }
        }

        barrier.wait();

        self.pool.log_snapshot(SnapshotPhase::TaskFinished);

        let result = tally.finish(submitted);
        if !result.found_files {
            error!(
                source = %plan.source_root.display(),
                "No files were moved from the source directory"
            );
        }
        info!("{}", result.summary());
        result
    }
}

/// Everything one pool task needs to move one unit
struct RelocationTask {
    unit: MoveUnit,
    destination_root: PathBuf,
    counter: Arc<FileCounter>,
    journal: Arc<CountJournal>,
    tally: Arc<BatchTally>,
    _done: BarrierGuard,
}

impl RelocationTask {
    fn run(self) {
        let outcome = self.relocate();
        self.tally.record(outcome);
    }

    fn relocate(&self) -> MoveOutcome {
        let Some(destination) = self.unit.destination_in(&self.destination_root) else {
            error!(source = %self.unit.source.display(), "Source has no file name");
            return MoveOutcome::TargetInvalid;
        };

        match relocate(&self.unit.source, &destination) {
            Ok(()) => {
                info!(destination = %destination.display(), kind = ?self.unit.kind, "Moved entry");
                self.record_remaining(&destination);
                MoveOutcome::Moved
            }
            Err(e) => {
                error!(
                    source = %self.unit.source.display(),
                    destination = %destination.display(),
                    error = %e,
                    "Target path is invalid or the entry could not be moved"
                );
                MoveOutcome::TargetInvalid
            }
        }
    }

    fn record_remaining(&self, destination: &Path) {
        match self.counter.count() {
            Ok(remaining) => self.journal.record_moved(remaining),
            Err(e) => error!(
                destination = %destination.display(),
                error = %e,
                "Moved, but the staging folder could not be counted"
            ),
        }
    }
}
