//! Staging Sorter - watches an unclassified image folder and bulk-moves it
//!
//! This library provides:
//! - A staging-folder watcher that journals arrivals with the remaining count
//! - Move batches that relocate a source folder's top-level entries in parallel
//! - Named worker pools with snapshots and graceful shutdown
//! - An operator command loop and a sub-directory collector

// Initialize i18n with locale files
rust_i18n::i18n!("locales", fallback = "en");

pub mod barrier;
pub mod cli;
pub mod collect;
pub mod config;
pub mod counter;
pub mod diagnostics;
pub mod error;
pub mod i18n;
pub mod interactive;
pub mod journal;
pub mod mover;
pub mod os;
pub mod pool;
pub mod service;
pub mod watch;

pub use barrier::{BarrierGuard, CompletionBarrier};
pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use counter::FileCounter;
pub use error::{Error, Result};
pub use i18n::init_locale;
pub use interactive::CommandLoop;
pub use journal::CountJournal;
pub use mover::{BatchDiscoverer, BatchPlan, BatchResult, MoveExecutor, MoveOutcome, MoveUnit, UnitKind};
pub use pool::{ShutdownReport, SnapshotPhase, ThreadPoolSnapshot, WorkerPool};
pub use service::MoveService;
pub use watch::{EventSource, EventWatcher, NotifySource, WatchEvent, WatchEventKind, WatcherState};
