//! Error types for the staging sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for staging sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the staging sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No target path is configured for code '{code}'")]
    UnknownTarget { code: String },

    #[error("The default source path is empty or missing")]
    MissingSourcePath,

    #[error("Target {} lies inside source {}", target.display(), source_root.display())]
    DestinationInsideSource { target: PathBuf, source_root: PathBuf },

    #[error("Failed to list source directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Staging folder {} is unavailable: {source}", path.display())]
    StagingUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool '{pool}' is shut down")]
    PoolClosed { pool: String },

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("Watch channel error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}
