//! Count of regular files remaining in the staging folder

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Counts the regular files directly inside the staging folder.
///
/// Nothing is cached: every call lists the folder again, so concurrent
/// callers each see the on-disk state at the moment they ran.
#[derive(Debug, Clone)]
pub struct FileCounter {
    staging_dir: PathBuf,
}

impl FileCounter {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Number of direct children that are regular files. Sub-directories,
    /// symlinks and other special entries are not counted.
    pub fn count(&self) -> Result<usize> {
        let unavailable = |source| Error::StagingUnavailable {
            path: self.staging_dir.clone(),
            source,
        };

        let mut files = 0;
        for entry in fs::read_dir(&self.staging_dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            if entry.file_type().map_err(unavailable)?.is_file() {
                files += 1;
            }
        }
        Ok(files)
    }
}
