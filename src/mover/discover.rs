//! Enumerate the move units directly under a source root

use super::MoveUnit;
use crate::error::{Error, Result};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Units to relocate from one source root into one destination root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    /// In directory listing order
    pub units: Vec<MoveUnit>,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Lists a source root one level deep
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDiscoverer;

impl BatchDiscoverer {
    pub fn new() -> Self {
        Self
    }

    /// Build the plan for moving the contents of `source_root` into
    /// `destination_root`.
    ///
    /// A missing or empty root produces an empty plan and touches nothing.
    /// A root that is itself a regular file produces a single unit.
    /// Sub-directories become one unit each and are not descended into.
    /// When there is anything to move, the destination root is created.
    pub fn discover(&self, source_root: &Path, destination_root: &Path) -> Result<BatchPlan> {
        let metadata = match fs::metadata(source_root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(source = %source_root.display(), "Source does not exist");
                return Ok(BatchPlan {
                    source_root: source_root.to_path_buf(),
                    destination_root: destination_root.to_path_buf(),
                    units: Vec::new(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.plan(source_root, &metadata, destination_root)
    }

    /// Build the plan for a root whose metadata has already been read
    fn plan(
        &self,
        source_root: &Path,
        metadata: &Metadata,
        destination_root: &Path,
    ) -> Result<BatchPlan> {
        let mut plan = BatchPlan {
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            units: Vec::new(),
        };

        if metadata.is_file() {
            plan.units.push(MoveUnit::file(source_root));
        } else if metadata.is_dir() {
            plan.units = list_units(source_root)?;
        }

        if plan.units.is_empty() {
            debug!(source = %source_root.display(), "Nothing to move");
            return Ok(plan);
        }

        fs::create_dir_all(destination_root)?;
        info!(
            source = %source_root.display(),
            destination = %destination_root.display(),
            units = plan.units.len(),
            "Discovered move units"
        );
        Ok(plan)
    }
}

fn list_units(root: &Path) -> Result<Vec<MoveUnit>> {
    let mut units = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Discovery {
            path: root.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            units.push(MoveUnit::directory_tree(entry.into_path()));
        } else if file_type.is_file() {
            units.push(MoveUnit::file(entry.into_path()));
        } else {
            debug!(path = %entry.path().display(), "Skipping special entry");
        }
    }
    Ok(units)
}
