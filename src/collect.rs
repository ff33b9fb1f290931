//! Collect every sub-directory of a gallery tree into a text file

use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Absolute paths of all directories below `root`, in walk order.
/// The root itself is not included.
pub fn collect_subdirectories(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        warn!(root = %root.display(), "Directory does not exist or is not a directory");
        return Ok(Vec::new());
    }

    let root = fs::canonicalize(root)?;
    let mut directories = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        }
    }
    Ok(directories)
}

/// Write one path per line to `output`, replacing its previous content
pub fn write_collection(paths: &[PathBuf], output: &Path) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(output)?);
    for path in paths {
        writeln!(writer, "{}", path.display())?;
    }
    writer.flush()?;

    info!(count = paths.len(), output = %output.display(), "Wrote directory collection");
    Ok(())
}
