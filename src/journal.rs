//! Append-only journal of arrivals and moves
//!
//! This is the operator-facing record of how many unclassified images are
//! left. It is deliberately separate from the `tracing` diagnostic log: one
//! plain UTF-8 line per event, never truncated.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Writer for the remaining-images journal
#[derive(Debug)]
pub struct CountJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CountJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a new arrival in the staging folder
    pub fn record_arrival(&self, file: &Path, remaining: usize) {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        self.append(&format!(
            "New files added: {}; Remaining unclassified images: {}",
            name, remaining
        ));
    }

    /// Record that a move left `remaining` files in the staging folder
    pub fn record_moved(&self, remaining: usize) {
        self.append(&format!(
            "File(s) has/have been moved; Remaining unclassified images: {}",
            remaining
        ));
    }

    fn append(&self, message: &str) {
        let line = format!(
            "{} INFO [Client] - {}\n",
            Local::now().format(TIMESTAMP_FORMAT),
            message
        );

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.write_line(&line) {
            eprintln!(
                "The log file cannot be written, please check that '{}' is configured correctly.",
                self.path.display()
            );
            warn!(path = %self.path.display(), error = %e, "Failed to append journal line");
        }
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lines_are_appended() {
        let dir = tempdir().unwrap();
        let journal = CountJournal::new(dir.path().join("Log").join("remaining.log"));

        journal.record_arrival(Path::new("/staging/c.png"), 4);
        journal.record_moved(3);

        let content = fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(
            "INFO [Client] - New files added: c.png; Remaining unclassified images: 4"
        ));
        assert!(lines[1].ends_with(
            "INFO [Client] - File(s) has/have been moved; Remaining unclassified images: 3"
        ));
    }

    #[test]
    fn test_existing_content_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remaining.log");
        fs::write(&path, "earlier line\n").unwrap();

        CountJournal::new(&path).record_moved(0);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("earlier line\n"));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes every append fail
        let journal = CountJournal::new(dir.path());
        journal.record_moved(1);
        assert!(dir.path().is_dir());
    }
}
