//! Platform-specific module for operating system features.

#[cfg(windows)]
pub mod windows;

use std::io;
use std::path::Path;

/// Open `path` in the platform file browser without waiting for it.
#[cfg(windows)]
pub fn open_in_file_browser(path: &Path) -> io::Result<()> {
    windows::explore(path)
}

/// Open `path` in the platform file browser without waiting for it.
#[cfg(target_os = "macos")]
pub fn open_in_file_browser(path: &Path) -> io::Result<()> {
    spawn_detached("open", path)
}

/// Open `path` in the platform file browser without waiting for it.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn open_in_file_browser(path: &Path) -> io::Result<()> {
    spawn_detached("xdg-open", path)
}

#[cfg(unix)]
fn spawn_detached(program: &str, path: &Path) -> io::Result<()> {
    use std::process::{Command, Stdio};

    // The child is never waited on; its exit status is of no interest
    Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
}
