//! Replace-on-conflict move of a single file or directory tree

use filetime::FileTime;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Move `source` to `destination`, replacing whatever is already there.
///
/// Within one filesystem this is a single rename. Across filesystems the
/// entry is copied (recursively for directories, keeping modification
/// times) and the source removed afterwards. If the move fails, an entry
/// that was already at `destination` is left in place.
pub fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    // Fails before the destination is touched if the source has vanished
    let source_meta = fs::symlink_metadata(source)?;
    let existing = fs::symlink_metadata(destination).ok();

    if let Some(dest_meta) = &existing
        && is_same_entry(source, &source_meta, destination, dest_meta)
    {
        return Ok(());
    }

    // rename replaces a non-directory with a file by itself; anything
    // involving a directory needs the old entry out of the way first
    let backup = match &existing {
        Some(dest_meta) if dest_meta.is_dir() || source_meta.is_dir() => {
            let backup = sibling(destination, "replaced");
            fs::rename(destination, &backup)?;
            Some(backup)
        }
        _ => None,
    };

    let placed = match fs::rename(source, destination) {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_into_place(source, destination, source_meta.is_dir()).map(|()| true)
        }
        Err(e) => Err(e),
    };

    let copied = match placed {
        Ok(copied) => copied,
        Err(e) => {
            if let Some(backup) = backup
                && let Err(restore) = fs::rename(&backup, destination)
            {
                warn!(
                    backup = %backup.display(),
                    error = %restore,
                    "Could not restore the replaced entry"
                );
            }
            return Err(e);
        }
    };

    if let Some(backup) = backup {
        let _ = remove_entry(&backup);
    }
    if copied {
        remove_entry(source)?;
    }
    Ok(())
}

/// Both paths name the same filesystem object. A symlink at the
/// destination is never the same entry as the file it points to.
#[cfg(unix)]
fn is_same_entry(
    _source: &Path,
    source_meta: &Metadata,
    _destination: &Path,
    dest_meta: &Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    source_meta.dev() == dest_meta.dev() && source_meta.ino() == dest_meta.ino()
}

#[cfg(not(unix))]
fn is_same_entry(
    source: &Path,
    source_meta: &Metadata,
    destination: &Path,
    dest_meta: &Metadata,
) -> bool {
    if source_meta.file_type().is_symlink() != dest_meta.file_type().is_symlink() {
        return false;
    }
    match (fs::canonicalize(source), fs::canonicalize(destination)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Hidden name next to `path`, unique per process
fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}-{}", name, tag, std::process::id()))
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Copy `source` next to `destination` under a temporary name, then rename
/// it into place. A partial copy is removed and `destination` is untouched.
fn copy_into_place(source: &Path, destination: &Path, is_dir: bool) -> io::Result<()> {
    let staging = sibling(destination, "incoming");
    let copied = if is_dir {
        copy_tree(source, &staging)
    } else {
        copy_file(source, &staging)
    };

    if let Err(e) = copied.and_then(|()| fs::rename(&staging, destination)) {
        let _ = remove_entry(&staging);
        return Err(e);
    }
    Ok(())
}

fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    let mut directories = Vec::new();
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            directories.push((entry.into_path(), target));
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    // Directory times change while their children are written, so set them last
    for (dir, target) in directories.iter().rev() {
        preserve_mtime(dir, target);
    }
    Ok(())
}

fn copy_file(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    preserve_mtime(source, destination);
    Ok(())
}

fn preserve_mtime(source: &Path, destination: &Path) {
    if let Ok(metadata) = fs::metadata(source) {
        let mtime = FileTime::from_last_modification_time(&metadata);
        let _ = filetime::set_file_mtime(destination, mtime);
    }
}
