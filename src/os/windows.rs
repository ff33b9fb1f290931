//! Windows-specific operating system features.

use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use winapi::um::shellapi::ShellExecuteW;
use winapi::um::winuser::SW_SHOWNORMAL;

fn wide(s: &std::ffi::OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Open a folder in Explorer. Returns once the shell has accepted the
/// request; the Explorer window itself is not waited on.
pub fn explore(path: &Path) -> io::Result<()> {
    let operation = wide("explore".as_ref());
    let target = wide(path.as_os_str());

    let result = unsafe {
        ShellExecuteW(
            std::ptr::null_mut(),
            operation.as_ptr(),
            target.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            SW_SHOWNORMAL,
        )
    };

    // ShellExecuteW returns a value > 32 on success
    if result as isize > 32 {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "Failed to open '{}' in Explorer",
            path.display()
        )))
    }
}
