//! Platform helpers for the base storage provider.
//!
//! Notes:
//! - Creation (birth) time is writable on Windows only; Unix has no syscall
//!   for it, so `set_file_created` is a logged no-op there. The journal still
//!   records the action symmetrically, keeping undo/redo consistent.
//! - `fsync_dir` persists a rename on Unix; Windows has no std equivalent.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};

#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(windows)]
pub(crate) fn set_file_created(path: &Path, when: DateTime<Utc>) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Foundation::{CloseHandle, FILETIME, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::Storage::FileSystem::{
        CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_DELETE, FILE_SHARE_READ,
        FILE_SHARE_WRITE, FILE_WRITE_ATTRIBUTES, OPEN_EXISTING, SetFileTime,
    };

    // FILETIME counts 100ns intervals since 1601-01-01.
    const EPOCH_DIFF_SECS: i64 = 11_644_473_600;
    let intervals = (when.timestamp() + EPOCH_DIFF_SECS) as u64 * 10_000_000
        + u64::from(when.timestamp_subsec_nanos()) / 100;
    let ft = FILETIME {
        dwLowDateTime: intervals as u32,
        dwHighDateTime: (intervals >> 32) as u32,
    };

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let handle = CreateFileW(
            wide.as_ptr(),
            FILE_WRITE_ATTRIBUTES,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            std::ptr::null(),
            OPEN_EXISTING,
            FILE_FLAG_BACKUP_SEMANTICS,
            std::ptr::null_mut(),
        );
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        let ok = SetFileTime(handle, &ft, std::ptr::null(), std::ptr::null());
        CloseHandle(handle);
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(windows))]
pub(crate) fn set_file_created(path: &Path, when: DateTime<Utc>) -> io::Result<()> {
    tracing::debug!(path = %path.display(), when = %when, "creation time is not settable on this platform");
    Ok(())
}
