//! Exclusive claim on the seat allotment run for one data set.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Held for the whole of one allotment run; dropping it releases the claim.
///
/// File-backed leases use `flock(LOCK_EX | LOCK_NB)` on a lock file beside the database, so
/// every process opening the same database contends for the same lock. The kernel drops the
/// lock when the holder exits, including on a crash.
pub struct RunLease {
    _lock_file: Option<File>,
    path: Option<PathBuf>,
}

impl RunLease {
    /// Lease for data that only this process can see.
    pub fn process_local() -> Self {
        Self {
            _lock_file: None,
            path: None,
        }
    }

    /// Try to take the lock file at `path` without waiting.
    ///
    /// Returns `Ok(None)` when another holder (in this or any other process) has it.
    pub fn try_file(path: &Path) -> io::Result<Option<Self>> {
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if try_flock_exclusive(&lock_file)? {
            Ok(Some(Self {
                _lock_file: Some(lock_file),
                path: Some(path.to_path_buf()),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for RunLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLease")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Lock file guarding allotment runs against the database at `database_path`.
pub fn lock_path_for(database_path: &str) -> PathBuf {
    PathBuf::from(format!("{database_path}.allot.lock"))
}

fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}
