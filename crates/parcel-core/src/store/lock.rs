//! Detect files held open by another process.
//!
//! Used before finalize so a locked destination fails fast with a readable
//! message instead of a confusing rename error.

use std::fs::File;
use std::io;
use std::path::Path;

use super::StoreError;

/// True if another process holds `path` exclusively. Missing files are never locked.
pub fn is_locked(path: &Path) -> bool {
    match try_exclusive(path) {
        Ok(locked) => locked,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::debug!("lock probe on {} failed: {e}", path.display());
            false
        }
    }
}

/// Fails with [`StoreError::Locked`] (naming the likely holder when known) if `path` is locked.
pub fn check_not_locked(path: &Path) -> Result<(), StoreError> {
    if is_locked(path) {
        return Err(StoreError::Locked {
            path: path.to_path_buf(),
            holder: lock_holder(path),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn try_exclusive(path: &Path) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let file = File::open(path)?;
    let fd = file.as_raw_fd();
    let r = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if r == 0 {
        unsafe { libc::flock(fd, libc::LOCK_UN) };
        return Ok(false);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(true)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_exclusive(path: &Path) -> io::Result<bool> {
    use std::os::windows::fs::OpenOptionsExt;
    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;

    match File::options().read(true).write(true).share_mode(0).open(path) {
        Ok(_) => Ok(false),
        Err(e)
            if matches!(
                e.raw_os_error(),
                Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
            ) =>
        {
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

#[cfg(not(any(unix, windows)))]
fn try_exclusive(path: &Path) -> io::Result<bool> {
    File::open(path).map(|_| false)
}

/// Best-effort name of a process holding `path` open (`name (pid N)`).
/// Only Linux exposes this cheaply via `/proc`; elsewhere returns None.
pub fn lock_holder(path: &Path) -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let target = std::fs::canonicalize(path).ok()?;
        let me = std::process::id();
        for entry in std::fs::read_dir("/proc").ok()?.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if pid == me {
                continue;
            }
            let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            let holds = fds
                .flatten()
                .any(|fd| std::fs::read_link(fd.path()).map_or(false, |p| p == target));
            if holds {
                let name = std::fs::read_to_string(entry.path().join("comm"))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                return Some(format!("{name} (pid {pid})"));
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = path;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_locked() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_locked(&dir.path().join("absent")));
        assert!(check_not_locked(&dir.path().join("absent")).is_ok());
    }

    #[test]
    fn plain_file_is_not_locked() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f");
        std::fs::write(&p, b"x").unwrap();
        assert!(!is_locked(&p));
    }

    #[cfg(unix)]
    #[test]
    fn flock_held_elsewhere_is_detected() {
        use std::os::unix::io::AsRawFd;

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("held");
        std::fs::write(&p, b"x").unwrap();
        let holder = File::open(&p).unwrap();
        let r = unsafe { libc::flock(holder.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        assert_eq!(r, 0);
        assert!(is_locked(&p));
        let err = check_not_locked(&p).unwrap_err();
        assert!(err.to_string().contains("is locked by"));
        drop(holder);
        assert!(!is_locked(&p));
    }
}
