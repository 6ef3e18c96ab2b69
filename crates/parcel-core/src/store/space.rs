//! Free disk space queries.

use std::io;
use std::path::Path;

/// Bytes available to unprivileged users on the filesystem holding `path`.
/// Walks up to the nearest existing ancestor, so a not-yet-created output directory works.
/// Returns `Ok(None)` on platforms without a query.
pub fn available_space(path: &Path) -> io::Result<Option<u64>> {
    let mut probe = path;
    while !probe.exists() {
        match probe.parent() {
            Some(p) if !p.as_os_str().is_empty() => probe = p,
            _ => {
                probe = Path::new(".");
                break;
            }
        }
    }
    statvfs_available(probe)
}

#[cfg(unix)]
fn statvfs_available(path: &Path) -> io::Result<Option<u64>> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if r != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64)))
}

#[cfg(not(unix))]
fn statvfs_available(_path: &Path) -> io::Result<Option<u64>> {
    Ok(None)
}
