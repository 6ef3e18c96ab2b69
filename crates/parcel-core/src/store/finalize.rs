//! Promote the staging file to the destination path.

use std::path::Path;

use super::StoreError;

/// Moves `staging` over `destination`.
///
/// A rename replaces an existing destination in one step on Unix and Windows, so a
/// crash leaves either the old or the new file. Only if that replace fails (e.g. the
/// platform refuses to overwrite) does this fall back to delete-then-rename.
pub fn finalize(staging: &Path, destination: &Path) -> Result<(), StoreError> {
    if !staging.is_file() {
        return Err(StoreError::io(
            "finalize",
            staging,
            std::io::Error::new(std::io::ErrorKind::NotFound, "staging file missing"),
        ));
    }
    match std::fs::rename(staging, destination) {
        Ok(()) => Ok(()),
        Err(first) if destination.exists() => {
            tracing::debug!(
                "atomic replace of {} failed ({first}); deleting then renaming",
                destination.display()
            );
            std::fs::remove_file(destination)
                .map_err(|e| StoreError::io("remove existing destination", destination, e))?;
            std::fs::rename(staging, destination)
                .map_err(|e| StoreError::io("rename staging file", destination, e))
        }
        Err(e) => Err(StoreError::io("rename staging file", destination, e)),
    }
}
