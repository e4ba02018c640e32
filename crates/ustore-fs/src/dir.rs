use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Recursively delete `path` and everything below it.
///
/// Irreversible. Fails with [`StoreError::NotFound`] if `path` does not exist
/// or is not a directory.
pub fn remove_dir_recursive(path: &Path) -> StoreResult<()> {
    if !path.is_dir() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    fs::remove_dir_all(path).map_err(|e| StoreError::from_io(path, e))?;
    debug!(path = %path.display(), "removed directory tree");
    Ok(())
}
