use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Which kind of `flock` a [`LockedFile`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    /// `LOCK_SH`: any number of readers, no writers.
    Shared,
    /// `LOCK_EX`: a single holder that may read and replace the contents.
    Exclusive,
}

/// An open file with an advisory lock held for the lifetime of the value.
///
/// The lock belongs to this open file description. Two `LockedFile`s on the
/// same path contend with each other even inside one process, exactly as
/// they would across processes. Opening a second handle on a path the
/// current thread already holds exclusively therefore blocks forever.
///
/// Dropping the value releases the lock.
pub struct LockedFile {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockedFile {
    /// Open `path` for reading and block until a shared lock is granted.
    pub fn shared(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| StoreError::from_io(path, e))?;
        FileExt::lock_shared(&file).map_err(|e| StoreError::from_io(path, e))?;
        debug!(path = %path.display(), "acquired shared lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode: LockMode::Shared,
        })
    }

    /// Open `path` for reading and writing and block until an exclusive lock
    /// is granted.
    ///
    /// With `create` set, a missing file is created empty first. Its parent
    /// directory must already exist; a missing parent is
    /// [`StoreError::NotFound`]. The file is never truncated on open; callers
    /// replace its contents with [`LockedFile::replace`] once the lock is
    /// held.
    pub fn exclusive(path: &Path, create: bool) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::from_io(path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| StoreError::from_io(path, e))?;
        debug!(path = %path.display(), "acquired exclusive lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode: LockMode::Exclusive,
        })
    }

    /// Read the full current contents of the file.
    pub fn read_all(&mut self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|e| StoreError::from_io(&self.path, e))?;
        Ok(buf)
    }

    /// Replace the full contents of the file with `bytes` and sync to disk.
    ///
    /// Requires an exclusive lock. Other lock holders cannot observe the
    /// intermediate truncated state.
    pub fn replace(&mut self, bytes: &[u8]) -> StoreResult<()> {
        if self.mode != LockMode::Exclusive {
            return Err(StoreError::NotExclusive(self.path.clone()));
        }
        let file = &mut self.file;
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(bytes))
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::from_io(&self.path, e))?;
        debug!(path = %self.path.display(), len = bytes.len(), "replaced file contents");
        Ok(())
    }

    /// Path this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock currently held.
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            // Closing the descriptor right after releases the lock anyway.
            warn!(path = %self.path.display(), error = %e, "explicit unlock failed");
        }
    }
}

impl std::fmt::Debug for LockedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Read the whole of `path` under a shared lock.
///
/// Fails with [`StoreError::NotFound`] if the file does not exist.
pub fn read_locked(path: &Path) -> StoreResult<Vec<u8>> {
    LockedFile::shared(path)?.read_all()
}

/// Replace the whole of `path` with `bytes` under an exclusive lock.
///
/// With `create_if_missing` unset, a missing file is
/// [`StoreError::NotFound`]; otherwise the file is created. Parent
/// directories are never created here.
pub fn write_locked(path: &Path, bytes: &[u8], create_if_missing: bool) -> StoreResult<()> {
    LockedFile::exclusive(path, create_if_missing)?.replace(bytes)
}
