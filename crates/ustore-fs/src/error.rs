use std::io;
use std::path::{Path, PathBuf};

/// Errors from locked file operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Attempted to write through a shared (read) lock.
    #[error("file is not locked for writing: {}", .0.display())]
    NotExclusive(PathBuf),

    /// I/O error from the underlying filesystem.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Wrap an I/O error for `path`, folding `ErrorKind::NotFound` into
    /// [`StoreError::NotFound`].
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for locked file operations.
pub type StoreResult<T> = Result<T, StoreError>;
