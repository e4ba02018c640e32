//! Error types for record and ledger operations.

use std::path::PathBuf;

use thiserror::Error;
use ustore_crypto::CryptoError;
use ustore_fs::StoreError;

/// Coarse classification of an [`AccountError`].
///
/// `Argument` errors are caller misuse and recoverable by the caller.
/// `Internal` errors are system failures the caller cannot fix directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Argument,
    Internal,
}

impl ErrorClass {
    /// HTTP status a presentation layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Argument => 400,
            Self::Internal => 500,
        }
    }
}

/// Errors that can occur during record and ledger operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Caller-supplied input is invalid (empty name, empty hash, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No directory exists for the requested user.
    #[error("no user named {0}")]
    NoSuchUser(String),

    /// The object has not been loaded or set yet.
    #[error("{0} not ready")]
    NotReady(&'static str),

    /// A record or ledger borrowed by a locked update was asked to persist
    /// itself. The update persists it when the closure returns.
    #[error("{} is held by a locked update", .0.display())]
    HeldUnderLock(PathBuf),

    /// A record or ledger file exists but cannot be decoded.
    #[error("corrupt data in {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Encoding a record or ledger to JSON failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A user directory that should exist is gone.
    #[error("user directory missing: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// The configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem failure from the locked file store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl AccountError {
    /// Which side of the argument/internal split this error falls on.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_)
            | Self::NoSuchUser(_)
            | Self::NotReady(_)
            | Self::HeldUnderLock(_) => ErrorClass::Argument,
            Self::Corrupt { .. }
            | Self::Serialization(_)
            | Self::MissingDirectory(_)
            | Self::Config(_)
            | Self::Store(_)
            | Self::Crypto(_) => ErrorClass::Internal,
        }
    }
}

/// Convenience type alias for record and ledger operations.
pub type AccountResult<T> = std::result::Result<T, AccountError>;
