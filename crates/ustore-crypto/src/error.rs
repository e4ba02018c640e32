use thiserror::Error;

/// Errors produced by password operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
