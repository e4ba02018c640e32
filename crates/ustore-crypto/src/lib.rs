//! Password hashing for the ustore record store.
//!
//! Wraps Argon2id from the `argon2` crate. Hashes are stored as PHC strings
//! so the algorithm, parameters and salt travel with the hash. No custom
//! cryptography.

pub mod error;
pub mod password;

pub use error::{CryptoError, CryptoResult};
pub use password::{hash_password, verify_password};
