//! Lock-guarded whole-file I/O for the ustore record store.
//!
//! Every durable file the store owns (`data.json`, `quota.json`) is read and
//! written in one piece while an advisory `flock` is held on it. Readers take
//! a shared lock, writers an exclusive one, so a reader never observes a
//! half-written file as long as every party goes through this crate.
//!
//! # Entry Points
//!
//! - [`read_locked`] / [`write_locked`] -- one-shot read or replace of a file.
//! - [`LockedFile`] -- a scoped lock handle for callers that need to hold the
//!   lock across a whole read-modify-write cycle.
//! - [`remove_dir_recursive`] -- destructive removal of a directory tree.
//!
//! Lock acquisition blocks until the current holder releases the lock. There
//! is no timeout.

pub mod dir;
pub mod error;
pub mod locked;

pub use dir::remove_dir_recursive;
pub use error::{StoreError, StoreResult};
pub use locked::{read_locked, write_locked, LockMode, LockedFile};
