//! User records and quota ledgers for the ustore record store.
//!
//! Every user owns one directory below the configured users root:
//!
//! ```text
//! <root>/<user_data_dir>/<name>/data.json    {"user", "groups", "hash"}
//! <root>/<user_data_dir>/<name>/quota.json   {"<key>": {"limit", "used"}, ...}
//! ```
//!
//! There is no database. All file access goes through `ustore-fs`, which
//! holds an advisory lock for the duration of each read or write.
//!
//! # Components
//!
//! - [`UserDirectory`] -- the handle on the users root: listing, counting,
//!   existence checks, and locked read-modify-write of a record.
//! - [`UserRecord`] -- one user's name, groups and password hash.
//! - [`QuotaLedger`] -- one user's per-resource `limit`/`used` counters.
//! - [`StoreConfig`] -- where the users root is, the user cap, and the
//!   default quota limits.
//!
//! # Consistency
//!
//! A single load or flush is atomic relative to other lock-respecting
//! callers. A separate load, mutate, flush sequence is not: two processes
//! can interleave and the later flush wins. Callers that need the whole
//! cycle serialised use [`QuotaLedger::update`] or
//! [`UserDirectory::update_user`], which keep the file locked throughout.

pub mod config;
pub mod directory;
pub mod error;
pub mod names;
pub mod quota;
pub mod record;

#[cfg(test)]
mod testing;

pub use config::{QuotaLimits, StoreConfig};
pub use directory::UserDirectory;
pub use error::{AccountError, AccountResult, ErrorClass};
pub use names::validate_user_name;
pub use quota::{QuotaEntry, QuotaLedger};
pub use record::{SessionData, UserRecord, WriteOutcome};
