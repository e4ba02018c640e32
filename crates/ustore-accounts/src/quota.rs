use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use ustore_fs::{read_locked, write_locked, LockedFile};

use crate::config::QuotaLimits;
use crate::error::{AccountError, AccountResult};
use crate::record::{missing_directory, UserRecord};

/// Name of the ledger file inside each user directory.
pub const QUOTA_FILE: &str = "quota.json";

/// Counters for one resource key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEntry {
    pub limit: u64,
    #[serde(default)]
    pub used: u64,
}

/// One user's per-resource quota counters, stored in
/// `<user dir>/quota.json`.
///
/// Check-and-use is atomic within one instance. Across processes only each
/// individual load or [`flush`](Self::flush) is atomic; use
/// [`QuotaLedger::update`] to hold the file lock for a whole
/// load-mutate-flush cycle.
///
/// Invariant: `used <= limit` after every successful [`use_quota`] and
/// `used` never underflows.
///
/// [`use_quota`]: Self::use_quota
#[derive(Clone, Debug)]
pub struct QuotaLedger {
    owner: String,
    dir: PathBuf,
    entries: BTreeMap<String, QuotaEntry>,
    held: bool,
}

impl QuotaLedger {
    /// Load the ledger of `user`, or start a fresh one.
    ///
    /// A fresh ledger gets `default_limits` when given and non-empty,
    /// otherwise the store's configured default limits. Nothing is written
    /// until [`flush`](Self::flush).
    pub fn open(user: &UserRecord, default_limits: Option<&QuotaLimits>) -> AccountResult<Self> {
        let owner = user.name()?.to_string();
        let dir = user.data_dir()?;
        let path = dir.join(QUOTA_FILE);

        let bytes = if path.is_file() {
            Some(read_locked(&path)?)
        } else {
            None
        };
        Self::from_contents(owner, dir, bytes.as_deref(), user, default_limits)
    }

    /// Load, mutate and flush the ledger of `user` under one exclusive lock.
    ///
    /// The user must already have been written; a ledger is never the thing
    /// that creates a user directory.
    ///
    /// The ledger is flushed when the closure returns; calling
    /// [`flush`](Self::flush) inside it fails with
    /// [`AccountError::HeldUnderLock`]. Opening or updating the same user's
    /// ledger from inside the closure waits for this update and never
    /// returns.
    pub fn update<R>(
        user: &UserRecord,
        default_limits: Option<&QuotaLimits>,
        f: impl FnOnce(&mut QuotaLedger) -> R,
    ) -> AccountResult<R> {
        let owner = user.name()?.to_string();
        let dir = user.data_dir()?;
        if !dir.is_dir() {
            return Err(AccountError::MissingDirectory(dir));
        }
        let mut guard = LockedFile::exclusive(&dir.join(QUOTA_FILE), true)
            .map_err(|e| missing_directory(&dir, e))?;
        let bytes = guard.read_all()?;

        let mut ledger = Self::from_contents(owner, dir, Some(bytes.as_slice()), user, default_limits)?;
        ledger.held = true;
        let out = f(&mut ledger);
        ledger.held = false;
        guard.replace(&ledger.to_json()?)?;
        debug!(user = %ledger.owner, "flushed quota under lock");
        Ok(out)
    }

    fn from_contents(
        owner: String,
        dir: PathBuf,
        bytes: Option<&[u8]>,
        user: &UserRecord,
        default_limits: Option<&QuotaLimits>,
    ) -> AccountResult<Self> {
        let path = dir.join(QUOTA_FILE);
        match bytes {
            Some(bytes) if !bytes.is_empty() => Ok(Self {
                entries: decode_entries(&path, bytes)?,
                owner,
                dir,
                held: false,
            }),
            _ => {
                let limits = match default_limits {
                    Some(limits) if !limits.is_empty() => limits,
                    _ => &user.directory().config().default_limits,
                };
                let mut ledger = Self {
                    owner,
                    dir,
                    entries: BTreeMap::new(),
                    held: false,
                };
                for (key, limit) in limits.iter() {
                    ledger.set_limit(key, limit);
                }
                debug!(user = %ledger.owner, keys = limits.len(), "initialised fresh quota");
                Ok(ledger)
            }
        }
    }

    /// Set the limit for `key`, keeping any usage already recorded.
    pub fn set_limit(&mut self, key: &str, limit: u64) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.limit = limit;
    }

    /// Whether `amount` more of `key` fits under its limit.
    ///
    /// A key without a configured (non-zero) limit has no quota.
    pub fn has_quota(&self, key: &str, amount: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.limit > 0 => entry
                .used
                .checked_add(amount)
                .is_some_and(|total| total <= entry.limit),
            _ => false,
        }
    }

    /// Consume `amount` of `key` if available. Returns `false` and changes
    /// nothing otherwise.
    pub fn use_quota(&mut self, key: &str, amount: u64) -> bool {
        if !self.has_quota(key, amount) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.used += amount;
        }
        true
    }

    /// Release `amount` of `key`. Returns `false` and changes nothing if the
    /// key has no limit or usage would drop below zero.
    pub fn free_quota(&mut self, key: &str, amount: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.limit > 0 => match entry.used.checked_sub(amount) {
                Some(rest) => {
                    entry.used = rest;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Write the whole ledger to disk.
    ///
    /// Fails with [`AccountError::MissingDirectory`] if the owning user has
    /// not been written (or has been removed).
    pub fn flush(&self) -> AccountResult<()> {
        if self.held {
            return Err(AccountError::HeldUnderLock(self.path()));
        }
        if !self.dir.is_dir() {
            return Err(AccountError::MissingDirectory(self.dir.clone()));
        }
        write_locked(&self.path(), &self.to_json()?, true)
            .map_err(|e| missing_directory(&self.dir, e))?;
        info!(user = %self.owner, keys = self.entries.len(), "flushed quota");
        Ok(())
    }

    /// Read-only view of all entries.
    pub fn data(&self) -> &BTreeMap<String, QuotaEntry> {
        &self.entries
    }

    pub fn entry(&self, key: &str) -> Option<QuotaEntry> {
        self.entries.get(key).copied()
    }

    /// Name of the owning user.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Location of the ledger file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(QUOTA_FILE)
    }

    fn to_json(&self) -> AccountResult<Vec<u8>> {
        serde_json::to_vec(&self.entries).map_err(|e| AccountError::Serialization(e.to_string()))
    }
}

/// Decode a ledger file. An empty JSON list is an empty ledger.
fn decode_entries(path: &Path, bytes: &[u8]) -> AccountResult<BTreeMap<String, QuotaEntry>> {
    let corrupt = |reason: String| AccountError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let value: Value = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    match value {
        Value::Array(items) if items.is_empty() => Ok(BTreeMap::new()),
        value @ Value::Object(_) => {
            serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))
        }
        other => Err(corrupt(format!("expected an object, found {other}"))),
    }
}
