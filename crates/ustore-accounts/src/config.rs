use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};

/// Resource key to quota limit table.
///
/// Passed explicitly to [`QuotaLedger`](crate::QuotaLedger) construction;
/// there is no process-wide default table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaLimits(BTreeMap<String, u64>);

impl QuotaLimits {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The limits a fresh installation hands out.
    pub fn standard() -> Self {
        Self::new().with("slides", 100).with("displays", 10)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, limit: u64) -> Self {
        self.0.insert(key.into(), limit);
        self
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(key, limit)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for QuotaLimits {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Configuration for a record store installation.
///
/// Missing keys in a TOML file fall back to [`StoreConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Installation root.
    pub root: PathBuf,
    /// Users directory, relative to `root`.
    pub user_data_dir: PathBuf,
    /// Maximum number of user records.
    pub max_users: usize,
    /// Limits applied to a user's ledger when it is first created.
    pub default_limits: QuotaLimits,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            user_data_dir: PathBuf::from("data/users"),
            max_users: 64,
            default_limits: QuotaLimits::standard(),
        }
    }
}

impl StoreConfig {
    /// Directory holding one subdirectory per user.
    ///
    /// `user_data_dir` is always treated as relative to `root`, even when
    /// written with a leading `/`.
    pub fn users_root(&self) -> PathBuf {
        let rel = self
            .user_data_dir
            .strip_prefix("/")
            .unwrap_or(self.user_data_dir.as_path());
        self.root.join(rel)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> AccountResult<Self> {
        toml::from_str(s).map_err(|e| AccountError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> AccountResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| AccountError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
